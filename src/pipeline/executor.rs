//! Request execution
//!
//! Drives a bound engine through item loading, bibliography and citation
//! generation, and response serialization, then returns the engine to the
//! pool. The success path here is the only way an engine re-enters the
//! pool after serving a request; a failing engine is dropped instead.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::engine::{EngineError, OutputFormat};
use crate::error::Result;
use crate::state::AppState;

use super::ResolvedRequest;

/// Fully serialized response for one citation request.
#[derive(Debug)]
pub struct CiteResponse {
    pub content_type: &'static str,
    pub body: String,
}

impl IntoResponse for CiteResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// Step 5: execute the request against the bound engine and serialize the
/// result.
pub fn execute(state: &AppState, mut resolved: ResolvedRequest) -> Result<CiteResponse> {
    let mut engine = resolved
        .engine
        .take()
        .ok_or_else(|| EngineError::Render("no engine bound to request".to_string()))?;

    let config = &resolved.request.config;

    // the engine already holds the item collection; set format and ordering
    if config.output_format != OutputFormat::Html {
        engine.set_output_format(config.output_format);
    }
    engine.update_items(&resolved.request.item_ids);

    let bibliography = if config.bibliography {
        Some(engine.make_bibliography()?)
    } else {
        None
    };

    let mut citations: Vec<Value> = Vec::new();
    if config.citations {
        for cluster in &resolved.request.clusters {
            let results = engine.append_citation_cluster(cluster)?;
            if let Some(first) = results.into_iter().next() {
                citations.push(json!(first));
            }
        }
    }

    let response = if config.json_response {
        let mut payload = serde_json::Map::new();
        if let Some(bib) = &bibliography {
            let value = serde_json::to_value(bib)
                .map_err(|e| EngineError::Render(e.to_string()))?;
            payload.insert("bibliography".to_string(), value);
        }
        if config.citations {
            payload.insert("citations".to_string(), Value::Array(citations));
        }
        CiteResponse {
            content_type: "application/json",
            body: Value::Object(payload).to_string(),
        }
    } else {
        // raw markup: start marker, joined entries, end marker
        let body = bibliography
            .as_ref()
            .map(|bib| format!("{}{}{}", bib.0.bibstart, bib.1.join(""), bib.0.bibend))
            .unwrap_or_default();
        CiteResponse {
            content_type: config.output_format.content_type(),
            body,
        }
    };

    // success: the engine goes back to the pool for the next request
    state.pool().save(engine, resolved.key);
    Ok(response)
}
