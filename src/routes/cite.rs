//! Citation endpoint
//!
//! The single HTTP surface: `POST /` processes a citation request,
//! `OPTIONS /` answers preflight, anything else is a 400. Body parsing and
//! item-set assembly happen here; everything afterwards is the pipeline's
//! job.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;

use crate::engine::{CitationCluster, ItemId};
use crate::error::ServiceError;
use crate::pipeline::{RequestConfig, RequestContext, RequestPipeline};
use crate::state::AppState;

/// Create the citation router
pub fn router() -> Router<AppState> {
    Router::new().route("/", any(handle))
}

/// Query parameters, with the documented defaults.
#[derive(Debug, Deserialize)]
pub struct CiteQuery {
    #[serde(default = "default_bibliography")]
    bibliography: String,
    #[serde(default = "default_citations")]
    citations: String,
    #[serde(default = "default_outputformat")]
    outputformat: String,
    #[serde(default = "default_responseformat")]
    responseformat: String,
    #[serde(default = "default_locale")]
    locale: String,
    #[serde(default = "default_style")]
    style: String,
}

fn default_bibliography() -> String {
    "1".to_string()
}

fn default_citations() -> String {
    "0".to_string()
}

fn default_outputformat() -> String {
    "html".to_string()
}

fn default_responseformat() -> String {
    "json".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_style() -> String {
    "chicago-author-date".to_string()
}

/// POSTed request body.
#[derive(Debug, Deserialize)]
struct CiteBody {
    #[serde(default)]
    items: Option<ItemsPayload>,
    #[serde(rename = "itemIDs", default)]
    item_ids: Option<Vec<ItemId>>,
    #[serde(rename = "citationClusters", default)]
    citation_clusters: Option<Vec<CitationCluster>>,
}

/// Items arrive as a sequence of objects or as an id-to-object mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemsPayload {
    List(Vec<Value>),
    Map(serde_json::Map<String, Value>),
}

async fn handle(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<CiteQuery>,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        (
            StatusCode::OK,
            [
                (header::ALLOW, "POST,OPTIONS"),
                (header::CONTENT_TYPE, "text/plain"),
            ],
            "",
        )
            .into_response()
    } else if method == Method::POST {
        match process(&state, query, &body).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    } else {
        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            "Item data must be POSTed with request",
        )
            .into_response()
    }
}

async fn process(
    state: &AppState,
    query: CiteQuery,
    body: &[u8],
) -> crate::error::Result<Response> {
    let config = configure_request(&query)?;
    let parsed: CiteBody =
        serde_json::from_slice(body).map_err(|e| ServiceError::Parse(e.to_string()))?;

    let (items, item_ids) = collect_items(parsed.items, parsed.item_ids)?;

    let clusters = if config.citations {
        parsed.citation_clusters.ok_or_else(|| {
            ServiceError::Validation("citations requested without citationClusters".to_string())
        })?
    } else {
        Vec::new()
    };

    let ctx = RequestContext::new(config, items, item_ids, clusters);
    let response = RequestPipeline::new(state).run(ctx).await?;
    Ok(response.into_response())
}

/// Resolve query parameters into the per-request configuration.
fn configure_request(query: &CiteQuery) -> crate::error::Result<RequestConfig> {
    Ok(RequestConfig {
        bibliography: query.bibliography == "1",
        citations: query.citations == "1",
        output_format: query.outputformat.parse()?,
        json_response: query.responseformat == "json",
        locale: query.locale.clone(),
        style: query.style.clone(),
    })
}

/// Build the item map and ordered ID list from the posted payload.
///
/// Sequence form: appearance order defines the ID order. Mapping form:
/// each value's `id` must agree with its key, and ordering is whatever the
/// map yields. An explicit `itemIDs` list overrides either ordering.
fn collect_items(
    payload: Option<ItemsPayload>,
    explicit_ids: Option<Vec<ItemId>>,
) -> crate::error::Result<(HashMap<String, Value>, Vec<ItemId>)> {
    let mut items = HashMap::new();
    let mut order = Vec::new();

    match payload {
        Some(ItemsPayload::List(list)) => {
            for item in list {
                let id = item_id_of(&item).ok_or_else(|| {
                    ServiceError::Validation("item missing string or numeric id".to_string())
                })?;
                order.push(ItemId(id.clone()));
                items.insert(id, item);
            }
        }
        Some(ItemsPayload::Map(map)) => {
            for (key, item) in map {
                match item_id_of(&item) {
                    Some(id) if id == key => {}
                    _ => {
                        return Err(ServiceError::Validation(
                            "Item ID did not match Object index".to_string(),
                        ))
                    }
                }
                order.push(ItemId(key.clone()));
                items.insert(key, item);
            }
        }
        None => {}
    }

    let order = explicit_ids.unwrap_or(order);
    Ok((items, order))
}

/// Item `id` as a string; accepts JSON strings and integers.
fn item_id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
