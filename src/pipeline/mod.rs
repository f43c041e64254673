//! Request resolution pipeline
//!
//! A fixed, ordered sequence of steps per request: resolve the style,
//! try the engine pool, fetch the style text on a miss, build an engine if
//! none is bound, then execute. Each step consumes and returns the owned
//! request state; any failure short-circuits the remaining steps via `?`
//! and funnels into the terminal handler, `ServiceError::into_response`.
//! Once an engine is bound, the fetch and build steps are skipped
//! entirely, so a pooled engine is never redundantly reconstructed.

pub mod executor;

use std::collections::HashMap;

use serde_json::Value;

use crate::engine::pool::CacheKey;
use crate::engine::{CitationCluster, FormatEngine, ItemId, OutputFormat};
use crate::error::Result;
use crate::state::AppState;
use crate::styles::StyleUrl;

use executor::CiteResponse;

/// Resolved per-request configuration.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub bibliography: bool,
    pub citations: bool,
    pub output_format: OutputFormat,
    pub json_response: bool,
    pub locale: String,
    pub style: String,
}

/// Per-request mutable aggregate, created once the body has been received
/// and parsed, discarded when the response is produced.
pub struct RequestContext {
    pub config: RequestConfig,
    /// Raw item objects by ID; handed over to the engine when one binds.
    pub items: HashMap<String, Value>,
    /// Caller-supplied item ordering.
    pub item_ids: Vec<ItemId>,
    /// Citation clusters, in desired output order.
    pub clusters: Vec<CitationCluster>,
}

impl RequestContext {
    pub fn new(
        config: RequestConfig,
        items: HashMap<String, Value>,
        item_ids: Vec<ItemId>,
        clusters: Vec<CitationCluster>,
    ) -> Self {
        Self {
            config,
            items,
            item_ids,
            clusters,
        }
    }
}

/// Request state once the style identifier has been resolved; every later
/// step operates on this.
pub struct ResolvedRequest {
    pub request: RequestContext,
    pub style: StyleUrl,
    pub key: CacheKey,
    /// Bound engine, pooled or freshly built.
    pub engine: Option<Box<dyn FormatEngine>>,
}

/// Drives one request through the fixed step sequence.
pub struct RequestPipeline<'a> {
    state: &'a AppState,
}

impl<'a> RequestPipeline<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn run(&self, ctx: RequestContext) -> Result<CiteResponse> {
        let resolved = self.resolve_style(ctx).await?;
        let mut resolved = self.try_pool_hit(resolved);
        if resolved.engine.is_none() {
            let style_xml = self.fetch_style(&resolved).await?;
            self.build_engine(&mut resolved, &style_xml)?;
        }
        executor::execute(self.state, resolved)
    }

    /// Step 1: normalize the requested style into its canonical URL and
    /// compose the pool key.
    async fn resolve_style(&self, ctx: RequestContext) -> Result<ResolvedRequest> {
        let resolver = self.state.resolver();
        let style = resolver.process_style_identifier(&ctx.config.style)?;
        let style = resolver.resolve_style(&style).await?;
        tracing::debug!(style = %style.href, "style resolved");
        let key = CacheKey::new(style.href.clone(), ctx.config.locale.clone());
        Ok(ResolvedRequest {
            request: ctx,
            style,
            key,
            engine: None,
        })
    }

    /// Step 2: reuse a pooled engine when one is idle for this key. A miss
    /// simply leaves the engine unbound.
    fn try_pool_hit(&self, mut resolved: ResolvedRequest) -> ResolvedRequest {
        if let Some(mut engine) = self.state.pool().load(&resolved.key) {
            tracing::debug!(key = %resolved.key, "engine pool hit");
            engine.bind_items(std::mem::take(&mut resolved.request.items));
            resolved.engine = Some(engine);
        }
        resolved
    }

    /// Step 3: fetch the style definition text; only runs on a pool miss.
    async fn fetch_style(&self, resolved: &ResolvedRequest) -> Result<String> {
        let xml = self.state.resolver().fetch_style(&resolved.style).await?;
        tracing::debug!(style = %resolved.style.href, "style text fetched");
        Ok(xml)
    }

    /// Step 4: build a fresh engine and bind the request's items to it;
    /// only runs when no engine is bound yet.
    fn build_engine(&self, resolved: &mut ResolvedRequest, style_xml: &str) -> Result<()> {
        let mut engine = self.state.factory().build(
            style_xml,
            self.state.locales(),
            &resolved.request.config.locale,
        )?;
        engine.bind_items(std::mem::take(&mut resolved.request.items));
        resolved.engine = Some(engine);
        Ok(())
    }
}
