//! Startup engine pre-warming
//!
//! Runs the resolve, fetch, and build steps for the configured default
//! styles against the default locale and saves each fresh engine straight
//! into the pool, so the first real requests for those styles skip engine
//! construction. Runs to completion before the listener binds; any failure
//! aborts startup.

use crate::engine::pool::CacheKey;
use crate::error::Result;
use crate::locales::DEFAULT_LOCALE;
use crate::state::AppState;

pub async fn precache_engines(state: &AppState) -> Result<()> {
    let resolver = state.resolver();
    for style_name in &state.config().cache.precache_styles {
        let style = resolver.process_style_identifier(style_name)?;
        let style = resolver.resolve_style(&style).await?;
        let xml = resolver.fetch_style(&style).await?;
        let engine = state
            .factory()
            .build(&xml, state.locales(), DEFAULT_LOCALE)?;
        state
            .pool()
            .save(engine, CacheKey::new(style.href.clone(), DEFAULT_LOCALE));
        tracing::info!(style = %style.href, "precached engine");
    }
    Ok(())
}
