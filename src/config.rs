//! Configuration management for the citation server

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub styles: StyleRepoConfig,
    pub locales: LocaleConfig,
    pub cache: EngineCacheConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StyleRepoConfig {
    /// Directory holding `<name>.csl` style definitions.
    pub dir: PathBuf,
    /// Canonical base URL that short style names resolve under.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct LocaleConfig {
    /// Directory scanned at startup for `locales-<code>.xml` files.
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EngineCacheConfig {
    /// Maximum number of distinct style+locale keys retained in the pool.
    pub engine_cache_size: usize,
    /// Run pool eviction every this many saves.
    pub clean_interval: u64,
    /// Styles built and pooled before the listener starts.
    pub precache_styles: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8085,
            },
            styles: StyleRepoConfig {
                dir: PathBuf::from("./styles"),
                base_url: "http://www.zotero.org/styles".to_string(),
            },
            locales: LocaleConfig {
                dir: PathBuf::from("./locales"),
            },
            cache: EngineCacheConfig {
                engine_cache_size: 100,
                clean_interval: 60,
                precache_styles: vec!["chicago-author-date".to_string()],
            },
        }
    }
}

impl Config {
    /// Build a configuration from the environment, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            server: ServerConfig {
                host: env::var("CITE_HOST").unwrap_or(defaults.server.host),
                port: env::var("CITE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            styles: StyleRepoConfig {
                dir: env::var("CITE_STYLES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.styles.dir),
                base_url: env::var("CITE_STYLES_BASE_URL").unwrap_or(defaults.styles.base_url),
            },
            locales: LocaleConfig {
                dir: env::var("CITE_LOCALES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.locales.dir),
            },
            cache: EngineCacheConfig {
                engine_cache_size: env::var("CITE_ENGINE_CACHE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.cache.engine_cache_size),
                clean_interval: env::var("CITE_CACHE_CLEAN_INTERVAL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.cache.clean_interval),
                precache_styles: env::var("CITE_PRECACHE_STYLES")
                    .map(|v| {
                        v.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.cache.precache_styles),
            },
        }
    }
}
