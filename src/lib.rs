pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod session;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::cache::ViewCache;
use crate::session::SessionCodec;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: SessionCodec,
    pub views: ViewCache,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> anyhow::Result<Self> {
        let sessions =
            SessionCodec::new(&config.auth.session_secret, config.auth.session_ttl_hours)?;
        let views = ViewCache::new(&config.cache);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Ok(Self {
            config,
            db,
            sessions,
            views,
            rate_limiter,
            metrics_handle: None,
        })
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
