use anyhow::Result;
use dashboard_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability,
    refresh::Refresher,
    state::{StateStore, ViewState},
    store::{MarketData, PgMarketData},
};
use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store: Arc<dyn MarketData> = Arc::new(PgMarketData::connect(&cfg.database).await?);
    let state = Arc::new(StateStore::new(ViewState {
        auto_refresh: cfg.refresh.auto_start,
        ..Default::default()
    }));

    let (refresher, snapshots) = Refresher::new(
        store.clone(),
        state.clone(),
        Duration::from_secs(cfg.refresh.interval_secs),
    );
    tokio::spawn(refresher.run());

    let app = AppState {
        store,
        state,
        snapshots,
    };
    api::serve(app, &cfg.http.bind_addr).await
}
