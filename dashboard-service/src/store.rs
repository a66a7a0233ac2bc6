use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use nem_client::db::{self, generator_queries, price_queries, revenue_queries, scada_queries};
use nem_client::domain::{DispatchPrice, Generator, RevenueInterval, ScadaReading};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::chart::{self, ChartPoint};
use crate::config::DatabaseConfig;

/// Hard cap on interval rows fetched per query window.
pub const MAX_INTERVAL_ROWS: i64 = 2000;
/// Telemetry rows scanned to derive the generator list.
pub const GENERATOR_LIST_SCAN_ROWS: i64 = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("store query failed: {0}")]
    Query(String),
}

/// Row-retrieval boundary over the market store. Everything above this trait
/// is storage-agnostic; tests substitute an in-memory implementation.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn latest_readings(&self, limit: i64) -> Result<Vec<ScadaReading>, FetchError>;

    async fn generators(&self) -> Result<Vec<Generator>, FetchError>;

    async fn generator(&self, duid: &str) -> Result<Option<Generator>, FetchError>;

    async fn revenue_for_unit(
        &self,
        duid: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RevenueInterval>, FetchError>;

    async fn revenue_for_market(
        &self,
        regions: &[String],
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RevenueInterval>, FetchError>;

    async fn scada_for_unit(
        &self,
        duid: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<ScadaReading>, FetchError>;

    async fn prices_for_region(
        &self,
        regionid: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<DispatchPrice>, FetchError>;

    async fn ping(&self) -> Result<(), FetchError>;
}

pub struct PgMarketData {
    pool: PgPool,
}

impl PgMarketData {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.uri)
            .await?;
        Ok(Self::new(pool))
    }

    async fn timed<T, F>(&self, query: &'static str, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();
        let result = fut.await;
        metrics::histogram!("store_query_duration_seconds", "query" => query)
            .record(started.elapsed().as_secs_f64());

        result.map_err(|e| {
            metrics::counter!("store_query_errors_total", "query" => query).increment(1);
            tracing::error!(error = %e, query, "store query failed");
            FetchError::Query(e.to_string())
        })
    }
}

#[async_trait]
impl MarketData for PgMarketData {
    async fn latest_readings(&self, limit: i64) -> Result<Vec<ScadaReading>, FetchError> {
        self.timed("scada_latest", scada_queries::latest_readings(&self.pool, limit))
            .await
    }

    async fn generators(&self) -> Result<Vec<Generator>, FetchError> {
        self.timed("generators_all", generator_queries::all(&self.pool))
            .await
    }

    async fn generator(&self, duid: &str) -> Result<Option<Generator>, FetchError> {
        self.timed("generator_by_duid", generator_queries::by_duid(&self.pool, duid))
            .await
    }

    async fn revenue_for_unit(
        &self,
        duid: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RevenueInterval>, FetchError> {
        self.timed(
            "revenue_unit_window",
            revenue_queries::unit_window(&self.pool, duid, from, to, limit),
        )
        .await
    }

    async fn revenue_for_market(
        &self,
        regions: &[String],
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<RevenueInterval>, FetchError> {
        self.timed(
            "revenue_market_window",
            revenue_queries::market_window(&self.pool, regions, from, to, limit),
        )
        .await
    }

    async fn scada_for_unit(
        &self,
        duid: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<ScadaReading>, FetchError> {
        self.timed(
            "scada_unit_window",
            scada_queries::unit_window(&self.pool, duid, from, to, limit),
        )
        .await
    }

    async fn prices_for_region(
        &self,
        regionid: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<DispatchPrice>, FetchError> {
        self.timed(
            "prices_region_window",
            price_queries::region_window(&self.pool, regionid, from, to, limit),
        )
        .await
    }

    async fn ping(&self) -> Result<(), FetchError> {
        self.timed("ping", db::ping(&self.pool)).await
    }
}

/// A charted window: the full point series plus whether it came from the
/// degraded telemetry-times-price path instead of the revenue table.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
    pub degraded: bool,
}

/// Fetches the chart series for one unit. The revenue table is authoritative;
/// when its query fails or the window is empty there, the series is rebuilt
/// from raw telemetry joined against the unit's regional dispatch prices.
pub async fn chart_window(
    store: &dyn MarketData,
    generator: &Generator,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> Result<ChartSeries, FetchError> {
    match store
        .revenue_for_unit(&generator.duid, from, to, MAX_INTERVAL_ROWS)
        .await
    {
        Ok(rows) if !rows.is_empty() => Ok(ChartSeries {
            points: chart::points_from_revenue(&rows),
            degraded: false,
        }),
        Ok(_) | Err(FetchError::Query(_)) => {
            metrics::counter!("chart_fallback_total").increment(1);
            tracing::warn!(duid = %generator.duid, "revenue series unavailable, rebuilding from telemetry");

            let scada = store
                .scada_for_unit(&generator.duid, from, to, MAX_INTERVAL_ROWS)
                .await?;
            let prices = match generator.region.as_deref() {
                Some(region) => {
                    store
                        .prices_for_region(region, from, to, MAX_INTERVAL_ROWS)
                        .await?
                }
                // No region on file: chart telemetry with zero prices.
                None => Vec::new(),
            };

            Ok(ChartSeries {
                points: chart::join_scada_prices(&scada, &prices),
                degraded: true,
            })
        }
    }
}
