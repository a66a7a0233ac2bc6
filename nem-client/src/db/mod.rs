pub mod generator_queries;
pub mod price_queries;
pub mod revenue_queries;
pub mod scada_queries;

use anyhow::Result;
use sqlx::PgPool;

/// Cheap reachability probe for health checks.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
