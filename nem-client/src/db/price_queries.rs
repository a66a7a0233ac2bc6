use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::DispatchPrice;

/// Fetch time-ordered regional reference prices inside a settlement window,
/// capped at `limit` rows.
pub async fn region_window(
    pool: &PgPool,
    regionid: &str,
    from: OffsetDateTime,
    to: OffsetDateTime,
    limit: i64,
) -> Result<Vec<DispatchPrice>> {
    let rows = sqlx::query_as::<_, DispatchPrice>(
        r#"
        SELECT
            settlementdate,
            regionid,
            pre_ap_energy_price
        FROM dispatch_prices
        WHERE regionid = $1
          AND settlementdate >= $2
          AND settlementdate <= $3
        ORDER BY settlementdate
        LIMIT $4
        "#,
    )
    .bind(regionid)
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
