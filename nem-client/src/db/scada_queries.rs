use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::ScadaReading;

/// Fetch the newest telemetry rows across all units, newest first. Callers
/// deduplicate by DUID to obtain a latest-output-per-unit listing.
pub async fn latest_readings(pool: &PgPool, limit: i64) -> Result<Vec<ScadaReading>> {
    let rows = sqlx::query_as::<_, ScadaReading>(
        r#"
        SELECT
            settlementdate,
            duid,
            scadavalue
        FROM dispatch_unit_scada
        ORDER BY settlementdate DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch time-ordered telemetry for a single unit inside a settlement
/// window, capped at `limit` rows.
pub async fn unit_window(
    pool: &PgPool,
    duid: &str,
    from: OffsetDateTime,
    to: OffsetDateTime,
    limit: i64,
) -> Result<Vec<ScadaReading>> {
    let rows = sqlx::query_as::<_, ScadaReading>(
        r#"
        SELECT
            settlementdate,
            duid,
            scadavalue
        FROM dispatch_unit_scada
        WHERE duid = $1
          AND settlementdate >= $2
          AND settlementdate <= $3
        ORDER BY settlementdate
        LIMIT $4
        "#,
    )
    .bind(duid)
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
