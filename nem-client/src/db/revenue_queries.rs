use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::RevenueInterval;

/// Fetch the time-ordered revenue intervals for a single unit inside a
/// settlement window, capped at `limit` rows.
pub async fn unit_window(
    pool: &PgPool,
    duid: &str,
    from: OffsetDateTime,
    to: OffsetDateTime,
    limit: i64,
) -> Result<Vec<RevenueInterval>> {
    let rows = sqlx::query_as::<_, RevenueInterval>(
        r#"
        SELECT
            settlementdate,
            duid,
            regionid,
            scada_mw,
            rrp,
            revenue_5min
        FROM nem_revenue_reporting
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

/// Fetch revenue intervals across all units inside a window, optionally
/// restricted to a set of regions. An empty region slice means no region
/// restriction.
pub async fn market_window(
    pool: &PgPool,
    regions: &[String],
    from: OffsetDateTime,
    to: OffsetDateTime,
    limit: i64,
) -> Result<Vec<RevenueInterval>> {
    // Two static statements instead of one dynamic one: the region filter is
    // the only optional predicate, and `= ANY` with an empty array would
    // match nothing rather than everything.
    let rows = if regions.is_empty() {
        sqlx::query_as::<_, RevenueInterval>(
            r#"
            SELECT
                settlementdate,
                duid,
                regionid,
                scada_mw,
                rrp,
                revenue_5min
            FROM nem_revenue_reporting
            WHERE settlementdate >= $1
              AND settlementdate <= $2
            ORDER BY settlementdate
            LIMIT $3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, RevenueInterval>(
            r#"
            SELECT
                settlementdate,
                duid,
                regionid,
                scada_mw,
                rrp,
                revenue_5min
            FROM nem_revenue_reporting
            WHERE settlementdate >= $1
              AND settlementdate <= $2
              AND regionid = ANY($3)
            ORDER BY settlementdate
            LIMIT $4
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(regions)
        .bind(limit)
        .fetch_all(pool)
        .await?
    };

    Ok(rows)
}
