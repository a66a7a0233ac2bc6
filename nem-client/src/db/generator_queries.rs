use anyhow::Result;
use sqlx::PgPool;

use crate::domain::Generator;

const COLUMNS: &str = r#"
        duid,
        station_name,
        participant,
        region,
        fuel_source_primary,
        reg_cap_mw,
        max_cap_mw
"#;

/// Fetch the full generator reference table. It is small (a few thousand
/// rows) and joined in memory against interval data.
pub async fn all(pool: &PgPool) -> Result<Vec<Generator>> {
    let sql = format!("SELECT {COLUMNS} FROM nem_generators ORDER BY duid");
    let rows = sqlx::query_as::<_, Generator>(&sql).fetch_all(pool).await?;

    Ok(rows)
}

/// Fetch reference data for a single unit, if it is listed.
pub async fn by_duid(pool: &PgPool, duid: &str) -> Result<Option<Generator>> {
    let sql = format!("SELECT {COLUMNS} FROM nem_generators WHERE duid = $1");
    let row = sqlx::query_as::<_, Generator>(&sql)
        .bind(duid)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}
