use time::OffsetDateTime;

/// One row of `nem_revenue_reporting`: precomputed revenue for a unit and
/// settlement interval. Metric columns are nullable upstream; consumers treat
/// a missing value as zero.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RevenueInterval {
    pub settlementdate: OffsetDateTime,
    pub duid: String,
    pub regionid: Option<String>,
    pub scada_mw: Option<f64>,
    pub rrp: Option<f64>,
    pub revenue_5min: Option<f64>,
}
