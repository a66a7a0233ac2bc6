use time::OffsetDateTime;

/// One row of `dispatch_unit_scada`: metered output of a dispatchable unit
/// for a single 5-minute settlement interval.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScadaReading {
    pub settlementdate: OffsetDateTime,
    pub duid: String,
    pub scadavalue: Option<f64>,
}
