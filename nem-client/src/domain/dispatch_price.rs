use time::OffsetDateTime;

/// One row of `dispatch_prices`: the regional reference price for a
/// settlement interval, used to reprice raw telemetry when the revenue
/// table cannot serve a window.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DispatchPrice {
    pub settlementdate: OffsetDateTime,
    pub regionid: String,
    pub pre_ap_energy_price: Option<f64>,
}
