/// One row of `nem_generators`: reference data for a registered generating
/// unit, keyed by its unique DUID. Capacity columns may be absent for units
/// that never lodged registration data.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Generator {
    pub duid: String,
    pub station_name: Option<String>,
    pub participant: Option<String>,
    pub region: Option<String>,
    pub fuel_source_primary: Option<String>,
    pub reg_cap_mw: Option<f64>,
    pub max_cap_mw: Option<f64>,
}

impl Generator {
    /// Station name when known, otherwise the DUID itself.
    pub fn display_name(&self) -> &str {
        self.station_name.as_deref().unwrap_or(&self.duid)
    }
}
