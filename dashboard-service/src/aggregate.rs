use std::collections::HashMap;

use nem_client::domain::{Generator, RevenueInterval};
use serde::Serialize;

/// Settlement intervals are five minutes, so MW held for one interval is
/// MW / 12 in MWh.
pub const INTERVALS_PER_HOUR: f64 = 12.0;

const SCORE_CAPACITY_WEIGHT: f64 = 0.6;
const SCORE_REVENUE_WEIGHT: f64 = 0.4;
/// Normalization constant for revenue-per-MW inside the score. Rankings are
/// only reproducible across releases if this value never drifts.
const SCORE_REVENUE_SCALE: f64 = 1000.0;

/// Windowed per-generator metrics. Recomputed on every query, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorSummary {
    pub duid: String,
    pub total_revenue: f64,
    pub total_energy_mwh: f64,
    pub avg_power_mw: f64,
    pub capacity_factor_pct: f64,
    pub utilization_pct: f64,
    pub revenue_per_mw: f64,
    pub performance_score: f64,
    pub sample_count: u32,
}

#[derive(Debug)]
struct UnitAccumulator {
    max_cap_mw: f64,
    total_revenue: f64,
    power_sum_mw: f64,
    sample_count: u32,
}

impl UnitAccumulator {
    fn new(max_cap_mw: f64) -> Self {
        Self {
            max_cap_mw,
            total_revenue: 0.0,
            power_sum_mw: 0.0,
            sample_count: 0,
        }
    }

    fn add(&mut self, rec: &RevenueInterval) {
        self.total_revenue += rec.revenue_5min.unwrap_or(0.0);
        self.power_sum_mw += rec.scada_mw.unwrap_or(0.0);
        self.sample_count += 1;
    }

    fn finish(self, duid: String, window_hours: f64) -> GeneratorSummary {
        let total_energy_mwh = self.power_sum_mw / INTERVALS_PER_HOUR;
        let avg_power_mw = if self.sample_count == 0 {
            0.0
        } else {
            self.power_sum_mw / self.sample_count as f64
        };

        let max_possible_mwh = self.max_cap_mw * window_hours;
        let capacity_factor_pct = if max_possible_mwh > 0.0 {
            100.0 * total_energy_mwh / max_possible_mwh
        } else {
            0.0
        };
        // max_cap_mw is positive; checked when the unit was admitted.
        let utilization_pct = 100.0 * avg_power_mw / self.max_cap_mw;
        let revenue_per_mw = self.total_revenue / self.max_cap_mw;

        let performance_score = SCORE_CAPACITY_WEIGHT * capacity_factor_pct.min(100.0)
            + SCORE_REVENUE_WEIGHT * (revenue_per_mw / SCORE_REVENUE_SCALE);

        GeneratorSummary {
            duid,
            total_revenue: self.total_revenue,
            total_energy_mwh,
            avg_power_mw,
            capacity_factor_pct,
            utilization_pct,
            revenue_per_mw,
            performance_score,
            sample_count: self.sample_count,
        }
    }
}

/// Reduces a window of revenue intervals into per-generator summaries.
///
/// Rows without metadata or without a positive `max_cap_mw` are dropped, as
/// are finished summaries with no revenue. `window_hours` must be
/// non-negative; user-supplied ranges are validated at the HTTP boundary
/// before they reach this point.
pub fn summarize(
    records: &[RevenueInterval],
    meta: &HashMap<String, Generator>,
    window_hours: f64,
) -> HashMap<String, GeneratorSummary> {
    assert!(
        window_hours >= 0.0,
        "window_hours must be non-negative, got {window_hours}"
    );

    let mut units: HashMap<String, UnitAccumulator> = HashMap::new();
    for rec in records {
        let Some(max_cap_mw) = meta
            .get(&rec.duid)
            .and_then(|g| g.max_cap_mw)
            .filter(|cap| *cap > 0.0)
        else {
            continue;
        };
        units
            .entry(rec.duid.clone())
            .or_insert_with(|| UnitAccumulator::new(max_cap_mw))
            .add(rec);
    }

    units
        .into_iter()
        .filter_map(|(duid, acc)| {
            let summary = acc.finish(duid, window_hours);
            (summary.total_revenue > 0.0).then(|| (summary.duid.clone(), summary))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn rec(duid: &str, mw: f64, revenue: f64) -> RevenueInterval {
        RevenueInterval {
            settlementdate: datetime!(2025-06-01 00:00:00 UTC),
            duid: duid.to_string(),
            regionid: Some("NSW1".to_string()),
            scada_mw: Some(mw),
            rrp: Some(500.0),
            revenue_5min: Some(revenue),
        }
    }

    fn generator(duid: &str, max_cap: Option<f64>) -> Generator {
        Generator {
            duid: duid.to_string(),
            station_name: Some(format!("{duid} Power Station")),
            participant: Some("Acme Energy".to_string()),
            region: Some("NSW1".to_string()),
            fuel_source_primary: Some("Coal".to_string()),
            reg_cap_mw: max_cap,
            max_cap_mw: max_cap,
        }
    }

    fn meta(generators: Vec<Generator>) -> HashMap<String, Generator> {
        generators.into_iter().map(|g| (g.duid.clone(), g)).collect()
    }

    #[test]
    fn worked_example_one_hour_at_nameplate() {
        // Twelve intervals at 100 MW and $500 each, 100 MW unit, 1 h window.
        let records: Vec<_> = (0..12).map(|_| rec("UNIT1", 100.0, 500.0)).collect();
        let meta = meta(vec![generator("UNIT1", Some(100.0))]);

        let out = summarize(&records, &meta, 1.0);
        let s = &out["UNIT1"];

        assert_eq!(s.sample_count, 12);
        assert!((s.total_revenue - 6000.0).abs() < 1e-9);
        assert!((s.total_energy_mwh - 100.0).abs() < 1e-9);
        assert!((s.avg_power_mw - 100.0).abs() < 1e-9);
        assert!((s.capacity_factor_pct - 100.0).abs() < 1e-9);
        assert!((s.utilization_pct - 100.0).abs() < 1e-9);
        assert!((s.revenue_per_mw - 60.0).abs() < 1e-9);
        assert!((s.performance_score - 60.024).abs() < 1e-9);
    }

    #[test]
    fn capacity_factor_is_clamped_inside_the_score() {
        // 150 MW telemetry against a 100 MW nameplate: CF 150 %, but the
        // score takes min(CF, 100).
        let records: Vec<_> = (0..12).map(|_| rec("HOT1", 150.0, 100.0)).collect();
        let meta = meta(vec![generator("HOT1", Some(100.0))]);

        let out = summarize(&records, &meta, 1.0);
        let s = &out["HOT1"];

        assert!((s.capacity_factor_pct - 150.0).abs() < 1e-9);
        let expected = 0.6 * 100.0 + 0.4 * (s.revenue_per_mw / 1000.0);
        assert!((s.performance_score - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_or_capacityless_units_are_dropped() {
        let records = vec![
            rec("KNOWN1", 50.0, 10.0),
            rec("GHOST1", 50.0, 10.0),
            rec("NOCAP1", 50.0, 10.0),
            rec("ZCAP1", 50.0, 10.0),
        ];
        let meta = meta(vec![
            generator("KNOWN1", Some(100.0)),
            generator("NOCAP1", None),
            generator("ZCAP1", Some(0.0)),
        ]);

        let out = summarize(&records, &meta, 24.0);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("KNOWN1"));
    }

    #[test]
    fn zero_revenue_units_are_dropped() {
        let records = vec![rec("IDLE1", 80.0, 0.0)];
        let meta = meta(vec![generator("IDLE1", Some(100.0))]);

        assert!(summarize(&records, &meta, 24.0).is_empty());
    }

    #[test]
    fn missing_fields_count_as_zero() {
        let mut r = rec("PART1", 0.0, 25.0);
        r.scada_mw = None;
        let meta = meta(vec![generator("PART1", Some(100.0))]);

        let out = summarize(&[r], &meta, 24.0);
        let s = &out["PART1"];
        assert_eq!(s.total_energy_mwh, 0.0);
        assert_eq!(s.avg_power_mw, 0.0);
        assert_eq!(s.capacity_factor_pct, 0.0);
        assert!((s.revenue_per_mw - 0.25).abs() < 1e-9);
        assert!(s.performance_score.is_finite());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let meta = meta(vec![generator("UNIT1", Some(100.0))]);
        assert!(summarize(&[], &meta, 24.0).is_empty());
    }

    #[test]
    fn zero_window_yields_zero_capacity_factor() {
        let records = vec![rec("UNIT1", 100.0, 500.0)];
        let meta = meta(vec![generator("UNIT1", Some(100.0))]);

        let out = summarize(&records, &meta, 0.0);
        let s = &out["UNIT1"];
        assert_eq!(s.capacity_factor_pct, 0.0);
        assert!(s.performance_score.is_finite());
    }

    #[test]
    #[should_panic(expected = "window_hours must be non-negative")]
    fn negative_window_panics() {
        summarize(&[], &HashMap::new(), -1.0);
    }
}
