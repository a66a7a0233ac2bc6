use std::collections::HashMap;

use nem_client::domain::{DispatchPrice, RevenueInterval, ScadaReading};
use serde::Serialize;
use time::OffsetDateTime;

use crate::aggregate::INTERVALS_PER_HOUR;

/// Plot ceiling per series; totals are still taken over the full row set.
pub const MAX_CHART_POINTS: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub settlementdate: OffsetDateTime,
    pub mw: f64,
    pub rrp: f64,
    pub revenue: f64,
}

/// Stat-card totals for the charted window, computed before downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodTotals {
    pub total_revenue: f64,
    pub avg_mw: f64,
    pub avg_rrp: f64,
    pub data_points: usize,
}

pub fn points_from_revenue(rows: &[RevenueInterval]) -> Vec<ChartPoint> {
    rows.iter()
        .map(|r| ChartPoint {
            settlementdate: r.settlementdate,
            mw: r.scada_mw.unwrap_or(0.0),
            rrp: r.rrp.unwrap_or(0.0),
            revenue: r.revenue_5min.unwrap_or(0.0),
        })
        .collect()
}

/// Rebuilds chart points from raw telemetry joined against regional dispatch
/// prices, for windows where the revenue table has nothing. Prices join on
/// the exact settlement timestamp; a missing price counts as zero.
pub fn join_scada_prices(scada: &[ScadaReading], prices: &[DispatchPrice]) -> Vec<ChartPoint> {
    let price_by_ts: HashMap<i64, f64> = prices
        .iter()
        .map(|p| {
            (
                p.settlementdate.unix_timestamp(),
                p.pre_ap_energy_price.unwrap_or(0.0),
            )
        })
        .collect();

    scada
        .iter()
        .map(|r| {
            let mw = r.scadavalue.unwrap_or(0.0);
            let rrp = price_by_ts
                .get(&r.settlementdate.unix_timestamp())
                .copied()
                .unwrap_or(0.0);
            ChartPoint {
                settlementdate: r.settlementdate,
                mw,
                rrp,
                revenue: mw * rrp / INTERVALS_PER_HOUR,
            }
        })
        .collect()
}

/// Thins a series to at most `max_points` by keeping every stride-th row,
/// first row always retained. Deterministic for a given input length.
pub fn downsample(points: Vec<ChartPoint>, max_points: usize) -> Vec<ChartPoint> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }
    let stride = points.len().div_ceil(max_points);
    points.into_iter().step_by(stride).collect()
}

pub fn period_totals(points: &[ChartPoint]) -> PeriodTotals {
    let n = points.len();
    if n == 0 {
        return PeriodTotals {
            total_revenue: 0.0,
            avg_mw: 0.0,
            avg_rrp: 0.0,
            data_points: 0,
        };
    }

    PeriodTotals {
        total_revenue: points.iter().map(|p| p.revenue).sum(),
        avg_mw: points.iter().map(|p| p.mw).sum::<f64>() / n as f64,
        avg_rrp: points.iter().map(|p| p.rrp).sum::<f64>() / n as f64,
        data_points: n,
    }
}
