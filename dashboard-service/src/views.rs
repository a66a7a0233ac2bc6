use std::collections::{HashMap, HashSet};

use serde::Serialize;
use time::OffsetDateTime;

use crate::aggregate;
use crate::chart::{self, ChartPoint, PeriodTotals, MAX_CHART_POINTS};
use crate::rank::{self, GeneratorFilter, SortKey};
use crate::state::ViewState;
use crate::store::{self, MarketData, GENERATOR_LIST_SCAN_ROWS, MAX_INTERVAL_ROWS};
use crate::window::DateRange;

/// One generator in the live list: its newest telemetry reading. `latest_mw`
/// stays `None` when the unit reported a null value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorListEntry {
    pub duid: String,
    pub latest_mw: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub as_of: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorListView {
    pub generators: Vec<GeneratorListEntry>,
    pub unit_count: usize,
    pub error: Option<String>,
}

/// Chart response for one unit: identity, the downsampled series, stat-card
/// totals over the full window and the degraded-path flag.
#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub duid: String,
    pub station_name: Option<String>,
    pub region: Option<String>,
    pub fuel_source: Option<String>,
    pub range: String,
    pub points: Vec<ChartPoint>,
    pub totals: PeriodTotals,
    pub degraded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub duid: String,
    pub station_name: Option<String>,
    pub region: Option<String>,
    pub fuel_source: Option<String>,
    pub total_revenue: f64,
    pub market_share_pct: f64,
    pub avg_power_mw: f64,
    pub capacity_factor_pct: f64,
    pub revenue_per_mw: f64,
    pub performance_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardView {
    pub entries: Vec<LeaderboardEntry>,
    pub market_revenue: f64,
    pub error: Option<String>,
}

/// Everything one refresh produces, in the shape the SSE stream emits.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generation: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub refreshed_at: OffsetDateTime,
    pub state: ViewState,
    pub generators: GeneratorListView,
    pub revenue_leaderboard: LeaderboardView,
    pub performance_leaderboard: LeaderboardView,
    pub chart: Option<ChartView>,
}

/// Builds the generator list from the newest telemetry scan: first (latest)
/// row per DUID wins. Query failure renders as an empty list with an error.
pub async fn generator_list(store: &dyn MarketData) -> GeneratorListView {
    let rows = match store.latest_readings(GENERATOR_LIST_SCAN_ROWS).await {
        Ok(rows) => rows,
        Err(e) => {
            return GeneratorListView {
                generators: Vec::new(),
                unit_count: 0,
                error: Some(e.to_string()),
            }
        }
    };

    let mut seen = HashSet::new();
    let mut generators = Vec::new();
    for row in rows {
        if seen.insert(row.duid.clone()) {
            generators.push(GeneratorListEntry {
                duid: row.duid,
                latest_mw: row.scadavalue,
                as_of: row.settlementdate,
            });
        }
    }

    let unit_count = generators.len();
    GeneratorListView {
        generators,
        unit_count,
        error: None,
    }
}

/// Chart for one unit over a window. `None` means the DUID is unknown;
/// fetch problems come back as a renderable view with the error set.
pub async fn unit_chart(
    store: &dyn MarketData,
    duid: &str,
    range: DateRange,
    now: OffsetDateTime,
) -> Option<ChartView> {
    let generator = match store.generator(duid).await {
        Ok(Some(g)) => g,
        Ok(None) => return None,
        Err(e) => {
            return Some(ChartView {
                duid: duid.to_string(),
                station_name: None,
                region: None,
                fuel_source: None,
                range: range.key().to_string(),
                points: Vec::new(),
                totals: chart::period_totals(&[]),
                degraded: false,
                error: Some(e.to_string()),
            })
        }
    };

    let (from, to) = range.window(now);
    let (points, totals, degraded, error) =
        match store::chart_window(store, &generator, from, to).await {
            Ok(series) => {
                let totals = chart::period_totals(&series.points);
                let points = chart::downsample(series.points, MAX_CHART_POINTS);
                (points, totals, series.degraded, None)
            }
            Err(e) => (
                Vec::new(),
                chart::period_totals(&[]),
                false,
                Some(e.to_string()),
            ),
        };

    Some(ChartView {
        duid: generator.duid,
        station_name: generator.station_name,
        region: generator.region,
        fuel_source: generator.fuel_source_primary,
        range: range.key().to_string(),
        points,
        totals,
        degraded,
        error,
    })
}

/// Filtered, ranked leaderboard over one window. The region facet rides the
/// row query; fuel and search facets apply after the metadata join.
pub async fn leaderboard(
    store: &dyn MarketData,
    filter: &GeneratorFilter,
    range: DateRange,
    sort: SortKey,
    limit: usize,
    now: OffsetDateTime,
) -> LeaderboardView {
    let (from, to) = range.window(now);

    let fetched = tokio::try_join!(
        store.revenue_for_market(&filter.regions, from, to, MAX_INTERVAL_ROWS),
        store.generators(),
    );
    let (rows, generators) = match fetched {
        Ok(pair) => pair,
        Err(e) => {
            return LeaderboardView {
                entries: Vec::new(),
                market_revenue: 0.0,
                error: Some(e.to_string()),
            }
        }
    };

    let meta: HashMap<String, _> = generators.into_iter().map(|g| (g.duid.clone(), g)).collect();
    let summaries = aggregate::summarize(&rows, &meta, range.hours());
    let filtered = rank::filter_summaries(summaries, &meta, filter);
    let ranking = rank::rank(filtered, sort, limit);

    let entries = ranking
        .entries
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let market_share_pct = if ranking.market_revenue > 0.0 {
                100.0 * s.total_revenue / ranking.market_revenue
            } else {
                0.0
            };
            let generator = meta.get(&s.duid);
            LeaderboardEntry {
                rank: i + 1,
                station_name: generator.map(|g| g.display_name().to_string()),
                duid: s.duid,
                region: generator.and_then(|g| g.region.clone()),
                fuel_source: generator.and_then(|g| g.fuel_source_primary.clone()),
                total_revenue: s.total_revenue,
                market_share_pct,
                avg_power_mw: s.avg_power_mw,
                capacity_factor_pct: s.capacity_factor_pct,
                revenue_per_mw: s.revenue_per_mw,
                performance_score: s.performance_score,
            }
        })
        .collect();

    LeaderboardView {
        entries,
        market_revenue: ranking.market_revenue,
        error: None,
    }
}

/// One full dashboard refresh: list, both leaderboards and the selected
/// unit's chart, fetched concurrently.
pub async fn snapshot(
    store: &dyn MarketData,
    state: &ViewState,
    generation: u64,
    now: OffsetDateTime,
) -> DashboardSnapshot {
    let chart_fut = async {
        match state.selected_duid.as_deref() {
            Some(duid) => unit_chart(store, duid, state.range, now).await,
            None => None,
        }
    };

    let (generators, revenue_leaderboard, performance_leaderboard, chart) = tokio::join!(
        generator_list(store),
        leaderboard(
            store,
            &state.filter,
            state.range,
            SortKey::TotalRevenue,
            rank::REVENUE_LEADERBOARD_SIZE,
            now,
        ),
        leaderboard(
            store,
            &state.filter,
            state.range,
            SortKey::PerformanceScore,
            rank::PERFORMANCE_LEADERBOARD_SIZE,
            now,
        ),
        chart_fut,
    );

    DashboardSnapshot {
        generation,
        refreshed_at: now,
        state: state.clone(),
        generators,
        revenue_leaderboard,
        performance_leaderboard,
        chart,
    }
}

/// Compact money formatting for report output: $1.23M, $45.6K, $789.
pub fn fmt_revenue(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${value:.0}")
    }
}
