use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::rank::{
    GeneratorFilter, SortKey, PERFORMANCE_LEADERBOARD_SIZE, REVENUE_LEADERBOARD_SIZE,
};
use crate::state::{StateEvent, StatePatch, StateStore, ViewState};
use crate::store::MarketData;
use crate::views::{self, DashboardSnapshot};
use crate::window::DateRange;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketData>,
    pub state: Arc<StateStore>,
    pub snapshots: watch::Receiver<Option<DashboardSnapshot>>,
}

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/generators", get(list_generators))
        .route("/api/generators/:duid/chart", get(unit_chart))
        .route("/api/leaderboard/revenue", get(revenue_leaderboard))
        .route("/api/leaderboard/performance", get(performance_leaderboard))
        .route("/api/state", get(get_state).patch(patch_state))
        .route("/api/events", get(events))
        .with_state(app)
}

pub async fn serve(app: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid API bind address: {bind_addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dashboard API listening");
    axum::serve(listener, router(app).into_make_service()).await?;
    Ok(())
}

/// Contract violations at the HTTP boundary render as 400 with a reason.
#[derive(Debug)]
struct BadRequest(String);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RangeParams {
    range: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

impl RangeParams {
    fn to_range(&self) -> Result<DateRange, BadRequest> {
        DateRange::parse(
            self.range.as_deref(),
            self.start.as_deref(),
            self.end.as_deref(),
        )
        .map_err(|e| BadRequest(e.to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct LeaderboardParams {
    regions: Option<String>,
    fuels: Option<String>,
    search: Option<String>,
    range: Option<String>,
    start: Option<String>,
    end: Option<String>,
    sort: Option<String>,
}

impl LeaderboardParams {
    fn to_filter(&self) -> GeneratorFilter {
        GeneratorFilter::from_csv(
            self.regions.as_deref(),
            self.fuels.as_deref(),
            self.search.as_deref(),
        )
    }

    fn to_range(&self) -> Result<DateRange, BadRequest> {
        DateRange::parse(self.range.as_deref(), self.start.as_deref(), self.end.as_deref())
            .map_err(|e| BadRequest(e.to_string()))
    }
}

async fn healthz(State(app): State<AppState>) -> Response {
    match app.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn list_generators(State(app): State<AppState>) -> Response {
    Json(views::generator_list(app.store.as_ref()).await).into_response()
}

async fn unit_chart(
    State(app): State<AppState>,
    Path(duid): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Response, BadRequest> {
    let range = params.to_range()?;
    let view =
        views::unit_chart(app.store.as_ref(), &duid, range, OffsetDateTime::now_utc()).await;

    Ok(match view {
        Some(view) => Json(view).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown DUID {duid}") })),
        )
            .into_response(),
    })
}

async fn revenue_leaderboard(
    State(app): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Response, BadRequest> {
    let range = params.to_range()?;
    let view = views::leaderboard(
        app.store.as_ref(),
        &params.to_filter(),
        range,
        SortKey::TotalRevenue,
        REVENUE_LEADERBOARD_SIZE,
        OffsetDateTime::now_utc(),
    )
    .await;
    Ok(Json(view).into_response())
}

async fn performance_leaderboard(
    State(app): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Response, BadRequest> {
    let range = params.to_range()?;
    let sort = match params.sort.as_deref() {
        Some(key) => SortKey::parse(key)
            .ok_or_else(|| BadRequest(format!("unknown sort key '{key}'")))?,
        None => SortKey::PerformanceScore,
    };

    let view = views::leaderboard(
        app.store.as_ref(),
        &params.to_filter(),
        range,
        sort,
        PERFORMANCE_LEADERBOARD_SIZE,
        OffsetDateTime::now_utc(),
    )
    .await;
    Ok(Json(view).into_response())
}

async fn get_state(State(app): State<AppState>) -> Json<ViewState> {
    Json(app.state.current())
}

#[derive(Debug, Serialize)]
struct StatePatchResponse {
    state: ViewState,
    events: Vec<StateEvent>,
}

async fn patch_state(
    State(app): State<AppState>,
    Json(patch): Json<StatePatch>,
) -> Result<Json<StatePatchResponse>, BadRequest> {
    if let Some(range) = &patch.range {
        range.validate().map_err(|e| BadRequest(e.to_string()))?;
    }

    let events = app.state.apply(patch);
    Ok(Json(StatePatchResponse {
        state: app.state.current(),
        events,
    }))
}

/// One JSON dashboard snapshot per refresh, as a server-sent-event stream.
/// New subscribers get the current snapshot straight away.
async fn events(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let stream = WatchStream::new(app.snapshots.clone()).filter_map(|snapshot| async move {
        let snapshot = snapshot?;
        match Event::default().event("snapshot").json_data(&snapshot) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::error!(error = %e, "snapshot serialization failed");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemMarketData;
    use nem_client::domain::{Generator, RevenueInterval};
    use time::Duration;

    fn app_with(store: MemMarketData) -> AppState {
        // These handlers never read the snapshot channel.
        let (_tx, rx) = watch::channel(None);
        AppState {
            store: Arc::new(store),
            state: Arc::new(StateStore::new(ViewState::default())),
            snapshots: rx,
        }
    }

    fn seeded_store() -> MemMarketData {
        let now = OffsetDateTime::now_utc();
        MemMarketData {
            generators: vec![Generator {
                duid: "UNIT1".to_string(),
                station_name: Some("Unit One".to_string()),
                participant: Some("Acme Energy".to_string()),
                region: Some("NSW1".to_string()),
                fuel_source_primary: Some("Coal".to_string()),
                reg_cap_mw: Some(100.0),
                max_cap_mw: Some(100.0),
            }],
            revenue: (0..12)
                .map(|i| RevenueInterval {
                    settlementdate: now - Duration::minutes(5 * i),
                    duid: "UNIT1".to_string(),
                    regionid: Some("NSW1".to_string()),
                    scada_mw: Some(80.0),
                    rrp: Some(100.0),
                    revenue_5min: Some(640.0),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn chart_rejects_bad_ranges_with_400() {
        let app = app_with(seeded_store());
        let result = unit_chart(
            State(app),
            Path("UNIT1".to_string()),
            Query(RangeParams {
                range: Some("1y".to_string()),
                ..Default::default()
            }),
        )
        .await;

        let response = result.err().expect("range should be rejected").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chart_of_unknown_unit_is_404() {
        let app = app_with(seeded_store());
        let response = unit_chart(
            State(app),
            Path("NOPE1".to_string()),
            Query(RangeParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chart_of_known_unit_is_200() {
        let app = app_with(seeded_store());
        let response = unit_chart(
            State(app),
            Path("UNIT1".to_string()),
            Query(RangeParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn performance_sort_key_is_validated() {
        let app = app_with(seeded_store());
        let result = performance_leaderboard(
            State(app),
            Query(LeaderboardParams {
                sort: Some("alphabetical".to_string()),
                ..Default::default()
            }),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn state_patch_applies_and_reports_events() {
        let app = app_with(seeded_store());
        let Json(response) = patch_state(
            State(app.clone()),
            Json(StatePatch {
                select: Some("UNIT1".to_string()),
                auto_refresh: Some(true),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.events.len(), 2);
        assert_eq!(response.state.selected_duid.as_deref(), Some("UNIT1"));
        assert!(app.state.current().auto_refresh);
    }

    #[tokio::test]
    async fn state_patch_rejects_inverted_custom_range() {
        let app = app_with(seeded_store());
        let start = OffsetDateTime::now_utc();
        let result = patch_state(
            State(app),
            Json(StatePatch {
                range: Some(DateRange::Custom {
                    start,
                    end: start - Duration::hours(1),
                }),
                ..Default::default()
            }),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn healthz_reflects_store_reachability() {
        let ok = healthz(State(app_with(seeded_store()))).await;
        assert_eq!(ok.status(), StatusCode::OK);

        let down = healthz(State(app_with(MemMarketData {
            fail_all: true,
            ..Default::default()
        })))
        .await;
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
