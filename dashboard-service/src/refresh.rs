use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use crate::state::StateStore;
use crate::store::MarketData;
use crate::views::{self, DashboardSnapshot};

/// Rebuilds the dashboard snapshot when the view state changes or, with
/// auto-refresh on, every poll interval. Completed refreshes carry the
/// generation they were issued under; anything that is no longer the newest
/// generation is dropped instead of published.
pub struct Refresher {
    store: Arc<dyn MarketData>,
    state: Arc<StateStore>,
    snapshots: watch::Sender<Option<DashboardSnapshot>>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        store: Arc<dyn MarketData>,
        state: Arc<StateStore>,
        interval: Duration,
    ) -> (Self, watch::Receiver<Option<DashboardSnapshot>>) {
        let (snapshots, rx) = watch::channel(None);
        (
            Self {
                store,
                state,
                snapshots,
                interval,
            },
            rx,
        )
    }

    pub async fn run(self) {
        let mut events = self.state.subscribe_events();
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup refresh below
        // already covers it.
        tick.tick().await;

        self.refresh_once().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        tracing::debug!(?event, "state changed, refreshing");
                        self.refresh_once().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event stream lagged, refreshing once");
                        self.refresh_once().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tick.tick() => {
                    if self.state.current().auto_refresh {
                        self.refresh_once().await;
                    }
                }
            }
        }
    }

    async fn refresh_once(&self) {
        metrics::counter!("refresh_runs_total").increment(1);

        let generation = self.state.seq().next();
        let view_state = self.state.current();
        let snapshot = views::snapshot(
            self.store.as_ref(),
            &view_state,
            generation,
            OffsetDateTime::now_utc(),
        )
        .await;

        self.publish_if_latest(snapshot);
    }

    fn publish_if_latest(&self, snapshot: DashboardSnapshot) -> bool {
        if !self.state.seq().is_latest(snapshot.generation) {
            metrics::counter!("stale_snapshots_discarded_total").increment(1);
            tracing::debug!(
                generation = snapshot.generation,
                latest = self.state.seq().latest(),
                "discarding stale snapshot"
            );
            return false;
        }
        self.snapshots.send_replace(Some(snapshot));
        true
    }
}
