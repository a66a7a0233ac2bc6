use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::rank::GeneratorFilter;
use crate::window::DateRange;

/// What the dashboard is currently looking at: one selected unit, one time
/// window, the facet filter and the auto-refresh flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub selected_duid: Option<String>,
    pub range: DateRange,
    pub filter: GeneratorFilter,
    pub auto_refresh: bool,
}

/// Typed change notifications, one per state field that actually changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateEvent {
    SelectionChanged { selected_duid: Option<String> },
    RangeChanged { range: DateRange },
    FiltersChanged { filter: GeneratorFilter },
    AutoRefreshChanged { enabled: bool },
}

/// Partial state mutation as accepted by `PATCH /api/state`. Absent fields
/// are left untouched; an empty `search` clears the search term.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatePatch {
    pub select: Option<String>,
    #[serde(default)]
    pub clear_selection: bool,
    pub range: Option<DateRange>,
    pub regions: Option<Vec<String>>,
    pub fuel_types: Option<Vec<String>>,
    pub search: Option<String>,
    pub auto_refresh: Option<bool>,
}

/// Monotonically increasing refresh generation. A completed refresh is only
/// published if its generation is still the newest one issued.
#[derive(Debug, Default)]
pub struct RequestSeq {
    issued: AtomicU64,
}

impl RequestSeq {
    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}

/// Shared view state behind a watch channel, with change events fanned out
/// on a broadcast channel. Mutations flow one way: patch in, events out.
pub struct StateStore {
    state: watch::Sender<ViewState>,
    events: broadcast::Sender<StateEvent>,
    seq: RequestSeq,
}

impl StateStore {
    pub fn new(initial: ViewState) -> Self {
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(32);
        Self {
            state,
            events,
            seq: RequestSeq::default(),
        }
    }

    pub fn current(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    pub fn seq(&self) -> &RequestSeq {
        &self.seq
    }

    /// Applies a patch and returns the events it produced. A patch that
    /// changes nothing emits nothing and does not wake watchers.
    pub fn apply(&self, patch: StatePatch) -> Vec<StateEvent> {
        let mut events = Vec::new();

        self.state.send_if_modified(|state| {
            if patch.clear_selection {
                if state.selected_duid.is_some() {
                    state.selected_duid = None;
                    events.push(StateEvent::SelectionChanged {
                        selected_duid: None,
                    });
                }
            } else if let Some(duid) = patch.select {
                if state.selected_duid.as_deref() != Some(duid.as_str()) {
                    state.selected_duid = Some(duid.clone());
                    events.push(StateEvent::SelectionChanged {
                        selected_duid: Some(duid),
                    });
                }
            }

            if let Some(range) = patch.range {
                if state.range != range {
                    state.range = range;
                    events.push(StateEvent::RangeChanged { range });
                }
            }

            let mut filter = state.filter.clone();
            if let Some(regions) = patch.regions {
                filter.regions = regions;
            }
            if let Some(fuel_types) = patch.fuel_types {
                filter.fuel_types = fuel_types;
            }
            if let Some(search) = patch.search {
                filter.search = (!search.is_empty()).then_some(search);
            }
            if filter != state.filter {
                state.filter = filter.clone();
                events.push(StateEvent::FiltersChanged { filter });
            }

            if let Some(enabled) = patch.auto_refresh {
                if state.auto_refresh != enabled {
                    state.auto_refresh = enabled;
                    events.push(StateEvent::AutoRefreshChanged { enabled });
                }
            }

            !events.is_empty()
        });

        for event in &events {
            // Nobody listening is fine.
            let _ = self.events.send(event.clone());
        }
        events
    }
}
