use shared::domain::{DatasetId, ViewState};
use thiserror::Error;

/// Navigation event fed to the transition table. `Resize` and `ZoomOut`
/// requests never enter the table; they refresh the current view in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    Start,
    ToTimeline,
    ToFile(DatasetId),
}

impl NavEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NavEvent::Start => "start",
            NavEvent::ToTimeline => "to_timeline",
            NavEvent::ToFile(_) => "to_file",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("event '{event}' is not valid in state '{state:?}'")]
    Invalid {
        event: &'static str,
        state: ViewState,
    },
    #[error("another transition is in flight")]
    InFlight,
}

/// The fixed transition table. `None` means the event is rejected in the
/// given state and nothing may run.
pub fn next_state(current: ViewState, event: &NavEvent) -> Option<ViewState> {
    use ViewState::*;

    match (current, event) {
        (Uninitialized, NavEvent::Start) => Some(Overview),
        (Overview | SwitchingDataset, NavEvent::ToTimeline) => Some(Timeline),
        (Overview | SwitchingDataset | Timeline, NavEvent::ToFile(_)) => Some(SwitchingDataset),
        _ => None,
    }
}
