use std::time::{Duration, Instant};

use crate::domain::value_objects::CameraState;

/// State transition record
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub from: Option<CameraState>,
    pub to: CameraState,
    /// Length of the streaming session this transition ended
    pub streamed: Option<Duration>,
}

/// Domain entity holding a camera's idle/streaming state
#[derive(Debug, Default)]
pub struct CameraLifecycle {
    current_state: Option<CameraState>,
    streaming_since: Option<Instant>,
}

impl CameraLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first explicit transition
    pub fn current_state(&self) -> Option<CameraState> {
        self.current_state
    }

    /// Move to `new_state`. Returns the transition, or `None` when the
    /// camera is already in that state.
    pub fn transition_to(&mut self, new_state: CameraState) -> Option<StateTransition> {
        if self.current_state == Some(new_state) {
            return None;
        }

        let streamed = if new_state.is_streaming() {
            self.streaming_since = Some(Instant::now());
            None
        } else {
            self.streaming_since.take().map(|start| start.elapsed())
        };

        let transition = StateTransition {
            from: self.current_state,
            to: new_state,
            streamed,
        };
        self.current_state = Some(new_state);
        Some(transition)
    }
}
