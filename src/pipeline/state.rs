//! Session state management

use std::time::Instant;

/// Session state machine
///
/// Device handle and frame wiring exist only while `Configuring` or
/// `Running`. A stopped session can be configured again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing allocated
    Idle,

    /// Device and wiring are being set up
    Configuring,

    /// Frames are flowing
    Running {
        /// When production started
        started_at: Instant,
    },

    /// Torn down after running
    Stopped,
}

impl SessionState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            (Idle, Configuring) | (Stopped, Configuring) => true,

            (Configuring, Running { .. }) => true,
            // failed start
            (Configuring, Idle) => true,

            (Running { .. }, Stopped) => true,

            (a, b) if a == b => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Configuring => "Configuring",
            SessionState::Running { .. } => "Running",
            SessionState::Stopped => "Stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running { .. })
    }

    /// Whether `start` may be called
    pub fn can_start(&self) -> bool {
        self.can_transition_to(&SessionState::Configuring) && *self != SessionState::Configuring
    }

    pub fn running_duration(&self) -> Option<std::time::Duration> {
        if let SessionState::Running { started_at } = self {
            Some(started_at.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let running = SessionState::Running {
            started_at: Instant::now(),
        };

        assert!(SessionState::Idle.can_transition_to(&SessionState::Configuring));
        assert!(SessionState::Configuring.can_transition_to(&running));
        assert!(SessionState::Configuring.can_transition_to(&SessionState::Idle));
        assert!(running.can_transition_to(&SessionState::Stopped));
        assert!(SessionState::Stopped.can_transition_to(&SessionState::Configuring));
        assert!(running.can_transition_to(&running));
    }

    #[test]
    fn test_invalid_transitions() {
        let running = SessionState::Running {
            started_at: Instant::now(),
        };

        // must go through Configuring
        assert!(!SessionState::Idle.can_transition_to(&running));
        assert!(!SessionState::Stopped.can_transition_to(&running));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Stopped));
        assert!(!running.can_transition_to(&SessionState::Configuring));
        assert!(!running.can_transition_to(&SessionState::Idle));
    }

    #[test]
    fn test_state_checks() {
        let running = SessionState::Running {
            started_at: Instant::now(),
        };

        assert!(running.is_running());
        assert!(running.running_duration().is_some());
        assert!(!running.can_start());

        assert!(!SessionState::Configuring.can_start());

        assert!(SessionState::Idle.can_start());
        assert!(SessionState::Stopped.can_start());
        assert_eq!(SessionState::Stopped.to_string(), "Stopped");
    }
}
