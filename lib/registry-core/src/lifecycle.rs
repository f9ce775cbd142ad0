//! Facade lifecycle states

use std::sync::atomic::{AtomicU8, Ordering};

/// Facade lifecycle: `Uninitialized -> Initialized -> Started -> Stopped`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Initialized,
            2 => LifecycleState::Started,
            3 => LifecycleState::Stopped,
            _ => LifecycleState::Uninitialized,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "UNINITIALIZED",
            LifecycleState::Initialized => "INITIALIZED",
            LifecycleState::Started => "STARTED",
            LifecycleState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`LifecycleState`]
#[derive(Debug)]
pub(crate) struct LifecycleCell {
    state: AtomicU8,
}

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
        }
    }

    pub(crate) fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_round_trips_every_state() {
        let cell = LifecycleCell::new();
        assert_eq!(cell.get(), LifecycleState::Uninitialized);
        for state in [
            LifecycleState::Initialized,
            LifecycleState::Started,
            LifecycleState::Stopped,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Started.to_string(), "STARTED");
    }
}
