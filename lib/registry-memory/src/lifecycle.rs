use registry_api::{RegistryError, Result};
use std::sync::Mutex;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Initialized,
    Running,
    Stopped,
}

/// Lifecycle guard shared by the in-memory services.
///
/// Operations outside `Running` are precondition violations and fail with `NotRunning`.
#[derive(Debug)]
pub(crate) struct ServiceLifecycle {
    name: &'static str,
    phase: Mutex<Phase>,
}

impl ServiceLifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: Mutex::new(Phase::Created),
        }
    }

    pub(crate) fn init(&self) -> Result<()> {
        self.transition(Phase::Created, Phase::Initialized)
    }

    pub(crate) fn start(&self) -> Result<()> {
        self.transition(Phase::Initialized, Phase::Running)
    }

    pub(crate) fn shutdown(&self) -> Result<()> {
        let mut phase = self.lock();
        if *phase == Phase::Stopped {
            return Err(RegistryError::Lifecycle(format!(
                "{} already stopped",
                self.name
            )));
        }
        *phase = Phase::Stopped;
        debug!("{} stopped", self.name);
        Ok(())
    }

    pub(crate) fn ensure_running(&self, op: &str) -> Result<()> {
        let phase = *self.lock();
        if phase != Phase::Running {
            return Err(RegistryError::NotRunning(format!(
                "{}::{} called while {:?}",
                self.name, op, phase
            )));
        }
        Ok(())
    }

    fn transition(&self, from: Phase, to: Phase) -> Result<()> {
        let mut phase = self.lock();
        if *phase != from {
            return Err(RegistryError::Lifecycle(format!(
                "{} cannot move to {:?} from {:?}",
                self.name, to, *phase
            )));
        }
        *phase = to;
        debug!("{} {:?}", self.name, to);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }
}
