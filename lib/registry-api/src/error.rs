use crate::service::CapabilityKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// The single error type crossing the registry contract boundary.
///
/// Any `Err` returned by a contract operation means the operation did not take effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry backend unreachable: {0}")]
    Unreachable(String),

    #[error("Registry backend rejected credentials: {0}")]
    Unauthenticated(String),

    #[error("Malformed response from registry backend: {0}")]
    MalformedResponse(String),

    #[error("Subscriber not found: {0}")]
    SubscriberNotFound(String),

    #[error("Registry service is not running: {0}")]
    NotRunning(String),

    #[error("Invalid lifecycle transition: {0}")]
    Lifecycle(String),

    #[error("No {capability} plugin registered for type '{plugin_type}'")]
    PluginNotFound {
        capability: CapabilityKind,
        plugin_type: String,
    },

    #[error("Watch channel closed: {0}")]
    WatchClosed(String),

    #[error("Shutdown failed: {}", describe_failures(.0))]
    Shutdown(Vec<ShutdownFailure>),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One capability whose shutdown call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownFailure {
    pub capability: CapabilityKind,
    pub error: Box<RegistryError>,
}

fn describe_failures(failures: &[ShutdownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.capability, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
