//! Core registry composition
//!
//! This library provides:
//! - Extension resolver mapping plugin-type names to backend factories
//! - Registry facade owning the combined lifecycle of both backend contracts
//! - Lifecycle state tracking for the facade

pub mod extension;
pub mod facade;
pub mod lifecycle;

pub use extension::ExtensionResolver;
pub use facade::Registry;
pub use lifecycle::LifecycleState;
