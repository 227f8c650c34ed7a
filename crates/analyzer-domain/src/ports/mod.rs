//! Trait boundaries consumed by the engine and implemented by collaborators.

mod progress;
mod provider;
mod scope;

pub use progress::{ProgressEvent, ProgressReporter, Stage};
pub use provider::ProviderClient;
pub use scope::{CompositeScope, Scope};
