//! Session list caching and selection reconciliation.

mod registry;

pub use registry::{SelectionSignal, SessionRegistry};
