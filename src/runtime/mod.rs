//! Runtime: the end-to-end classifier, weight snapshots and scan requests.

pub mod classifier;
pub mod request;
pub mod snapshot;

pub use classifier::{ClassifierInputs, Malceiver};
