//! Event broadcasting between the coordinator and its observer.

pub mod progress;

pub use progress::{ProgressBridge, ProgressEvent};
