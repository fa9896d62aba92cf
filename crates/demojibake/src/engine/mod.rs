pub mod api;
pub mod client;
#[cfg(feature = "native-engine")]
pub mod native;

pub use api::{EngineApi, ProgressCallback, BATCH_SUCCESS, INIT_SUCCESS};
pub use client::EngineClient;
#[cfg(feature = "native-engine")]
pub use native::NativeEngine;
