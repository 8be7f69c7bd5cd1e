// sensorhub-api: Async Rust client for the SensorHub REST API and push channels

pub mod client;
pub mod error;
pub mod push;
pub mod transport;
pub mod types;

pub use client::HubClient;
pub use error::Error;
pub use push::{FrameOutcome, PushConnection, ReconnectPolicy, decode_frame};
pub use transport::{TlsMode, TransportConfig};
