//! # HostBridge Client
//!
//! Submit-and-wait access to a bridge: subscribe to the event stream,
//! submit, then follow events for the returned task id until it completes,
//! fails or is cancelled.
//!
//! Two transports are provided: [`LocalTransport`] for a bridge in the same
//! process and [`HttpTransport`] for one behind the HTTP API.

pub mod client;
pub mod error;
pub mod http;
pub mod local;
pub mod sse;
pub mod transport;

pub use client::{SubmitAndWaitClient, TaskOutcome};
pub use error::ClientError;
pub use http::{HttpTransport, HttpTransportConfig};
pub use local::LocalTransport;
pub use sse::{SseDecoder, SseFrame};
pub use transport::{BridgeTransport, EventStream};
