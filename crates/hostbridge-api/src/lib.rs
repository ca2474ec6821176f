//! # HostBridge API
//!
//! HTTP surface of the command bridge. Every request is translated into a
//! [`Bridge`](hostbridge_runloop::Bridge) call; nothing here touches the host.
//!
//! - **Submission**: asynchronous (`/execute`) and blocking (`/execute_sync`)
//! - **Events**: server-sent event stream of task lifecycle events
//! - **Control**: cancellation and status polling
//! - **Introspection**: bridge status, host snapshot, command catalog

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use http::routes::create_router;
pub use server::{InterfaceConfig, InterfaceServer};
pub use state::AppState;
