//! Network infrastructure: listeners, TLS, and the per-socket adapter.

pub mod listener;
pub mod stream;
pub mod tls;

pub use listener::{run_server, BoundListener, ListenerError, Role, ServerContext};
