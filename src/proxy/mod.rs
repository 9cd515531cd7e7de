//! Proxy module
//!
//! Forwards resolved calls to upstream providers and relays their responses.

pub mod headers;
pub mod logging;
pub mod pipeline;
pub mod relay;
pub mod tee;

pub use pipeline::proxy_call;
pub use relay::StreamingRelay;
pub use tee::{RelayOutcome, RelayStream};
