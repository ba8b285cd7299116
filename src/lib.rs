//! Client-side chat event aggregation: turns a streaming, possibly replayed and
//! duplicated feed of channel events into one de-duplicated, memory-bounded,
//! render-ready conversation.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod session;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::{dispatch, EventHandlers, EventMiddleware, Middleware, Next};
pub use session::{ChannelSession, OutboundSink, SessionConfig};
