mod handlers;
mod outbound;
mod state;


pub use outbound::OutboundSink;
pub use state::{ChannelSession, SessionConfig};
