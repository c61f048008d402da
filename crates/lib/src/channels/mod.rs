//! Reply channels.
//!
//! `ReplySender` is the outbound boundary: the bot hands it finished replies. The connector
//! client posts them back to the chat platform; the memory channel keeps them in-process.

mod connector;
mod memory;
mod sender;

pub use connector::ConnectorClient;
pub use memory::MemoryChannel;
pub use sender::{ChannelError, ReplySender};
