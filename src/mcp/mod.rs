//! Model Context Protocol (MCP) sessions and capability adaptation.

pub mod adapter;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{adapt_capabilities, AdaptedCapability};
pub use registry::SessionRegistry;
pub use schema::CapabilityDescriptor;
pub use session::{Session, SessionState, SessionStatus, ToolCallOutput};
pub use transport::{ChannelKind, DefaultConnector, DuplexChannel, TransportConnector};
