//! MCP Bridge -- tool servers as runtime tools
//!
//! Connects to Model Context Protocol servers (subprocess over stdio, or
//! streamable HTTP), keeps one live session per server, and exposes each
//! advertised capability through the [`tools::Tool`] trait.
//!
//! # Quick Start
//!
//! ```no_run
//! use mcp_bridge::prelude::*;
//!
//! # async fn example() -> mcp_bridge::error::Result<()> {
//! let config = BridgeConfig::new(vec![
//!     ServerConfig::subprocess("files", "mcp-server-filesystem", ["/tmp"])?,
//! ])?;
//! let bridge = Bridge::new(config);
//! for tool in bridge.tools(None).await? {
//!     println!("{}: {}", tool.name(), tool.description());
//! }
//! bridge.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod tools;
pub mod util;
