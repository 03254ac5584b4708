use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use super::Bridge;
use crate::error::Result;
use crate::mcp::{AdaptedCapability, SessionStatus};

/// Synchronous front for [`Bridge`].
///
/// Owns one multi-threaded runtime for its whole lifetime, so sessions
/// and their background I/O tasks outlive individual calls. Must not be
/// called from inside another async runtime.
pub struct BlockingBridge {
    bridge: Arc<Bridge>,
    runtime: Runtime,
}

impl BlockingBridge {
    pub fn new(bridge: Bridge) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("mcp-bridge")
            .enable_all()
            .build()?;
        Ok(Self {
            bridge: Arc::new(bridge),
            runtime,
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn list_capabilities(&self, server_name: Option<&str>) -> Result<Vec<AdaptedCapability>> {
        self.runtime
            .block_on(self.bridge.list_capabilities(server_name))
    }

    pub fn list_all_capabilities(&self) -> Result<Vec<AdaptedCapability>> {
        self.runtime.block_on(self.bridge.list_all_capabilities())
    }

    /// Invoke a capability listed through this bridge.
    pub fn invoke(
        &self,
        capability: &AdaptedCapability,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.runtime.block_on(capability.invoke(arguments))
    }

    pub fn invoke_with_timeout(
        &self,
        capability: &AdaptedCapability,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        self.runtime
            .block_on(capability.invoke_with_timeout(arguments, timeout))
    }

    pub fn status(&self) -> Vec<SessionStatus> {
        self.bridge.status()
    }

    /// Close all sessions, then stop the runtime.
    pub fn shutdown(self) {
        self.runtime.block_on(self.bridge.shutdown());
        self.runtime.shutdown_timeout(Duration::from_secs(5));
    }
}

impl std::fmt::Debug for BlockingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingBridge")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}
