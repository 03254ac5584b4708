//! The bridge facade: the only surface the orchestration runtime touches.

mod blocking;

pub use blocking::BlockingBridge;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::mcp::{
    adapt_capabilities, AdaptedCapability, DefaultConnector, SessionRegistry, SessionStatus,
    TransportConnector,
};
use crate::tools::{ArgumentValidator, NoValidation, Tool};

/// Lists capabilities from configured tool servers as runtime tools.
///
/// Sessions are created lazily on first use and reused afterwards. All
/// methods are async; see [`BlockingBridge`] for synchronous callers.
pub struct Bridge {
    config: BridgeConfig,
    registry: SessionRegistry,
    validator: Arc<dyn ArgumentValidator>,
}

impl Bridge {
    /// Bridge using the default subprocess/HTTP connector.
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_connector(config, Arc::new(DefaultConnector))
    }

    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn TransportConnector>) -> Self {
        let registry = SessionRegistry::new(&config, connector);
        Self {
            config,
            registry,
            validator: Arc::new(NoValidation),
        }
    }

    /// Gate applied to arguments of every capability listed afterwards.
    pub fn with_validator(mut self, validator: Arc<dyn ArgumentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Capabilities of one server, or of the default server when `None`.
    pub async fn list_capabilities(
        &self,
        server_name: Option<&str>,
    ) -> Result<Vec<AdaptedCapability>> {
        let server_name = server_name.unwrap_or_else(|| self.config.default_server());
        let session = self.registry.get(server_name).await?;
        let descriptors = session.list_capabilities().await?;
        debug!(
            server = server_name,
            count = descriptors.len(),
            "adapting MCP capabilities"
        );
        Ok(adapt_capabilities(&session, descriptors, &self.validator))
    }

    /// Capabilities of every configured server, in configuration order.
    ///
    /// Stops at the first server that fails; nothing partial is returned.
    pub async fn list_all_capabilities(&self) -> Result<Vec<AdaptedCapability>> {
        let mut all = Vec::new();
        for server in self.registry.server_names() {
            all.extend(self.list_capabilities(Some(server)).await?);
        }
        info!(
            servers = self.registry.server_names().len(),
            capabilities = all.len(),
            "listed capabilities from all MCP servers"
        );
        Ok(all)
    }

    /// [`Bridge::list_capabilities`] as boxed runtime tools.
    pub async fn tools(&self, server_name: Option<&str>) -> Result<Vec<Arc<dyn Tool>>> {
        Ok(into_tools(self.list_capabilities(server_name).await?))
    }

    /// [`Bridge::list_all_capabilities`] as boxed runtime tools.
    pub async fn all_tools(&self) -> Result<Vec<Arc<dyn Tool>>> {
        Ok(into_tools(self.list_all_capabilities().await?))
    }

    /// Status of every live or failed session currently cached.
    pub fn status(&self) -> Vec<SessionStatus> {
        self.registry.statuses()
    }

    /// Close every session. Later calls reconnect lazily.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
        info!("MCP bridge shut down");
    }
}

fn into_tools(capabilities: Vec<AdaptedCapability>) -> Vec<Arc<dyn Tool>> {
    capabilities
        .into_iter()
        .map(|capability| Arc::new(capability) as Arc<dyn Tool>)
        .collect()
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
