//! Per-server session cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::session::{Session, SessionStatus};
use super::transport::TransportConnector;
use crate::config::{BridgeConfig, ServerConfig, SessionOptions};
use crate::error::{BridgeError, Result};

struct ServerSlot {
    config: ServerConfig,
    /// Held for the whole open + handshake of this server only.
    connecting: tokio::sync::Mutex<()>,
    session: Mutex<Option<Arc<Session>>>,
}

impl ServerSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Arc<Session>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> Option<Arc<Session>> {
        self.lock()
            .as_ref()
            .filter(|session| session.is_alive())
            .map(Arc::clone)
    }
}

/// Hands out at most one live [`Session`] per configured server.
///
/// Construction for a server is serialized on that server's slot only;
/// other servers proceed independently. Failed constructions are not
/// cached, and a cached session whose channel has died is replaced on
/// the next lookup. Lookups of the cache never wait on a construction,
/// and [`SessionRegistry::close_all`] abandons constructions in flight.
pub struct SessionRegistry {
    connector: Arc<dyn TransportConnector>,
    options: SessionOptions,
    order: Vec<String>,
    slots: HashMap<String, ServerSlot>,
    shutdowns: watch::Sender<u64>,
}

impl SessionRegistry {
    /// One slot per server of an already validated configuration.
    pub fn new(config: &BridgeConfig, connector: Arc<dyn TransportConnector>) -> Self {
        let servers = config.servers();
        let order = servers.iter().map(|s| s.name().to_string()).collect();
        let slots = servers
            .iter()
            .map(|server| {
                (
                    server.name().to_string(),
                    ServerSlot {
                        config: server.clone(),
                        connecting: tokio::sync::Mutex::new(()),
                        session: Mutex::new(None),
                    },
                )
            })
            .collect();
        Self {
            connector,
            options: config.options(),
            order,
            slots,
            shutdowns: watch::Sender::new(0),
        }
    }

    /// Configured server names, in configuration order.
    pub fn server_names(&self) -> &[String] {
        &self.order
    }

    /// Return the live session for `server_name`, creating it if needed.
    ///
    /// Concurrent callers for the same server share one construction.
    pub async fn get(&self, server_name: &str) -> Result<Arc<Session>> {
        let slot = self.slot(server_name)?;
        if let Some(session) = slot.live() {
            return Ok(session);
        }

        let _connecting = slot.connecting.lock().await;
        if let Some(session) = slot.live() {
            return Ok(session);
        }
        let stale = slot.lock().take();
        if let Some(stale) = stale {
            info!(
                server = server_name,
                state = %stale.state(),
                "evicting dead MCP session"
            );
            stale.close().await;
        }

        let mut shutdowns = self.shutdowns.subscribe();
        let session = tokio::select! {
            outcome = self.connect(&slot.config) => {
                outcome.map_err(|error| BridgeError::session_creation(server_name, error))?
            }
            _ = shutdowns.changed() => {
                warn!(server = server_name, "abandoned MCP session construction on shutdown");
                return Err(BridgeError::session_creation(
                    server_name,
                    BridgeError::InvalidState(format!(
                        "registry shut down while connecting to '{server_name}'"
                    )),
                ));
            }
        };
        *slot.lock() = Some(Arc::clone(&session));
        Ok(session)
    }

    /// The cached session, if any, without connecting.
    pub fn cached(&self, server_name: &str) -> Result<Option<Arc<Session>>> {
        Ok(self.slot(server_name)?.lock().clone())
    }

    /// Close and drop the cached session. Returns whether one was cached.
    pub async fn evict(&self, server_name: &str) -> Result<bool> {
        let cached = self.slot(server_name)?.lock().take();
        let Some(session) = cached else {
            return Ok(false);
        };
        session.close().await;
        debug!(server = server_name, "evicted MCP session");
        Ok(true)
    }

    /// Close every cached session and abandon constructions in flight.
    ///
    /// Later lookups connect again.
    pub async fn close_all(&self) {
        self.shutdowns.send_modify(|generation| *generation += 1);
        let sessions = self
            .slots
            .values()
            .filter_map(|slot| slot.lock().take())
            .collect::<Vec<_>>();
        join_all(sessions.iter().map(|session| session.close())).await;
    }

    /// Status of every cached session, in configuration order.
    pub fn statuses(&self) -> Vec<SessionStatus> {
        self.order
            .iter()
            .filter_map(|name| self.slots.get(name))
            .filter_map(|slot| slot.lock().as_ref().map(|session| session.status()))
            .collect()
    }

    fn slot(&self, server_name: &str) -> Result<&ServerSlot> {
        self.slots
            .get(server_name)
            .ok_or_else(|| BridgeError::UnknownServer(server_name.to_string()))
    }

    async fn connect(&self, config: &ServerConfig) -> Result<Arc<Session>> {
        let channel = match self.connector.open(config).await {
            Ok(channel) => channel,
            Err(error) => {
                warn!(server = config.name(), error = %error, "failed to open MCP channel");
                return Err(error);
            }
        };
        let session = Arc::new(Session::new(config.name(), channel, self.options));
        session.initialize().await?;
        Ok(session)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("servers", &self.order)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
