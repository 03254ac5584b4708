//! Adapts server capabilities to the runtime's [`Tool`] interface.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::schema::CapabilityDescriptor;
use super::session::{coerce_tool_arguments, Session};
use crate::error::{BridgeError, InvocationFailure, Result};
use crate::tools::arguments::ToolArguments;
use crate::tools::tool::Tool;
use crate::tools::types::AgentToolParameters;
use crate::tools::validation::ArgumentValidator;

/// A remote capability bound to the session it was listed from.
///
/// Holds only a weak reference: once the registry drops the session the
/// capability reports [`InvocationFailure::SessionUnavailable`] and the
/// caller should list capabilities again.
pub struct AdaptedCapability {
    server_name: String,
    name: String,
    description: String,
    parameters: AgentToolParameters,
    session: Weak<Session>,
    validator: Arc<dyn ArgumentValidator>,
}

impl AdaptedCapability {
    pub fn new(
        session: &Arc<Session>,
        descriptor: CapabilityDescriptor,
        validator: Arc<dyn ArgumentValidator>,
    ) -> Self {
        Self {
            server_name: session.server_name().to_string(),
            name: descriptor.name,
            description: descriptor.description.unwrap_or_default(),
            parameters: AgentToolParameters::from_schema(descriptor.input_schema),
            session: Arc::downgrade(session),
            validator,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Invoke with the session's default call deadline.
    pub async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        self.call(arguments, None).await
    }

    /// Invoke with an explicit deadline overriding the session default.
    pub async fn invoke_with_timeout(
        &self,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        self.call(arguments, Some(timeout)).await
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value> {
        let arguments = coerce_tool_arguments(arguments).map_err(|message| {
            BridgeError::invocation(&self.name, InvocationFailure::InvalidArguments, message)
        })?;
        let candidate = serde_json::Value::Object(arguments.clone().unwrap_or_default());
        if let Err(message) = self.validator.validate(&candidate, &self.parameters.schema) {
            debug!(
                server = %self.server_name,
                capability = %self.name,
                reason = %message,
                "rejected arguments before dispatch"
            );
            return Err(BridgeError::invocation(
                &self.name,
                InvocationFailure::InvalidArguments,
                message,
            ));
        }

        let Some(session) = self.session.upgrade() else {
            return Err(BridgeError::invocation(
                &self.name,
                InvocationFailure::SessionUnavailable,
                format!("session for server '{}' is no longer available", self.server_name),
            ));
        };

        let arguments = arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);
        let outcome = match timeout {
            Some(timeout) => {
                session
                    .invoke_with_timeout(&self.name, arguments, Some(timeout))
                    .await
            }
            None => session.invoke(&self.name, arguments).await,
        };
        outcome
            .map(|output| output.into_value_or_text())
            .map_err(|error| {
                let error = self.uniform(error);
                warn!(
                    server = %self.server_name,
                    capability = %self.name,
                    error = %error,
                    "capability invocation failed"
                );
                error
            })
    }

    /// Every failure leaves here as an invocation error naming this capability.
    fn uniform(&self, error: BridgeError) -> BridgeError {
        match error {
            BridgeError::Invocation { .. } => error,
            other => BridgeError::Invocation {
                capability: self.name.clone(),
                failure: InvocationFailure::SessionUnavailable,
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl std::fmt::Debug for AdaptedCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptedCapability")
            .field("server_name", &self.server_name)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for AdaptedCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value> {
        self.invoke(args.raw().clone()).await
    }
}

/// Wrap every descriptor listed by `session`.
pub fn adapt_capabilities(
    session: &Arc<Session>,
    descriptors: Vec<CapabilityDescriptor>,
    validator: &Arc<dyn ArgumentValidator>,
) -> Vec<AdaptedCapability> {
    descriptors
        .into_iter()
        .map(|descriptor| AdaptedCapability::new(session, descriptor, Arc::clone(validator)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionOptions;
    use crate::mcp::test_support::{spawn_fake_server, FakeBehavior, FakeServer};
    use crate::tools::validation::{NoValidation, SchemaValidator};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn adapted(
        server: FakeServer,
        validator: Arc<dyn ArgumentValidator>,
    ) -> (Arc<Session>, Vec<AdaptedCapability>) {
        let session = Arc::new(Session::new(
            "fake",
            spawn_fake_server(server),
            SessionOptions::default(),
        ));
        session.initialize().await.expect("handshake");
        let descriptors = session.list_capabilities().await.expect("tools/list");
        let capabilities = adapt_capabilities(&session, descriptors, &validator);
        (session, capabilities)
    }

    #[tokio::test]
    async fn adapted_capability_exposes_descriptor_fields() {
        let (_session, capabilities) =
            adapted(FakeServer::new("fake").with_echo_tool(), Arc::new(NoValidation)).await;
        let echo = &capabilities[0];
        assert_eq!(echo.name(), "echo");
        assert_eq!(echo.description(), "echo from fake");
        assert_eq!(echo.server_name(), "fake");
        assert_eq!(echo.parameters().schema["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn execute_round_trips_through_tool_trait() {
        let (_session, capabilities) =
            adapted(FakeServer::new("fake").with_echo_tool(), Arc::new(NoValidation)).await;
        let tool: &dyn Tool = &capabilities[0];
        let result = tool
            .execute(&ToolArguments::new(json!({"text": "hi"})))
            .await
            .expect("echo");
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn validator_rejection_never_reaches_server() {
        let server = FakeServer::new("fake")
            .with_echo_tool()
            .with_behavior(FakeBehavior::DropOnCall);
        let (session, capabilities) = adapted(server, Arc::new(SchemaValidator)).await;

        let err = capabilities[0]
            .invoke(json!({"text": 42}))
            .await
            .expect_err("schema mismatch");
        assert_eq!(err.capability(), Some("echo"));
        assert_eq!(
            err.invocation_failure(),
            Some(InvocationFailure::InvalidArguments)
        );
        // A dispatched call would have hit the dropping server.
        assert!(session.is_alive());
    }

    #[tokio::test]
    async fn closed_session_is_reported_as_invocation_error() {
        let (session, capabilities) =
            adapted(FakeServer::new("fake").with_echo_tool(), Arc::new(NoValidation)).await;
        session.close().await;

        let err = capabilities[0]
            .invoke(json!({"text": "hi"}))
            .await
            .expect_err("session closed");
        assert_eq!(err.capability(), Some("echo"));
        assert_eq!(
            err.invocation_failure(),
            Some(InvocationFailure::SessionUnavailable)
        );
        let source = std::error::Error::source(&err).expect("state error is kept as source");
        assert!(source.to_string().contains("not ready"));
    }

    #[tokio::test]
    async fn dropped_session_is_unavailable() {
        let (session, capabilities) =
            adapted(FakeServer::new("fake").with_echo_tool(), Arc::new(NoValidation)).await;
        drop(session);

        let err = capabilities[0]
            .invoke(json!({"text": "hi"}))
            .await
            .expect_err("session gone");
        assert_eq!(
            err.invocation_failure(),
            Some(InvocationFailure::SessionUnavailable)
        );
        assert!(err.to_string().contains("no longer available"));
    }

    #[tokio::test]
    async fn server_failures_keep_capability_name() {
        for (behavior, expected) in [
            (FakeBehavior::ToolErrorOnCall, InvocationFailure::ToolError),
            (FakeBehavior::RpcErrorOnCall, InvocationFailure::Protocol),
            (FakeBehavior::DropOnCall, InvocationFailure::Transport),
        ] {
            let server = FakeServer::new("fake").with_echo_tool().with_behavior(behavior);
            let (_session, capabilities) = adapted(server, Arc::new(NoValidation)).await;
            let err = capabilities[0]
                .invoke(json!({"text": "hi"}))
                .await
                .expect_err("server failure");
            assert_eq!(err.capability(), Some("echo"), "{behavior:?}");
            assert_eq!(err.invocation_failure(), Some(expected), "{behavior:?}");
        }
    }

    #[tokio::test]
    async fn explicit_timeout_overrides_default() {
        let server = FakeServer::new("fake")
            .with_echo_tool()
            .with_behavior(FakeBehavior::StallOnCall);
        let (_session, capabilities) = adapted(server, Arc::new(NoValidation)).await;
        let err = capabilities[0]
            .invoke_with_timeout(json!({"text": "hi"}), Duration::from_millis(50))
            .await
            .expect_err("stalled");
        assert!(err.is_timeout());
    }
}
