use rmcp::transport::TokioChildProcess;
use tokio::process::Command;
use tracing::debug;

use super::DuplexChannel;
use crate::config::SubprocessTransport;
use crate::error::BridgeError;

/// Spawn a subprocess server with piped stdio.
///
/// The child inherits the current environment with `env` merged over it.
pub fn open_subprocess(
    server: &str,
    subprocess: &SubprocessTransport,
) -> Result<DuplexChannel, BridgeError> {
    let mut command = Command::new(&subprocess.command);
    command.args(&subprocess.args).envs(&subprocess.env);

    debug!(
        server,
        command = %subprocess.command,
        args = ?subprocess.args,
        "spawning MCP subprocess"
    );

    let process = TokioChildProcess::new(command).map_err(|error| BridgeError::Connection {
        server: server.to_string(),
        message: format!("failed to spawn '{}': {error}", subprocess.command),
        source: Some(Box::new(error)),
    })?;
    Ok(DuplexChannel::ChildProcess(process))
}
