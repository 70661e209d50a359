//! Launching and watching the privileged master process.
//!
//! The relay is useless without the master: every grant it hands out would be
//! silently lost.  When the relay is configured to launch the master itself,
//! it therefore treats the master exiting, for any reason and with any status,
//! as fatal and aborts so the service manager restarts both together.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::domain::MasterCommand;

/// The master executable could not be started.
#[derive(Debug, Error)]
#[error("failed to launch master process {program}: {source}")]
pub struct SpawnError {
    pub program: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Starts the master and aborts the relay if it ever exits.
///
/// # Errors
///
/// Returns [`SpawnError`] if the process cannot be started at all.
pub fn spawn_master(command: &MasterCommand) -> Result<JoinHandle<()>, SpawnError> {
    let child = Command::new(&command.program)
        .args(&command.args)
        .spawn()
        .map_err(|source| SpawnError {
            program: command.program.clone(),
            source,
        })?;

    info!(
        program = %command.program.display(),
        pid = child.id(),
        "launched master process"
    );

    let program = command.program.clone();
    Ok(supervise(child, move |outcome| {
        match outcome {
            Ok(status) => error!(
                program = %program.display(),
                %status,
                "master process terminated; aborting"
            ),
            Err(e) => error!(
                program = %program.display(),
                error = %e,
                "lost track of master process; aborting"
            ),
        }
        std::process::abort();
    }))
}

/// Waits for `child` in the background and hands its exit to `on_exit`.
pub fn supervise<F>(mut child: Child, on_exit: F) -> JoinHandle<()>
where
    F: FnOnce(io::Result<ExitStatus>) + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = child.wait().await;
        on_exit(outcome);
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_supervise_reports_exit_status() {
        // Arrange
        let child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let (tx, rx) = oneshot::channel();

        // Act
        supervise(child, move |outcome| {
            let _ = tx.send(outcome.map(|s| s.code()));
        });
        let code = rx.await.unwrap().unwrap();

        // Assert
        assert_eq!(code, Some(3));
    }

    #[tokio::test]
    async fn test_spawn_master_missing_program_is_error() {
        let command = MasterCommand {
            program: PathBuf::from("/nonexistent/gateway-master"),
            args: vec![],
        };

        let err = spawn_master(&command).unwrap_err();

        assert_eq!(err.program, PathBuf::from("/nonexistent/gateway-master"));
    }
}
