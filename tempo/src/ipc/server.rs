//! Unix domain socket server for IPC
//!
//! The server never touches the scheduler. Each command is forwarded to the
//! host loop together with a reply channel, so the scheduler keeps a single
//! owner and commands are applied one at a time, in between ticks.

use crate::scheduler::Scheduler;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tempo_ipc::{read_message, write_message, Command, IpcError, Response};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// A command waiting for the host loop, plus where to send the answer.
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

/// Bind the socket, replacing a stale one left by a previous run.
pub fn bind(path: PathBuf) -> Result<UnixListener> {
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("Failed to bind IPC socket at {}", path.display()))?;
    info!("IPC server listening on {}", path.display());
    Ok(listener)
}

pub async fn serve(listener: UnixListener, requests: mpsc::Sender<Request>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let requests = requests.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, requests).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, requests: mpsc::Sender<Request>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let response = match read_message::<_, Command>(&mut reader).await {
        Ok(command) => {
            debug!("IPC command: {:?}", command);
            let (reply, answer) = oneshot::channel();
            requests
                .send(Request { command, reply })
                .await
                .map_err(|_| anyhow::anyhow!("tempo is shutting down"))?;
            answer
                .await
                .unwrap_or_else(|_| Response::Error("tempo is shutting down".to_string()))
        }
        Err(IpcError::Serialization(e)) => Response::Error(format!("Malformed command: {}", e)),
        Err(e) => return Err(e.into()),
    };

    write_message(&mut writer, &response).await?;
    Ok(())
}

/// Apply one command to the scheduler.
pub fn dispatch(scheduler: &mut Scheduler, command: Command) -> Response {
    match command {
        Command::Start => scheduler.start(),
        Command::Pause => scheduler.pause(),
        Command::Toggle => scheduler.toggle(),
        Command::Skip => scheduler.skip(),
        Command::Reset => scheduler.reset_phase(),
        Command::ResetAll => scheduler.reset_all(),
        Command::Status => return Response::Status(scheduler.status()),
        Command::Presets => {
            return Response::Presets(scheduler.presets().iter().map(Into::into).collect())
        }
        Command::Preferences => return Response::Preferences(scheduler.preferences().into()),
        Command::ApplyPreset { label } => {
            if let Err(e) = scheduler.apply_preset_by_label(&label) {
                return Response::Error(e.to_string());
            }
        }
        Command::SetPreference { field, value } => scheduler.set_preference(field, &value),
    }
    Response::Ok
}
