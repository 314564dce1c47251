//! Line-delimited JSON push channel over TCP.
//!
//! Each accepted connection is one observer. Outbound, the connection
//! receives one JSON [`ObserverMessage`](crate::ObserverMessage) per line:
//! the snapshot first, then status events. Inbound, a job worker may write
//! one JSON [`JobStatusEvent`] per line to publish it on the bus; lines
//! that fail to parse are logged and ignored.

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::types::JobStatusEvent;
use crate::{Jobcast, Result};

/// Accept observer connections until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: Arc<Jobcast>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("observer endpoint shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        debug!(%peer, "observer connected");
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, &service).await {
                                debug!(%peer, error = %e, "observer connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept observer connection"),
                }
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, service: &Jobcast) -> Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    // Dropping the stream on any exit path detaches the observer.
    let mut observer = service.subscribe()?;

    loop {
        tokio::select! {
            message = observer.next() => {
                let Some(message) = message else {
                    debug!(observer = %observer.id(), "observer detached by service");
                    return Ok(());
                };
                let mut line = serde_json::to_vec(&message)?;
                line.push(b'\n');
                write_half.write_all(&line).await?;
            }
            inbound = lines.next_line() => {
                match inbound? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match serde_json::from_str::<JobStatusEvent>(&line) {
                        Ok(event) => service.bus().publish_event(event),
                        Err(e) => warn!(observer = %observer.id(), error = %e, "ignoring malformed status line"),
                    },
                    None => {
                        debug!(observer = %observer.id(), "observer closed connection");
                        return Ok(());
                    }
                }
            }
        }
    }
}
