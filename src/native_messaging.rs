//! Browser native-messaging transport.
//!
//! Messages are prefixed with a 4-byte length in native byte order.

use std::io::{self, Read, Write};
use std::thread;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::daemon::{Endpoint, encode_broadcast};

/// Browsers refuse host messages above 1 MiB.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;
/// Inbound messages from the browser are capped at 4 GiB by the format;
/// anything near that from an extension is a bug.
pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;

/// Read one message. `Ok(None)` means the browser closed the pipe.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Option<String>> {
    let mut length_bytes = [0u8; 4];

    match reader.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length > MAX_INBOUND_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {} bytes is too large", length),
        ));
    }

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;

    String::from_utf8(buffer).map(Some).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write one message, length-prefixed, and flush.
pub fn write_message<W: Write>(writer: &mut W, json: &str) -> io::Result<()> {
    if json.len() > MAX_OUTBOUND_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {} bytes exceeds the browser limit", json.len()),
        ));
    }

    let length = json.len() as u32;
    writer.write_all(&length.to_ne_bytes())?;
    writer.write_all(json.as_bytes())?;
    writer.flush()?;

    Ok(())
}

fn write_stdout(json: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_message(&mut lock, json)
}

/// Serve one browser over stdin/stdout until it disconnects.
pub async fn serve_stdio(endpoint: Endpoint) {
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();

    // stdin is blocking; keep it off the runtime.
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut lock = stdin.lock();
        loop {
            match read_message(&mut lock) {
                Ok(Some(text)) => {
                    if inbound_tx.send(text).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read native message");
                    break;
                }
            }
        }
    });

    let mut updates = endpoint.listeners.subscribe();
    info!("serving native messaging on stdio");

    loop {
        tokio::select! {
            text = inbound_rx.recv() => {
                let Some(text) = text else { break };
                if let Some(reply) = endpoint.handle_text(&text).await {
                    if let Err(e) = write_stdout(&reply) {
                        warn!(error = %e, "failed to write native reply");
                        break;
                    }
                }
            }
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if let Some(text) = encode_broadcast(snapshot) {
                        if let Err(e) = write_stdout(&text) {
                            warn!(error = %e, "failed to write broadcast");
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("browser closed the native messaging pipe");
}
