//! TCP readiness probing.
//!
//! A database container's process being up is not the same as the engine
//! accepting connections. The probe dials the published port until a
//! connect succeeds or the deadline passes; refusals and resets are
//! retried, anything else fails fast.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

use crate::error::{ProvisionError, Result};

/// Dial `host:port` until it accepts a TCP connection.
pub(crate) async fn wait_until_accepting(
    host: &str,
    port: u16,
    deadline: Duration,
    interval: Duration,
) -> Result<()> {
    let started = Instant::now();
    let mut last_error =
        io::Error::new(io::ErrorKind::TimedOut, "no connection attempt completed");

    loop {
        let Some(remaining) = deadline.checked_sub(started.elapsed()) else {
            return Err(ProvisionError::StartupTimeout {
                waited: started.elapsed(),
                last_error,
            });
        };

        match timeout(remaining, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                tracing::debug!(host, port, waited = ?started.elapsed(), "Port accepting connections");
                return Ok(());
            }
            Ok(Err(err)) if is_retryable(&err) => last_error = err,
            Ok(Err(err)) => return Err(ProvisionError::Probe(err)),
            Err(_elapsed) => {
                return Err(ProvisionError::StartupTimeout {
                    waited: started.elapsed(),
                    last_error,
                })
            }
        }

        sleep(interval).await;
    }
}

/// Connection-level failures clear up once the engine finishes starting;
/// everything else (resolution failures, permission errors) will not.
fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::AddrNotAvailable
    )
}
