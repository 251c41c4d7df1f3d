//! TCP command server
//!
//! Each connection carries exactly one request and gets exactly one response:
//!
//! 1. Client connects and sends `<headers>\r\n\r\n<JSON body>`
//! 2. Server decodes and applies the command
//! 3. Server writes `HTTP/1.1 <code> <reason>\r\nContent-Length: 0\r\n\r\n`
//! 4. Server closes the connection
//!
//! Connections are handled one at a time unless the server is configured as
//! concurrent, in which case each gets its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::backend::WindowBackend;
use crate::config::Config;
use crate::core::dispatch::Dispatcher;
use crate::core::request;
use crate::core::status::StatusOutcome;

/// How long to wait for body bytes a `Content-Length` header announced
const BODY_GRACE: Duration = Duration::from_millis(200);

/// Window command server owning its listening socket
pub struct WindowServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    max_request_bytes: usize,
    concurrent: bool,
}

impl WindowServer {
    /// Bind the listening socket
    pub async fn bind(config: &Config, backend: Arc<dyn WindowBackend>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr()).await?;

        if !config.bind.is_loopback() {
            tracing::warn!(
                "Listening on non-loopback address {}; any host that can reach it may move windows",
                config.bind
            );
        }

        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(backend)),
            max_request_bytes: config.max_request_bytes,
            concurrent: config.concurrent,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        tracing::info!(
            "Accepting connections on {} ({})",
            self.local_addr()?,
            if self.concurrent { "concurrent" } else { "sequential" }
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Server stopped");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!("Connection from {}", peer);
                            if self.concurrent {
                                let dispatcher = self.dispatcher.clone();
                                let max_request_bytes = self.max_request_bytes;
                                tokio::spawn(async move {
                                    serve_connection(stream, peer, &dispatcher, max_request_bytes)
                                        .await;
                                });
                            } else {
                                let max_request_bytes = self.max_request_bytes;
                                serve_connection(stream, peer, &self.dispatcher, max_request_bytes)
                                    .await;
                            }
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                            // Brief pause before retrying to avoid a tight error loop
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    dispatcher: &Dispatcher,
    max_request_bytes: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match handle_connection(stream, dispatcher, max_request_bytes).await {
        Ok(status) => tracing::debug!("Answered {} with {}", peer, status),
        Err(e) => tracing::error!("Connection from {} failed: {}", peer, e),
    }
}

/// Handle one request on `stream`, answer it and close the stream
pub async fn handle_connection<S>(
    mut stream: S,
    dispatcher: &Dispatcher,
    max_request_bytes: usize,
) -> std::io::Result<StatusOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let status = match read_request(&mut stream, max_request_bytes).await {
        Ok(raw) => crate::core::handle_request(&raw, dispatcher).await,
        Err(e) => {
            tracing::warn!("Failed to read request: {}", e);
            StatusOutcome::InternalError
        }
    };

    stream.write_all(status.to_response().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(status)
}

/// Read one request into a buffer of at most `max_request_bytes`
///
/// The first read decides the request. Later reads only happen while a
/// `Content-Length` header promises more body, and each gives up after
/// [`BODY_GRACE`] so a wrong header cannot stall the server.
async fn read_request<S>(stream: &mut S, max_request_bytes: usize) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; max_request_bytes];
    let mut filled = 0;

    while filled < buf.len() {
        let n = if filled == 0 {
            stream.read(&mut buf[filled..]).await?
        } else {
            match tokio::time::timeout(BODY_GRACE, stream.read(&mut buf[filled..])).await {
                Ok(read) => read?,
                Err(_) => {
                    tracing::debug!("Announced body did not arrive, using {} bytes", filled);
                    break;
                }
            }
        };
        if n == 0 {
            break;
        }
        filled += n;
        if !request::awaiting_body(&buf[..filled]) {
            break;
        }
    }

    buf.truncate(filled);
    Ok(buf)
}
