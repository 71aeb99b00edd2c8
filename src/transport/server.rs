//! Diameter Protocol Server
//!
//! A minimal server implementation; the bridge itself is a pure client, and
//! the integration tests use this as the remote peer.
use crate::diameter::DiameterMessage;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::transport::Codec;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

pub struct DiameterServerConfig {
    pub native_tls: Option<native_tls::Identity>,
}

/// A Diameter protocol server for handling Diameter requests and responses.
///
/// This server listens for incoming Diameter messages, hands them to a
/// handler, and sends back the handler's answers. A handler may return
/// `None` to leave a request unanswered.
pub struct DiameterServer {
    listener: TcpListener,
    config: DiameterServerConfig,
}

impl DiameterServer {
    /// Creates a new `DiameterServer` and starts listening on the specified address.
    pub async fn new(addr: &str, config: DiameterServerConfig) -> Result<DiameterServer> {
        let listener = TcpListener::bind(addr).await?;
        Ok(DiameterServer { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Listens for incoming connections and processes Diameter messages.
    ///
    /// Each connection is handled in its own asynchronous task; within a
    /// connection, requests are answered in order with whatever the handler
    /// returns.
    pub async fn listen<F, Fut>(&mut self, handler: F, dict: Arc<Dictionary>) -> Result<()>
    where
        F: Fn(DiameterMessage) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<Option<DiameterMessage>>> + Send + 'static,
    {
        loop {
            match self.config.native_tls {
                Some(ref identity) => {
                    let acceptor = native_tls::TlsAcceptor::new(identity.clone())?;
                    let acceptor = tokio_native_tls::TlsAcceptor::from(acceptor);

                    let (stream, peer_addr) = self.listener.accept().await?;
                    let stream = match acceptor.accept(stream).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            log::error!("[{}] TLS accept failed: {}", peer_addr, e);
                            continue;
                        }
                    };

                    Self::handle_peer(peer_addr, stream, handler.clone(), Arc::clone(&dict));
                }
                None => {
                    let (stream, peer_addr) = self.listener.accept().await?;
                    Self::handle_peer(peer_addr, stream, handler.clone(), Arc::clone(&dict));
                }
            };
        }
    }

    fn handle_peer<F, Fut, S>(peer_addr: SocketAddr, stream: S, handler: F, dict: Arc<Dictionary>)
    where
        F: Fn(DiameterMessage) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<Option<DiameterMessage>>> + Send + 'static,
        S: AsyncReadExt + AsyncWriteExt + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            log::info!("[{}] Connection established", peer_addr);
            match Self::process_incoming_message(stream, handler, dict).await {
                Ok(_) => {
                    log::info!("[{}] Connection closed", peer_addr);
                }
                Err(e) => {
                    log::error!("[{}] Fatal error occurred: {:?}", peer_addr, e);
                }
            }
        });
    }

    async fn process_incoming_message<F, Fut, S>(
        mut stream: S,
        handler: F,
        dict: Arc<Dictionary>,
    ) -> Result<()>
    where
        F: Fn(DiameterMessage) -> Fut,
        Fut: Future<Output = Result<Option<DiameterMessage>>>,
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        loop {
            // Read and decode the request
            let req = match Codec::decode(&mut stream, &dict).await {
                Ok(req) => req,
                Err(e) => match e {
                    crate::error::Error::IoError(ref e)
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        return Ok(());
                    }
                    _ => {
                        return Err(e);
                    }
                },
            };

            // Process the request using the handler; `None` means the
            // request is deliberately left unanswered.
            if let Some(res) = handler(req).await? {
                Codec::encode(&mut stream, &res).await?;
            }
        }
    }
}
