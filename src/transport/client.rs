//! Diameter Protocol Client
use crate::avp::flags::M;
use crate::avp::Identity;
use crate::avp::Unsigned32;
use crate::diameter::{flags, ApplicationId, CommandCode, DiameterMessage};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::transport::Codec;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::ops::DerefMut;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::sync::oneshot::Receiver;
use tokio::sync::oneshot::Sender;
use tokio::sync::watch;
use tokio::sync::Mutex;

/// Configuration for a Diameter protocol client.
///
/// The origin identity is used when the reader loop answers peer-initiated
/// Device-Watchdog requests on the caller's behalf.
pub struct DiameterClientConfig {
    pub origin_host: String,
    pub origin_realm: String,
    pub use_tls: bool,
    pub verify_cert: bool,
}

/// A Diameter protocol client for sending and receiving Diameter messages.
///
/// The client maintains a connection to a Diameter server and provides
/// functionality for sending requests and asynchronously receiving responses.
/// Responses are correlated to their requests by hop-by-hop id through a
/// shared map of pending oneshot senders, so any number of requests may be
/// in flight at once.
pub struct DiameterClient {
    config: DiameterClientConfig,
    address: String,
    local_addr: Option<SocketAddr>,
    writer: Option<Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>,
    msg_caches: Arc<Mutex<HashMap<u32, Sender<DiameterMessage>>>>,
    close_tx: Option<watch::Sender<bool>>,
    close_rx: watch::Receiver<bool>,
    seq_num: u32,
}

impl DiameterClient {
    /// Creates a new `DiameterClient` instance with a specified server address.
    ///
    /// Initializes the internal structures but does not establish a connection.
    /// The connection to the server will be established when `connect` is called.
    pub fn new(addr: &str, config: DiameterClientConfig) -> DiameterClient {
        let (close_tx, close_rx) = watch::channel(false);
        DiameterClient {
            config,
            address: addr.into(),
            local_addr: None,
            writer: None,
            msg_caches: Arc::new(Mutex::new(HashMap::new())),
            close_tx: Some(close_tx),
            close_rx,
            seq_num: 0,
        }
    }

    /// Establishes a connection to the Diameter server.
    ///
    /// Returns:
    ///    A `Result` containing a `ClientHandler` or an error if the
    ///    connection cannot be established. The handler must be driven by
    ///    `DiameterClient::handle` on its own task for responses to be
    ///    delivered.
    pub async fn connect(&mut self) -> Result<ClientHandler> {
        let stream = TcpStream::connect(self.address.clone()).await?;
        self.local_addr = stream.local_addr().ok();

        let close_tx = self
            .close_tx
            .take()
            .ok_or_else(|| Error::ClientError("Already connected".into()))?;

        if self.config.use_tls {
            let tls_connector = tokio_native_tls::TlsConnector::from(
                native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(!self.config.verify_cert)
                    .build()?,
            );
            let tls_stream = tls_connector.connect(&self.address.clone(), stream).await?;
            let (reader, writer) = tokio::io::split(tls_stream);

            let writer: Arc<Mutex<dyn AsyncWrite + Send + Unpin>> = Arc::new(Mutex::new(writer));
            self.writer = Some(Arc::clone(&writer));

            Ok(ClientHandler {
                reader: Box::new(reader),
                writer,
                msg_caches: Arc::clone(&self.msg_caches),
                close_tx,
                origin_host: self.config.origin_host.clone(),
                origin_realm: self.config.origin_realm.clone(),
            })
        } else {
            let (reader, writer) = tokio::io::split(stream);

            let writer: Arc<Mutex<dyn AsyncWrite + Send + Unpin>> = Arc::new(Mutex::new(writer));
            self.writer = Some(Arc::clone(&writer));

            Ok(ClientHandler {
                reader: Box::new(reader),
                writer,
                msg_caches: Arc::clone(&self.msg_caches),
                close_tx,
                origin_host: self.config.origin_host.clone(),
                origin_realm: self.config.origin_realm.clone(),
            })
        }
    }

    /// Handles incoming Diameter messages.
    ///
    /// Answers are routed to the pending request with the same hop-by-hop id;
    /// peer-initiated Device-Watchdog requests are answered in place. The
    /// method returns when the connection terminates, at which point the
    /// close-notify watch fires and every pending request is dropped.
    pub async fn handle(handler: &mut ClientHandler, dictionary: Arc<Dictionary>) {
        loop {
            match Codec::decode(&mut handler.reader, &dictionary).await {
                Ok(msg) => {
                    if msg.get_flags() & flags::REQUEST != 0 {
                        if let Err(e) = Self::process_incoming_request(handler, &msg).await {
                            log::error!("Failed to answer peer request; error: {:?}", e);
                            break;
                        }
                    } else {
                        Self::process_decoded_msg(&handler.msg_caches, msg).await;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read message from socket; error: {:?}", e);
                    break;
                }
            }
        }

        let _ = handler.close_tx.send(true);
        handler.msg_caches.lock().await.clear();
    }

    // DWR is the only request a peer sends on a client-initiated connection
    // that must be answered for the link to stay up.
    async fn process_incoming_request(handler: &ClientHandler, req: &DiameterMessage) -> Result<()> {
        match req.get_command_code() {
            CommandCode::DeviceWatchdog => {
                let mut dwa = DiameterMessage::new(
                    CommandCode::DeviceWatchdog,
                    ApplicationId::Common,
                    req.get_flags() ^ flags::REQUEST,
                    req.get_hop_by_hop_id(),
                    req.get_end_to_end_id(),
                );
                dwa.add_avp(crate::avp!(268, None, M, Unsigned32::new(2001)));
                dwa.add_avp(crate::avp!(264, None, M, Identity::new(&handler.origin_host)));
                dwa.add_avp(crate::avp!(296, None, M, Identity::new(&handler.origin_realm)));

                let mut writer = handler.writer.lock().await;
                Codec::encode(&mut writer.deref_mut(), &dwa).await
            }
            code => {
                log::warn!("Ignoring unsolicited {} request from peer", code);
                Ok(())
            }
        }
    }

    async fn process_decoded_msg(
        msg_caches: &Arc<Mutex<HashMap<u32, Sender<DiameterMessage>>>>,
        res: DiameterMessage,
    ) {
        let hop_by_hop = res.get_hop_by_hop_id();

        let sender_opt = {
            let mut msg_caches = msg_caches.lock().await;
            msg_caches.remove(&hop_by_hop)
        };
        match sender_opt {
            Some(sender) => {
                // A send error means the requester stopped waiting; the
                // answer is dropped rather than handed to anyone else.
                let _ = sender.send(res);
            }
            None => {
                log::warn!("No request found for hop_by_hop_id {}", hop_by_hop);
            }
        }
    }

    /// Sends a Diameter message and returns a future for receiving the response.
    pub async fn send_message(&mut self, req: DiameterMessage) -> Result<ResponseFuture> {
        if let Some(writer) = &self.writer {
            let (tx, rx) = oneshot::channel();
            let hop_by_hop = req.get_hop_by_hop_id();
            {
                let mut msg_caches = self.msg_caches.lock().await;
                msg_caches.insert(hop_by_hop, tx);
            }
            let mut writer = writer.lock().await;
            Codec::encode(&mut writer.deref_mut(), &req).await?;
            Ok(ResponseFuture { receiver: rx })
        } else {
            Err(Error::ClientError("Not connected".into()))
        }
    }

    /// A watch receiver that flips to `true` exactly once, when the
    /// connection terminates.
    pub fn close_notify(&self) -> watch::Receiver<bool> {
        self.close_rx.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    // Returns the next sequence number.
    pub fn get_next_seq_num(&mut self) -> u32 {
        self.seq_num += 1;
        self.seq_num
    }
}

/// A Diameter protocol client handler for receiving Diameter messages.
pub struct ClientHandler {
    reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    writer: Arc<Mutex<dyn AsyncWrite + Send + Unpin>>,
    msg_caches: Arc<Mutex<HashMap<u32, Sender<DiameterMessage>>>>,
    close_tx: watch::Sender<bool>,
    origin_host: String,
    origin_realm: String,
}

/// A future for receiving a Diameter message response.
#[derive(Debug)]
pub struct ResponseFuture {
    pub receiver: Receiver<DiameterMessage>,
}

impl Future for ResponseFuture {
    type Output = Result<DiameterMessage>;

    fn poll(
        mut self: Pin<&mut Self>,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(ctx) {
            std::task::Poll::Ready(result) => match result {
                Ok(response) => std::task::Poll::Ready(Ok(response)),
                Err(_) => std::task::Poll::Ready(Err(Error::ClientError(
                    "Response channel closed".into(),
                ))),
            },
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
