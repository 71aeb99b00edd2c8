//! The bridge between the REST surface and the Diameter peer.
//!
//! One long-lived peer connection is owned by a single coordinator task.
//! REST callers enqueue their JSON bodies on a bounded tx queue, each
//! carrying its own reply slot; the coordinator builds and sends the
//! Diameter request, and a per-request task routes the answer (matched by
//! hop-by-hop id inside the transport client) back to exactly the caller
//! that submitted it.

use crate::avp::flags::M;
use crate::avp::{address, Address, Identity, UTF8String, Unsigned32};
use crate::config::Settings;
use crate::diameter::{flags, ApplicationId, CommandCode, DiameterMessage};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::json;
use crate::pcap::{self, CaptureRecord};
use crate::transport::{DiameterClient, DiameterClientConfig};
use rand::Rng;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio::time::Duration;

pub const INVALID_REQUEST_BODY: &str = r#"{"error":"invalid request"}"#;
// Spelling kept verbatim for callers that match on it.
pub const TIMEOUT_BODY: &str = r#"{"error":"timeout for wating CCA"}"#;

const VENDOR_ID: u32 = 2011;
const PRODUCT_NAME: &str = "ccg";
const TX_QUEUE_CAPACITY: usize = 1000;
const ANSWER_DEADLINE: Duration = Duration::from_secs(2);
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);
const CER_RETRIES: u32 = 3;
const CER_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Selects the command code, application and Auth-Application-Id stamped
/// onto an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Gy,
    SySlr,
    SyStr,
}

impl MessageKind {
    pub fn command_code(&self) -> CommandCode {
        match self {
            MessageKind::Gy => CommandCode::CreditControl,
            MessageKind::SySlr => CommandCode::SpendingLimit,
            MessageKind::SyStr => CommandCode::SessionTerminate,
        }
    }

    pub fn application_id(&self) -> ApplicationId {
        match self {
            MessageKind::Gy => ApplicationId::CreditControl,
            MessageKind::SySlr | MessageKind::SyStr => ApplicationId::Sy,
        }
    }

    pub fn auth_application_id(&self) -> u32 {
        self.application_id() as u32
    }
}

/// Peer identity learned from the capability exchange, stamped into
/// Destination-Host and Destination-Realm of every outbound request.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub origin_host: String,
    pub origin_realm: String,
}

pub(crate) struct TxRequest {
    pub(crate) body: Vec<u8>,
    pub(crate) kind: MessageKind,
    pub(crate) reply: oneshot::Sender<String>,
}

/// The caller-facing half of the bridge. Cheap to clone; one instance is
/// shared by all HTTP handlers.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) tx: mpsc::Sender<TxRequest>,
}

impl Gateway {
    /// Submits a JSON body and waits up to two seconds for the peer's
    /// answer. Every failure mode maps to a well-formed JSON object: bytes
    /// that are not JSON are rejected outright, and an elapsed deadline or
    /// a closed bridge both yield the timeout body.
    pub async fn submit(&self, body: Vec<u8>, kind: MessageKind) -> String {
        if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
            return INVALID_REQUEST_BODY.to_string();
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = TxRequest {
            body,
            kind,
            reply: reply_tx,
        };
        if self.tx.send(request).await.is_err() {
            return TIMEOUT_BODY.to_string();
        }

        match time::timeout(ANSWER_DEADLINE, reply_rx).await {
            Ok(Ok(answer)) => answer,
            _ => TIMEOUT_BODY.to_string(),
        }
    }
}

enum Event {
    Closed,
    Shutdown,
    Request(Option<TxRequest>),
    Watchdog,
}

/// The coordinator. Owns the Diameter client, the capture channel and the
/// tx queue consumer; `run` is its single long-lived task.
pub struct Bridge {
    settings: Arc<Settings>,
    dict: Arc<Dictionary>,
    client: DiameterClient,
    peer: PeerInfo,
    close_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tx_queue: mpsc::Receiver<TxRequest>,
    pcap_tx: Option<mpsc::Sender<CaptureRecord>>,
    pcap_task: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Dials the peer, performs the capability exchange and starts the
    /// capture writer when configured. Returns the coordinator and the
    /// gateway handle for the HTTP surface.
    pub async fn connect(
        settings: Arc<Settings>,
        dict: Arc<Dictionary>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(Bridge, Gateway)> {
        let client_config = DiameterClientConfig {
            origin_host: settings.origin_host.clone(),
            origin_realm: settings.origin_realm.clone(),
            use_tls: settings.diameter_tls,
            verify_cert: settings.diameter_tls_verify,
        };
        let mut client = DiameterClient::new(&settings.diameter_server_addr, client_config);
        let mut handler = client.connect().await?;
        let handler_dict = Arc::clone(&dict);
        tokio::spawn(async move {
            DiameterClient::handle(&mut handler, handler_dict).await;
        });

        let peer = capability_exchange(&mut client, &settings).await?;
        log::info!(
            "Client connect to server({}) success.",
            settings.diameter_server_addr
        );

        let (pcap_tx, pcap_task) = if settings.dump_pcap && !settings.dump_file.is_empty() {
            match pcap::start(&settings.dump_file).await {
                Some((tx, task)) => (Some(tx), Some(task)),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let (tx, tx_queue) = mpsc::channel(TX_QUEUE_CAPACITY);
        let close_rx = client.close_notify();

        Ok((
            Bridge {
                settings,
                dict,
                client,
                peer,
                close_rx,
                shutdown_rx,
                tx_queue,
                pcap_tx,
                pcap_task,
            },
            Gateway { tx },
        ))
    }

    /// The coordinator main loop: drains the tx queue, keeps the watchdog
    /// running, and shuts down on peer close or on the process shutdown
    /// signal. Peer close is the only error return.
    pub async fn run(mut self) -> Result<()> {
        let mut close_rx = self.close_rx.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut watchdog = time::interval_at(
            time::Instant::now() + WATCHDOG_INTERVAL,
            WATCHDOG_INTERVAL,
        );

        loop {
            let event = tokio::select! {
                _ = close_rx.changed() => Event::Closed,
                _ = shutdown_rx.changed() => Event::Shutdown,
                request = self.tx_queue.recv() => Event::Request(request),
                _ = watchdog.tick() => Event::Watchdog,
            };

            match event {
                Event::Closed => {
                    log::error!("Client disconnected.");
                    self.cleanup().await;
                    return Err(Error::ClientError("peer connection lost".into()));
                }
                Event::Shutdown | Event::Request(None) => {
                    self.cleanup().await;
                    log::info!("Client cleanup and exit.");
                    return Ok(());
                }
                Event::Request(Some(request)) => self.send_request(request).await,
                Event::Watchdog => self.send_watchdog().await,
            }
        }
    }

    async fn send_request(&mut self, request: TxRequest) {
        let TxRequest { body, kind, reply } = request;

        let seq = self.client.get_next_seq_num();
        let mut msg = DiameterMessage::new(
            kind.command_code(),
            kind.application_id(),
            flags::REQUEST,
            seq,
            seq,
        );
        msg.add_avp(crate::avp!(264, None, M, Identity::new(&self.settings.origin_host)));
        msg.add_avp(crate::avp!(296, None, M, Identity::new(&self.settings.origin_realm)));
        msg.add_avp(crate::avp!(293, None, M, Identity::new(&self.peer.origin_host)));
        msg.add_avp(crate::avp!(283, None, M, Identity::new(&self.peer.origin_realm)));
        msg.add_avp(crate::avp!(
            258,
            None,
            M,
            Unsigned32::new(kind.auth_application_id())
        ));

        // An encoder failure never reaches the wire; the caller gets the
        // error as its answer.
        if let Err(e) = json::encode(&mut msg, &body, &self.dict) {
            let _ = reply.send(error_body(&e));
            return;
        }

        // Insert a synthesized Session-Id if the caller did not supply one
        // (only the base-namespace AVP counts).
        let has_session_id = msg
            .get_avps()
            .iter()
            .any(|avp| avp.get_code() == json::SESSION_ID_AVP && avp.get_vendor_id().is_none());
        if !has_session_id {
            let session_id = format!(
                "{};{};{}",
                self.settings.origin_host,
                unix_now(),
                rand::thread_rng().gen::<u32>()
            );
            msg.insert_avp(crate::avp!(263, None, M, UTF8String::new(&session_id)));
        }

        if self.settings.dump_message {
            log::info!(
                "Sending {} to {}\n{}",
                msg.get_command_code(),
                self.settings.diameter_server_addr,
                msg
            );
        }

        self.capture(&msg);

        let response = match self.client.send_message(msg).await {
            Ok(response) => response,
            Err(e) => {
                // A send I/O error is not surfaced to the caller; transport
                // loss arrives through close-notify and the caller times out.
                log::error!("Failed to send request; error: {:?}", e);
                return;
            }
        };

        let dict = Arc::clone(&self.dict);
        let settings = Arc::clone(&self.settings);
        let pcap_tx = self.pcap_tx.clone();
        tokio::spawn(async move {
            // Bounded by the same deadline the caller waits with; a later
            // answer is dropped here instead of leaking to another caller.
            let answer = match time::timeout(ANSWER_DEADLINE, response).await {
                Ok(Ok(answer)) => answer,
                _ => return,
            };

            if settings.dump_message {
                log::info!(
                    "Receive {} from {}\n{}",
                    answer.get_command_code(),
                    settings.diameter_server_addr,
                    answer
                );
            }

            if let Some(pcap_tx) = &pcap_tx {
                if let Ok(bytes) = serialize(&answer) {
                    let _ = pcap_tx.try_send(CaptureRecord::now(bytes));
                }
            }

            match json::decode(&answer, &dict) {
                Ok(bytes) => {
                    let _ = reply.send(String::from_utf8_lossy(&bytes).into_owned());
                }
                Err(e) => {
                    let _ = reply.send(error_body(&e));
                }
            }
        });
    }

    async fn send_watchdog(&mut self) {
        let seq = self.client.get_next_seq_num();
        let mut dwr = DiameterMessage::new(
            CommandCode::DeviceWatchdog,
            ApplicationId::Common,
            flags::REQUEST,
            seq,
            seq,
        );
        dwr.add_avp(crate::avp!(264, None, M, Identity::new(&self.settings.origin_host)));
        dwr.add_avp(crate::avp!(296, None, M, Identity::new(&self.settings.origin_realm)));
        dwr.add_avp(crate::avp!(278, None, M, Unsigned32::new(unix_now() as u32)));

        match self.client.send_message(dwr).await {
            Ok(response) => {
                tokio::spawn(async move {
                    match time::timeout(WATCHDOG_INTERVAL, response).await {
                        Ok(Ok(_)) => log::debug!("Received DWA"),
                        _ => log::warn!("No DWA received within the watchdog interval"),
                    }
                });
            }
            Err(e) => log::warn!("Failed to send watchdog; error: {:?}", e),
        }
    }

    fn capture(&self, msg: &DiameterMessage) {
        if let Some(pcap_tx) = &self.pcap_tx {
            if let Ok(bytes) = serialize(msg) {
                let _ = pcap_tx.try_send(CaptureRecord::now(bytes));
            }
        }
    }

    async fn cleanup(&mut self) {
        self.tx_queue.close();
        self.pcap_tx = None;
        if let Some(task) = self.pcap_task.take() {
            // In-flight answer tasks hold capture senders for at most the
            // answer deadline; wait a little longer for the final flush.
            let _ = time::timeout(ANSWER_DEADLINE + Duration::from_secs(1), task).await;
        }
    }
}

async fn capability_exchange(
    client: &mut DiameterClient,
    settings: &Settings,
) -> Result<PeerInfo> {
    let mut last_err = Error::ClientError("capability exchange failed".into());
    for attempt in 0..=CER_RETRIES {
        if attempt > 0 {
            time::sleep(CER_RETRY_INTERVAL).await;
        }

        let cer = build_cer(client, settings);
        let response = client.send_message(cer).await?;
        match time::timeout(CER_RETRY_INTERVAL, response).await {
            Ok(Ok(cea)) => return parse_cea(cea),
            Ok(Err(e)) => last_err = e,
            Err(_) => last_err = Error::ClientError("timeout waiting for CEA".into()),
        }
    }
    Err(last_err)
}

fn build_cer(client: &mut DiameterClient, settings: &Settings) -> DiameterMessage {
    let seq = client.get_next_seq_num();
    let mut cer = DiameterMessage::new(
        CommandCode::CapabilitiesExchange,
        ApplicationId::Common,
        flags::REQUEST,
        seq,
        seq,
    );
    cer.add_avp(crate::avp!(264, None, M, Identity::new(&settings.origin_host)));
    cer.add_avp(crate::avp!(296, None, M, Identity::new(&settings.origin_realm)));

    let host_ip = client
        .local_addr()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let host_ip = match host_ip {
        IpAddr::V4(ip) => address::Value::IPv4(ip),
        IpAddr::V6(ip) => address::Value::IPv6(ip),
    };
    cer.add_avp(crate::avp!(257, None, M, Address::new(host_ip)));

    cer.add_avp(crate::avp!(266, None, M, Unsigned32::new(VENDOR_ID)));
    cer.add_avp(crate::avp!(269, None, 0, UTF8String::new(PRODUCT_NAME)));
    cer.add_avp(crate::avp!(
        258,
        None,
        M,
        Unsigned32::new(ApplicationId::CreditControl as u32)
    ));
    cer.add_avp(crate::avp!(
        258,
        None,
        M,
        Unsigned32::new(ApplicationId::Sy as u32)
    ));
    cer.add_avp(crate::avp!(278, None, M, Unsigned32::new(unix_now() as u32)));
    cer
}

fn parse_cea(cea: DiameterMessage) -> Result<PeerInfo> {
    let result_code = cea.get_avp(268).and_then(|avp| avp.get_unsigned32());
    if result_code != Some(2001) {
        return Err(Error::ClientError(format!(
            "capability exchange rejected, Result-Code {:?}",
            result_code
        )));
    }

    let origin_host = cea
        .get_avp(264)
        .and_then(|avp| avp.get_identity())
        .ok_or_else(|| Error::ClientError("CEA missing Origin-Host".into()))?
        .to_string();
    let origin_realm = cea
        .get_avp(296)
        .and_then(|avp| avp.get_identity())
        .ok_or_else(|| Error::ClientError("CEA missing Origin-Realm".into()))?
        .to_string();

    Ok(PeerInfo {
        origin_host,
        origin_realm,
    })
}

fn serialize(msg: &DiameterMessage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    msg.encode_to(&mut bytes)?;
    Ok(bytes)
}

fn error_body(err: &Error) -> String {
    let escaped = serde_json::to_string(&err.to_string()).unwrap_or_else(|_| "\"\"".into());
    format!(r#"{{"error":{}}}"#, escaped)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
