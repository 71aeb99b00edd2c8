//! Diameter Protocol Transport

pub mod client;
pub mod server;

pub use crate::transport::client::ClientHandler;
pub use crate::transport::client::DiameterClient;
pub use crate::transport::client::DiameterClientConfig;
pub use crate::transport::client::ResponseFuture;
pub use crate::transport::server::DiameterServer;
pub use crate::transport::server::DiameterServerConfig;

use crate::diameter::DiameterMessage;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::Cursor;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;

/// Codec provides encoding and decoding functionality for Diameter messages
/// over the TCP transport layer.
pub struct Codec {}

impl Codec {
    /// Asynchronously decodes a DiameterMessage from a reader.
    ///
    /// Reads from `reader`, decodes according to Diameter protocol standards,
    /// and returns a DiameterMessage. AVP value types are resolved against
    /// `dict`.
    pub async fn decode<R>(reader: &mut R, dict: &Dictionary) -> Result<DiameterMessage>
    where
        R: AsyncReadExt + Unpin,
    {
        let mut b = [0; 4];
        reader.read_exact(&mut b).await?;
        let length = u32::from_be_bytes([0, b[1], b[2], b[3]]);

        // Limit to 1MB
        if length as usize > 1024 * 1024 {
            return Err(Error::ClientError("Message too large to read".into()));
        }

        // Read the rest of the message
        let mut buffer = Vec::with_capacity(length as usize);
        buffer.extend_from_slice(&b);
        buffer.resize(length as usize, 0);
        reader.read_exact(&mut buffer[4..]).await?;

        let mut cursor = Cursor::new(buffer);
        DiameterMessage::decode_from(&mut cursor, dict)
    }

    /// Asynchronously encodes a DiameterMessage and writes it to a writer.
    pub async fn encode<W>(writer: &mut W, msg: &DiameterMessage) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        let mut b = Vec::new();
        msg.encode_to(&mut b)?;
        writer.write_all(&b).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::avp;
    use crate::avp::flags::M;
    use crate::avp::Enumerated;
    use crate::avp::Identity;
    use crate::avp::UTF8String;
    use crate::avp::Unsigned32;
    use crate::diameter::flags;
    use crate::diameter::{ApplicationId, CommandCode, DiameterMessage};
    use crate::dictionary::DEFAULT_DICT;
    use crate::transport::DiameterClient;
    use crate::transport::DiameterClientConfig;
    use crate::transport::DiameterServer;
    use crate::transport::DiameterServerConfig;
    use std::sync::Arc;

    fn test_client_config() -> DiameterClientConfig {
        DiameterClientConfig {
            origin_host: "client.example.com".into(),
            origin_realm: "example.com".into(),
            use_tls: false,
            verify_cert: false,
        }
    }

    #[tokio::test]
    async fn test_diameter_transport() {
        let dict = Arc::new(DEFAULT_DICT.clone());

        // Diameter Server
        let mut server = DiameterServer::new("127.0.0.1:0", DiameterServerConfig { native_tls: None })
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        let dict_ref = Arc::clone(&dict);
        tokio::spawn(async move {
            server
                .listen(
                    move |req| async move {
                        let mut res = DiameterMessage::new(
                            req.get_command_code(),
                            req.get_application_id(),
                            req.get_flags() ^ flags::REQUEST,
                            req.get_hop_by_hop_id(),
                            req.get_end_to_end_id(),
                        );
                        res.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
                        res.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
                        res.add_avp(avp!(263, None, M, UTF8String::new("ses;123458890")));
                        res.add_avp(avp!(268, None, M, Unsigned32::new(2001)));
                        Ok(Some(res))
                    },
                    dict_ref,
                )
                .await
                .unwrap();
        });

        // Diameter Client
        let mut client = DiameterClient::new(&server_addr.to_string(), test_client_config());
        let mut handler = client.connect().await.unwrap();
        let dict_ref = Arc::clone(&dict);
        tokio::spawn(async move {
            DiameterClient::handle(&mut handler, dict_ref).await;
        });

        // Send a single CCR
        let seq_num = client.get_next_seq_num();
        let mut ccr = DiameterMessage::new(
            CommandCode::CreditControl,
            ApplicationId::CreditControl,
            flags::REQUEST,
            seq_num,
            seq_num,
        );
        ccr.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
        ccr.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
        ccr.add_avp(avp!(263, None, M, UTF8String::new("ses;12345888")));
        ccr.add_avp(avp!(416, None, M, Enumerated::new(1)));
        ccr.add_avp(avp!(415, None, M, Unsigned32::new(1000)));
        let response = client.send_message(ccr).await.unwrap();
        let cca = response.await.unwrap();

        let result_code = cca.get_avp(268).unwrap();
        assert_eq!(result_code.get_unsigned32().unwrap(), 2001);

        // Send multiple CCRs; answers must pair up by hop-by-hop id
        let mut handles = vec![];
        for _ in 0..3 {
            let seq_num = client.get_next_seq_num();
            let mut ccr = DiameterMessage::new(
                CommandCode::CreditControl,
                ApplicationId::CreditControl,
                flags::REQUEST,
                seq_num,
                seq_num,
            );
            ccr.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
            ccr.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
            ccr.add_avp(avp!(263, None, M, UTF8String::new("ses;12345888")));
            ccr.add_avp(avp!(416, None, M, Enumerated::new(1)));
            ccr.add_avp(avp!(415, None, M, Unsigned32::new(1000)));
            let response = client.send_message(ccr).await.unwrap();
            let handle = tokio::spawn(async move {
                let cca = response.await.unwrap();
                let result_code = cca.get_avp(268).unwrap();
                assert_eq!(result_code.get_unsigned32().unwrap(), 2001);
            });

            handles.push(handle);
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
