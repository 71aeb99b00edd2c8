/*
 * Diameter Header.
 *
 * Raw packet format:
 *   0                   1                   2                   3
 *   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |    Version    |                 Message Length                |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  | command flags |                  Command-Code                 |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                         Application-ID                        |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                      Hop-by-Hop Identifier                    |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                      End-to-End Identifier                    |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *
 * Command Flags:
 *   0 1 2 3 4 5 6 7
 *  +-+-+-+-+-+-+-+-+  R(equest), P(roxyable), E(rror)
 *  |R P E T r r r r|  T(Potentially re-transmitted message), r(eserved)
 *  +-+-+-+-+-+-+-+-+
 *
 */

use crate::avp::Avp;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use num_traits::FromPrimitive;
use std::io::Read;
use std::io::Seek;
use std::io::Write;

pub mod flags {
    pub const REQUEST: u8 = 0x80;
    pub const PROXYABLE: u8 = 0x40;
    pub const ERROR: u8 = 0x20;
    pub const RETRANSMIT: u8 = 0x10;
}

const HEADER_LENGTH: u32 = 20;

#[derive(Debug, Clone)]
pub struct DiameterMessage {
    pub header: DiameterHeader,
    pub avps: Vec<Avp>,
}

#[derive(Debug, Clone)]
pub struct DiameterHeader {
    pub version: u8,
    pub length: u32,
    pub flags: u8,
    pub code: CommandCode,
    pub application_id: ApplicationId,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, num_derive::FromPrimitive)]
pub enum CommandCode {
    CapabilitiesExchange = 257,
    ReAuth = 258,
    AA = 265,
    Accounting = 271,
    CreditControl = 272,
    AbortSession = 274,
    SessionTerminate = 275,
    DeviceWatchdog = 280,
    DisconnectPeer = 282,
    SpendingLimit = 8388635,
    SpendingStatusNotification = 8388636,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, num_derive::FromPrimitive)]
pub enum ApplicationId {
    Common = 0,
    Accounting = 3,
    CreditControl = 4,
    Rx = 16777236,
    Gx = 16777238,
    Sy = 16777302,
}

impl DiameterMessage {
    pub fn new(
        code: CommandCode,
        application_id: ApplicationId,
        flags: u8,
        hop_by_hop_id: u32,
        end_to_end_id: u32,
    ) -> DiameterMessage {
        DiameterMessage {
            header: DiameterHeader {
                version: 1,
                length: HEADER_LENGTH,
                flags,
                code,
                application_id,
                hop_by_hop_id,
                end_to_end_id,
            },
            avps: Vec::new(),
        }
    }

    pub fn add_avp(&mut self, avp: Avp) {
        self.header.length += avp.get_length() + avp.get_padding() as u32;
        self.avps.push(avp);
    }

    /// Inserts an AVP at the front of the message; used to keep Session-Id
    /// the first AVP of every outbound request.
    pub fn insert_avp(&mut self, avp: Avp) {
        self.header.length += avp.get_length() + avp.get_padding() as u32;
        self.avps.insert(0, avp);
    }

    pub fn get_avp(&self, code: u32) -> Option<&Avp> {
        self.avps.iter().find(|avp| avp.get_code() == code)
    }

    pub fn get_avps(&self) -> &[Avp] {
        &self.avps
    }

    pub fn get_command_code(&self) -> CommandCode {
        self.header.code
    }

    pub fn get_application_id(&self) -> ApplicationId {
        self.header.application_id
    }

    pub fn get_flags(&self) -> u8 {
        self.header.flags
    }

    pub fn get_hop_by_hop_id(&self) -> u32 {
        self.header.hop_by_hop_id
    }

    pub fn get_end_to_end_id(&self) -> u32 {
        self.header.end_to_end_id
    }

    pub fn decode_from<R: Read + Seek>(reader: &mut R, dict: &Dictionary) -> Result<DiameterMessage> {
        let header = DiameterHeader::decode_from(reader)?;
        let app_id = header.application_id as u32;

        let mut avps = Vec::new();
        let mut offset = HEADER_LENGTH;
        while offset < header.length {
            let avp = Avp::decode_from(reader, app_id, dict)?;
            offset += avp.get_length() + avp.get_padding() as u32;
            avps.push(avp);
        }
        if offset != header.length {
            return Err(Error::DecodeError(
                "invalid diameter message, length mismatch".into(),
            ));
        }

        Ok(DiameterMessage { header, avps })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.encode_to(writer)?;
        for avp in &self.avps {
            avp.encode_to(writer)?;
        }
        Ok(())
    }
}

impl DiameterHeader {
    pub fn decode_from<R: Read>(reader: &mut R) -> Result<DiameterHeader> {
        let mut b = [0; HEADER_LENGTH as usize];
        reader.read_exact(&mut b)?;

        let version = b[0];
        let length = u32::from_be_bytes([0, b[1], b[2], b[3]]);
        let flags = b[4];

        let code = u32::from_be_bytes([0, b[5], b[6], b[7]]);
        let code = CommandCode::from_u32(code)
            .ok_or_else(|| Error::DecodeError(format!("unknown command code: {}", code)))?;

        let application_id = u32::from_be_bytes([b[8], b[9], b[10], b[11]]);
        let application_id = ApplicationId::from_u32(application_id).ok_or_else(|| {
            Error::DecodeError(format!("unknown application id: {}", application_id))
        })?;

        let hop_by_hop_id = u32::from_be_bytes([b[12], b[13], b[14], b[15]]);
        let end_to_end_id = u32::from_be_bytes([b[16], b[17], b[18], b[19]]);

        Ok(DiameterHeader {
            version,
            length,
            flags,
            code,
            application_id,
            hop_by_hop_id,
            end_to_end_id,
        })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.version])?;
        writer.write_all(&self.length.to_be_bytes()[1..4])?;
        writer.write_all(&[self.flags])?;
        writer.write_all(&(self.code as u32).to_be_bytes()[1..4])?;
        writer.write_all(&(self.application_id as u32).to_be_bytes())?;
        writer.write_all(&self.hop_by_hop_id.to_be_bytes())?;
        writer.write_all(&self.end_to_end_id.to_be_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp;
    use crate::avp::flags::M;
    use crate::avp::Enumerated;
    use crate::avp::Identity;
    use crate::avp::UTF8String;
    use crate::avp::Unsigned32;
    use crate::dictionary::DEFAULT_DICT;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_message() {
        let mut ccr = DiameterMessage::new(
            CommandCode::CreditControl,
            ApplicationId::CreditControl,
            flags::REQUEST,
            1123158610,
            3102381851,
        );
        ccr.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
        ccr.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
        ccr.add_avp(avp!(263, None, M, UTF8String::new("ses;12345888")));
        ccr.add_avp(avp!(416, None, M, Enumerated::new(1)));
        ccr.add_avp(avp!(415, None, M, Unsigned32::new(1000)));

        let mut encoded = Vec::new();
        ccr.encode_to(&mut encoded).unwrap();
        assert_eq!(encoded.len() as u32, ccr.header.length);

        let mut cursor = Cursor::new(&encoded);
        let decoded = DiameterMessage::decode_from(&mut cursor, &DEFAULT_DICT).unwrap();

        assert_eq!(decoded.get_command_code(), CommandCode::CreditControl);
        assert_eq!(decoded.get_application_id(), ApplicationId::CreditControl);
        assert_eq!(decoded.get_flags() & flags::REQUEST, flags::REQUEST);
        assert_eq!(decoded.get_hop_by_hop_id(), 1123158610);
        assert_eq!(decoded.get_end_to_end_id(), 3102381851);
        assert_eq!(decoded.get_avps().len(), 5);
        assert_eq!(
            decoded.get_avp(263).unwrap().get_utf8string(),
            Some("ses;12345888")
        );
        assert_eq!(decoded.get_avp(415).unwrap().get_unsigned32(), Some(1000));
    }

    #[test]
    fn test_insert_avp_goes_first() {
        let mut msg = DiameterMessage::new(
            CommandCode::CreditControl,
            ApplicationId::CreditControl,
            flags::REQUEST,
            1,
            1,
        );
        msg.add_avp(avp!(416, None, M, Enumerated::new(1)));
        msg.insert_avp(avp!(263, None, M, UTF8String::new("ses;1")));

        assert_eq!(msg.get_avps()[0].get_code(), 263);
        assert_eq!(msg.get_avps()[1].get_code(), 416);
    }
}
