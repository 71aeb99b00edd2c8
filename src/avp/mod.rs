/*
 * AVP format:
 *   0                   1                   2                   3
 *   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                         Command-Code                          |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |  Flags       |                 AVP Length                     |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                         Vendor ID (optional)                  |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                             Data                              |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                             Data             |    Padding     |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *
 * AVP Flags:
 *   0 1 2 3 4 5 6 7
 *  +-+-+-+-+-+-+-+-+  V(endor), M(andatory), P(rivate)
 *  |V M P r r r r r|  r(eserved)
 *  +-+-+-+-+-+-+-+-+
 *
 */

pub mod address;
pub mod enumerated;
pub mod float32;
pub mod float64;
pub mod group;
pub mod identity;
pub mod integer32;
pub mod integer64;
pub mod ipfilterrule;
pub mod ipv4;
pub mod octetstring;
pub mod qosfilterrule;
pub mod time;
pub mod unsigned32;
pub mod unsigned64;
pub mod uri;
pub mod utf8string;

use crate::dictionary::Dictionary;
use crate::error::Result;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

pub use self::address::Address;
pub use self::enumerated::Enumerated;
pub use self::float32::Float32;
pub use self::float64::Float64;
pub use self::group::Grouped;
pub use self::identity::Identity;
pub use self::integer32::Integer32;
pub use self::integer64::Integer64;
pub use self::ipfilterrule::IPFilterRule;
pub use self::ipv4::IPv4;
pub use self::octetstring::OctetString;
pub use self::qosfilterrule::QoSFilterRule;
pub use self::time::Time;
pub use self::unsigned32::Unsigned32;
pub use self::unsigned64::Unsigned64;
pub use self::uri::DiameterURI;
pub use self::utf8string::UTF8String;

pub mod flags {
    pub const V: u8 = 0x80;
    pub const M: u8 = 0x40;
    pub const P: u8 = 0x20;
}

#[derive(Debug, Clone)]
pub struct Avp {
    header: AvpHeader,
    value: AvpValue,
    padding: u8,
}

#[derive(Debug, Clone)]
pub struct AvpHeader {
    code: u32,
    flags: u8,
    length: u32,
    vendor_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvpType {
    Address,
    DiameterURI,
    Enumerated,
    Float32,
    Float64,
    Grouped,
    IPFilterRule,
    IPv4,
    Identity,
    Integer32,
    Integer64,
    OctetString,
    QoSFilterRule,
    Time,
    UTF8String,
    Unknown,
    Unsigned32,
    Unsigned64,
}

#[derive(Debug, Clone)]
pub enum AvpValue {
    Address(Address),
    DiameterURI(DiameterURI),
    Enumerated(Enumerated),
    Float32(Float32),
    Float64(Float64),
    Grouped(Grouped),
    IPFilterRule(IPFilterRule),
    IPv4(IPv4),
    Identity(Identity),
    Integer32(Integer32),
    Integer64(Integer64),
    OctetString(OctetString),
    QoSFilterRule(QoSFilterRule),
    Time(Time),
    UTF8String(UTF8String),
    Unknown(OctetString),
    Unsigned32(Unsigned32),
    Unsigned64(Unsigned64),
}

impl AvpValue {
    pub fn length(&self) -> u32 {
        match self {
            AvpValue::Address(avp) => avp.length(),
            AvpValue::DiameterURI(avp) => avp.length(),
            AvpValue::Enumerated(avp) => avp.length(),
            AvpValue::Float32(avp) => avp.length(),
            AvpValue::Float64(avp) => avp.length(),
            AvpValue::Grouped(avp) => avp.length(),
            AvpValue::IPFilterRule(avp) => avp.length(),
            AvpValue::IPv4(avp) => avp.length(),
            AvpValue::Identity(avp) => avp.length(),
            AvpValue::Integer32(avp) => avp.length(),
            AvpValue::Integer64(avp) => avp.length(),
            AvpValue::OctetString(avp) => avp.length(),
            AvpValue::QoSFilterRule(avp) => avp.length(),
            AvpValue::Time(avp) => avp.length(),
            AvpValue::UTF8String(avp) => avp.length(),
            AvpValue::Unknown(avp) => avp.length(),
            AvpValue::Unsigned32(avp) => avp.length(),
            AvpValue::Unsigned64(avp) => avp.length(),
        }
    }

    pub fn get_type_name(&self) -> &'static str {
        match self {
            AvpValue::Address(_) => "Address",
            AvpValue::DiameterURI(_) => "DiameterURI",
            AvpValue::Enumerated(_) => "Enumerated",
            AvpValue::Float32(_) => "Float32",
            AvpValue::Float64(_) => "Float64",
            AvpValue::Grouped(_) => "Grouped",
            AvpValue::IPFilterRule(_) => "IPFilterRule",
            AvpValue::IPv4(_) => "IPv4",
            AvpValue::Identity(_) => "DiameterIdentity",
            AvpValue::Integer32(_) => "Integer32",
            AvpValue::Integer64(_) => "Integer64",
            AvpValue::OctetString(_) => "OctetString",
            AvpValue::QoSFilterRule(_) => "QoSFilterRule",
            AvpValue::Time(_) => "Time",
            AvpValue::UTF8String(_) => "UTF8String",
            AvpValue::Unknown(_) => "Unknown",
            AvpValue::Unsigned32(_) => "Unsigned32",
            AvpValue::Unsigned64(_) => "Unsigned64",
        }
    }
}

impl From<Address> for AvpValue {
    fn from(avp: Address) -> Self {
        AvpValue::Address(avp)
    }
}

impl From<DiameterURI> for AvpValue {
    fn from(avp: DiameterURI) -> Self {
        AvpValue::DiameterURI(avp)
    }
}

impl From<Enumerated> for AvpValue {
    fn from(avp: Enumerated) -> Self {
        AvpValue::Enumerated(avp)
    }
}

impl From<Float32> for AvpValue {
    fn from(avp: Float32) -> Self {
        AvpValue::Float32(avp)
    }
}

impl From<Float64> for AvpValue {
    fn from(avp: Float64) -> Self {
        AvpValue::Float64(avp)
    }
}

impl From<Grouped> for AvpValue {
    fn from(avp: Grouped) -> Self {
        AvpValue::Grouped(avp)
    }
}

impl From<IPFilterRule> for AvpValue {
    fn from(avp: IPFilterRule) -> Self {
        AvpValue::IPFilterRule(avp)
    }
}

impl From<IPv4> for AvpValue {
    fn from(avp: IPv4) -> Self {
        AvpValue::IPv4(avp)
    }
}

impl From<Identity> for AvpValue {
    fn from(avp: Identity) -> Self {
        AvpValue::Identity(avp)
    }
}

impl From<Integer32> for AvpValue {
    fn from(avp: Integer32) -> Self {
        AvpValue::Integer32(avp)
    }
}

impl From<Integer64> for AvpValue {
    fn from(avp: Integer64) -> Self {
        AvpValue::Integer64(avp)
    }
}

impl From<OctetString> for AvpValue {
    fn from(avp: OctetString) -> Self {
        AvpValue::OctetString(avp)
    }
}

impl From<QoSFilterRule> for AvpValue {
    fn from(avp: QoSFilterRule) -> Self {
        AvpValue::QoSFilterRule(avp)
    }
}

impl From<Time> for AvpValue {
    fn from(avp: Time) -> Self {
        AvpValue::Time(avp)
    }
}

impl From<UTF8String> for AvpValue {
    fn from(avp: UTF8String) -> Self {
        AvpValue::UTF8String(avp)
    }
}

impl From<Unsigned32> for AvpValue {
    fn from(avp: Unsigned32) -> Self {
        AvpValue::Unsigned32(avp)
    }
}

impl From<Unsigned64> for AvpValue {
    fn from(avp: Unsigned64) -> Self {
        AvpValue::Unsigned64(avp)
    }
}

impl AvpHeader {
    pub fn decode_from<R: Read>(reader: &mut R) -> Result<AvpHeader> {
        let mut b = [0; 8];
        reader.read_exact(&mut b)?;

        let code = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let flags = b[4];
        let length = u32::from_be_bytes([0, b[5], b[6], b[7]]);

        if flags & flags::V != 0 {
            let mut b = [0; 4];
            reader.read_exact(&mut b)?;
            let vendor_id = u32::from_be_bytes(b);

            Ok(AvpHeader {
                code,
                flags,
                length,
                vendor_id: Some(vendor_id),
            })
        } else {
            Ok(AvpHeader {
                code,
                flags,
                length,
                vendor_id: None,
            })
        }
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.code.to_be_bytes())?;
        writer.write_all(&[self.flags])?;

        let length_bytes = &self.length.to_be_bytes()[1..4];
        writer.write_all(length_bytes)?;

        if let Some(vendor_id) = self.vendor_id {
            writer.write_all(&vendor_id.to_be_bytes())?;
        }

        Ok(())
    }
}

impl Avp {
    pub fn new(code: u32, vendor_id: Option<u32>, flags: u8, value: AvpValue) -> Avp {
        let header_length = if vendor_id.is_some() { 12 } else { 8 };
        let flags = if vendor_id.is_some() {
            flags | flags::V
        } else {
            flags
        };
        let padding = Avp::pad_to_32_bits(value.length());
        let header = AvpHeader {
            code,
            flags,
            length: header_length + value.length(),
            vendor_id,
        };
        Avp {
            header,
            value,
            padding,
        }
    }

    pub fn get_code(&self) -> u32 {
        self.header.code
    }

    pub fn get_flags(&self) -> u8 {
        self.header.flags
    }

    pub fn get_vendor_id(&self) -> Option<u32> {
        self.header.vendor_id
    }

    pub fn get_length(&self) -> u32 {
        self.header.length
    }

    pub fn get_padding(&self) -> u8 {
        self.padding
    }

    pub fn get_value(&self) -> &AvpValue {
        &self.value
    }

    pub fn get_unsigned32(&self) -> Option<u32> {
        match &self.value {
            AvpValue::Unsigned32(avp) => Some(avp.value()),
            _ => None,
        }
    }

    pub fn get_enumerated(&self) -> Option<i32> {
        match &self.value {
            AvpValue::Enumerated(avp) => Some(avp.value()),
            _ => None,
        }
    }

    pub fn get_utf8string(&self) -> Option<&str> {
        match &self.value {
            AvpValue::UTF8String(avp) => Some(avp.value()),
            _ => None,
        }
    }

    pub fn get_identity(&self) -> Option<&str> {
        match &self.value {
            AvpValue::Identity(avp) => Some(avp.value()),
            _ => None,
        }
    }

    /// Decodes one AVP. The value type is taken from the dictionary; AVPs the
    /// dictionary does not know decode as raw octets so that a received
    /// message never fails to decode on an unknown code.
    pub fn decode_from<R: Read + Seek>(
        reader: &mut R,
        app_id: u32,
        dict: &Dictionary,
    ) -> Result<Avp> {
        let header = AvpHeader::decode_from(reader)?;

        let header_length = if header.vendor_id.is_some() { 12 } else { 8 };
        let value_length = (header.length - header_length) as usize;

        let avp_type = dict
            .find_by_code(app_id, header.code, header.vendor_id.unwrap_or(0))
            .map(|def| def.avp_type.clone())
            .unwrap_or(AvpType::Unknown);

        let value = match avp_type {
            AvpType::Address => AvpValue::Address(Address::decode_from(reader, value_length)?),
            AvpType::DiameterURI => {
                AvpValue::DiameterURI(DiameterURI::decode_from(reader, value_length)?)
            }
            AvpType::Enumerated => AvpValue::Enumerated(Enumerated::decode_from(reader)?),
            AvpType::Float32 => AvpValue::Float32(Float32::decode_from(reader)?),
            AvpType::Float64 => AvpValue::Float64(Float64::decode_from(reader)?),
            AvpType::Grouped => AvpValue::Grouped(Grouped::decode_from(
                reader,
                value_length,
                app_id,
                dict,
            )?),
            AvpType::IPFilterRule => {
                AvpValue::IPFilterRule(IPFilterRule::decode_from(reader, value_length)?)
            }
            AvpType::IPv4 => AvpValue::IPv4(IPv4::decode_from(reader)?),
            AvpType::Identity => AvpValue::Identity(Identity::decode_from(reader, value_length)?),
            AvpType::Integer32 => AvpValue::Integer32(Integer32::decode_from(reader)?),
            AvpType::Integer64 => AvpValue::Integer64(Integer64::decode_from(reader)?),
            AvpType::OctetString => {
                AvpValue::OctetString(OctetString::decode_from(reader, value_length)?)
            }
            AvpType::QoSFilterRule => {
                AvpValue::QoSFilterRule(QoSFilterRule::decode_from(reader, value_length)?)
            }
            AvpType::Time => AvpValue::Time(Time::decode_from(reader)?),
            AvpType::UTF8String => {
                AvpValue::UTF8String(UTF8String::decode_from(reader, value_length)?)
            }
            AvpType::Unknown => AvpValue::Unknown(OctetString::decode_from(reader, value_length)?),
            AvpType::Unsigned32 => AvpValue::Unsigned32(Unsigned32::decode_from(reader)?),
            AvpType::Unsigned64 => AvpValue::Unsigned64(Unsigned64::decode_from(reader)?),
        };

        // Skip padding
        let padding = Avp::pad_to_32_bits(value_length as u32);
        if padding > 0 {
            reader.seek(SeekFrom::Current(padding as i64))?;
        }

        Ok(Avp {
            header,
            value,
            padding,
        })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.header.encode_to(writer)?;

        match &self.value {
            AvpValue::Address(avp) => avp.encode_to(writer)?,
            AvpValue::DiameterURI(avp) => avp.encode_to(writer)?,
            AvpValue::Enumerated(avp) => avp.encode_to(writer)?,
            AvpValue::Float32(avp) => avp.encode_to(writer)?,
            AvpValue::Float64(avp) => avp.encode_to(writer)?,
            AvpValue::Grouped(avp) => avp.encode_to(writer)?,
            AvpValue::IPFilterRule(avp) => avp.encode_to(writer)?,
            AvpValue::IPv4(avp) => avp.encode_to(writer)?,
            AvpValue::Identity(avp) => avp.encode_to(writer)?,
            AvpValue::Integer32(avp) => avp.encode_to(writer)?,
            AvpValue::Integer64(avp) => avp.encode_to(writer)?,
            AvpValue::OctetString(avp) => avp.encode_to(writer)?,
            AvpValue::QoSFilterRule(avp) => avp.encode_to(writer)?,
            AvpValue::Time(avp) => avp.encode_to(writer)?,
            AvpValue::UTF8String(avp) => avp.encode_to(writer)?,
            AvpValue::Unknown(avp) => avp.encode_to(writer)?,
            AvpValue::Unsigned32(avp) => avp.encode_to(writer)?,
            AvpValue::Unsigned64(avp) => avp.encode_to(writer)?,
        };

        for _ in 0..self.padding {
            writer.write_all(&[0])?;
        }

        Ok(())
    }

    fn pad_to_32_bits(length: u32) -> u8 {
        ((4 - (length & 0b11)) % 4) as u8
    }
}

#[macro_export]
macro_rules! avp {
    ($code:expr, $vendor_id:expr, $flags:expr, $value:expr) => {
        $crate::avp::Avp::new($code, $vendor_id, $flags, $value.into())
    };
}
