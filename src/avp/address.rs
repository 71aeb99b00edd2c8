use crate::error::{Error, Result};
use std::fmt;
use std::io::Read;
use std::io::Write;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

// Address family numbers per RFC 6733 §4.3.1.
const FAMILY_IPV4: u16 = 1;
const FAMILY_IPV6: u16 = 2;

#[derive(Debug, Clone)]
pub enum Value {
    IPv4(Ipv4Addr),
    IPv6(Ipv6Addr),
}

#[derive(Debug, Clone)]
pub struct Address(Value);

impl Address {
    pub fn new(value: Value) -> Address {
        Address(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<Address> {
        let mut b = vec![0u8; len];
        reader.read_exact(&mut b)?;
        if b.len() < 2 {
            return Err(Error::DecodeError("address AVP too short".into()));
        }
        let family = u16::from_be_bytes([b[0], b[1]]);
        match (family, b.len() - 2) {
            (FAMILY_IPV4, 4) => {
                let octets: [u8; 4] = b[2..6].try_into()?;
                Ok(Address(Value::IPv4(Ipv4Addr::from(octets))))
            }
            (FAMILY_IPV6, 16) => {
                let octets: [u8; 16] = b[2..18].try_into()?;
                Ok(Address(Value::IPv6(Ipv6Addr::from(octets))))
            }
            _ => Err(Error::DecodeError(format!(
                "unsupported address family {} with {} data bytes",
                family,
                b.len() - 2
            ))),
        }
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match &self.0 {
            Value::IPv4(ip) => {
                writer.write_all(&FAMILY_IPV4.to_be_bytes())?;
                writer.write_all(&ip.octets())?;
            }
            Value::IPv6(ip) => {
                writer.write_all(&FAMILY_IPV6.to_be_bytes())?;
                writer.write_all(&ip.octets())?;
            }
        }
        Ok(())
    }

    pub fn length(&self) -> u32 {
        match &self.0 {
            Value::IPv4(_) => 2 + 4,
            Value::IPv6(_) => 2 + 16,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::IPv4(ip) => write!(f, "{}", ip),
            Value::IPv6(ip) => write!(f, "{}", ip),
        }
    }
}
