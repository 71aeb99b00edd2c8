use crate::avp::Avp;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::Read;
use std::io::Seek;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct Grouped(Vec<Avp>);

impl Grouped {
    pub fn new(avps: Vec<Avp>) -> Grouped {
        Grouped(avps)
    }

    pub fn avps(&self) -> &[Avp] {
        &self.0
    }

    pub fn add(&mut self, avp: Avp) {
        self.0.push(avp);
    }

    pub fn decode_from<R: Read + Seek>(
        reader: &mut R,
        len: usize,
        app_id: u32,
        dict: &Dictionary,
    ) -> Result<Grouped> {
        let mut avps = Vec::new();

        let mut offset = 0;
        while offset < len {
            let avp = Avp::decode_from(reader, app_id, dict)?;
            offset += avp.get_length() as usize;
            offset += avp.get_padding() as usize;
            avps.push(avp);
        }

        // sanity check, make sure everything is read
        if offset != len {
            return Err(Error::DecodeError(
                "invalid group avp, length mismatch".into(),
            ));
        }

        Ok(Grouped(avps))
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for avp in &self.0 {
            avp.encode_to(writer)?;
        }
        Ok(())
    }

    pub fn length(&self) -> u32 {
        self.0
            .iter()
            .map(|avp| avp.get_length() + avp.get_padding() as u32)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::enumerated::Enumerated;
    use crate::avp::unsigned32::Unsigned32;
    use crate::avp::AvpValue;
    use crate::dictionary::DEFAULT_DICT;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let group = Grouped::new(vec![
            Avp::new(416, None, 0, Enumerated::new(1).into()),
            Avp::new(415, None, 0, Unsigned32::new(1000).into()),
        ]);
        assert_eq!(group.avps().len(), 2);

        let mut encoded = Vec::new();
        group.encode_to(&mut encoded).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let group = Grouped::decode_from(&mut cursor, encoded.len(), 4, &DEFAULT_DICT).unwrap();
        assert_eq!(group.avps().len(), 2);
        assert_eq!(group.avps()[0].get_code(), 416);
        assert_eq!(group.avps()[1].get_code(), 415);

        match group.avps()[0].get_value() {
            AvpValue::Enumerated(v) => assert_eq!(v.value(), 1),
            _ => panic!("invalid value, expected Enumerated"),
        }
        match group.avps()[1].get_value() {
            AvpValue::Unsigned32(v) => assert_eq!(v.value(), 1000),
            _ => panic!("invalid value, expected Unsigned32"),
        }
    }
}
