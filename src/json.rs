//! JSON ↔ Diameter AVP translation.
//!
//! Request bodies are free-form JSON objects whose keys are AVP names,
//! bare codes (`"263"`), or `code:vendor-id` pairs (`"2901:10415"`), and
//! whose values are numbers, strings, or nested objects (Grouped AVPs).
//! Received messages are rendered back to JSON with dictionary names where
//! known and `code:vendor` keys where not.

use crate::avp::{Avp, AvpValue, Grouped, UTF8String, Unsigned32};
use crate::diameter::DiameterMessage;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

pub const SESSION_ID_AVP: u32 = 263;

/// Encodes a JSON object into AVPs appended to `msg`.
///
/// A caller-supplied Session-Id is promoted to the first position of the
/// top-level AVP list; every other AVP keeps the JSON object's own order.
/// Values are typed by shape alone: numbers become Unsigned32 and strings
/// UTF8String regardless of the dictionary's declared type, matching the
/// observed wire format of the tool this one replaces.
pub fn encode(msg: &mut DiameterMessage, body: &[u8], dict: &Dictionary) -> Result<()> {
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| Error::EncodeError(format!("invalid JSON: {}", e)))?;
    let object = json
        .as_object()
        .ok_or_else(|| Error::EncodeError("JSON object expected".into()))?;

    let app_id = msg.get_application_id() as u32;
    for (key, value) in object {
        let avp = encode_entry(key, value, app_id, dict)?;
        if avp.get_code() == SESSION_ID_AVP && avp.get_vendor_id().is_none() {
            msg.insert_avp(avp);
        } else {
            msg.add_avp(avp);
        }
    }
    Ok(())
}

/// Renders a received message as JSON bytes.
///
/// Decoding is total: AVPs of unknown type render as `null`, binary octet
/// strings are rendered lossily as text, and the serializer escapes whatever
/// remains, so the output always parses.
pub fn decode(msg: &DiameterMessage, dict: &Dictionary) -> Result<Vec<u8>> {
    let object = decode_avps(msg.get_avps(), msg.get_application_id() as u32, dict);
    serde_json::to_vec(&Value::Object(object)).map_err(|e| Error::DecodeError(e.to_string()))
}

fn resolve_key(key: &str, app_id: u32, dict: &Dictionary) -> Result<(u32, u32)> {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        let code = key
            .parse::<u32>()
            .map_err(|_| Error::MalformedKey(key.into()))?;
        return Ok((code, 0));
    }

    if let Some((code, vendor)) = key.split_once(':') {
        let both_numeric = !code.is_empty()
            && !vendor.is_empty()
            && code.chars().all(|c| c.is_ascii_digit())
            && vendor.chars().all(|c| c.is_ascii_digit());
        if both_numeric {
            let code = code
                .parse::<u32>()
                .map_err(|_| Error::MalformedKey(key.into()))?;
            let vendor = vendor
                .parse::<u32>()
                .map_err(|_| Error::MalformedKey(key.into()))?;
            return Ok((code, vendor));
        }
    }

    dict.find_by_name(app_id, key)
        .map(|def| (def.code, def.vendor_id))
        .ok_or_else(|| Error::UnknownAvpName(key.into()))
}

fn encode_entry(key: &str, value: &Value, app_id: u32, dict: &Dictionary) -> Result<Avp> {
    let (code, vendor) = resolve_key(key, app_id, dict)?;
    let vendor_id = if vendor == 0 { None } else { Some(vendor) };

    match value {
        Value::Number(n) => {
            let num = n.as_f64().unwrap_or_default() as u32;
            Ok(Avp::new(code, vendor_id, 0, Unsigned32::new(num).into()))
        }
        Value::String(s) => Ok(Avp::new(code, vendor_id, 0, UTF8String::new(s).into())),
        Value::Object(object) => {
            let mut avps = Vec::new();
            for (key, value) in object {
                avps.push(encode_entry(key, value, app_id, dict)?);
            }
            Ok(Avp::new(code, vendor_id, 0, Grouped::new(avps).into()))
        }
        Value::Array(_) => Err(Error::UnknownDataType(format!("array value for key {}", key))),
        Value::Bool(_) => Err(Error::UnknownDataType(format!(
            "boolean value for key {}",
            key
        ))),
        Value::Null => Err(Error::UnknownDataType(format!("null value for key {}", key))),
    }
}

fn decode_avps(avps: &[Avp], app_id: u32, dict: &Dictionary) -> Map<String, Value> {
    let mut object = Map::new();
    for avp in avps {
        let vendor = avp.get_vendor_id().unwrap_or(0);
        let key = dict
            .find_by_code(app_id, avp.get_code(), vendor)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("{}:{}", avp.get_code(), vendor));

        let value = match avp.get_value() {
            AvpValue::Grouped(group) => Value::Object(decode_avps(group.avps(), app_id, dict)),
            scalar => scalar_value(scalar),
        };

        object.insert(key, value);
    }
    object
}

fn scalar_value(value: &AvpValue) -> Value {
    match value {
        AvpValue::Address(v) => Value::String(v.to_string()),
        AvpValue::DiameterURI(v) => Value::String(v.value().to_string()),
        AvpValue::Enumerated(v) => Value::from(v.value()),
        AvpValue::Float32(v) => serde_json::Number::from_f64(v.value() as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AvpValue::Float64(v) => serde_json::Number::from_f64(v.value())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AvpValue::Grouped(_) => Value::String("Grouped".into()),
        AvpValue::IPFilterRule(v) => Value::String(v.value().to_string()),
        AvpValue::IPv4(v) => Value::String(v.to_string()),
        AvpValue::Identity(v) => Value::String(v.value().to_string()),
        AvpValue::Integer32(v) => Value::from(v.value()),
        AvpValue::Integer64(v) => Value::from(v.value()),
        AvpValue::OctetString(v) => {
            Value::String(String::from_utf8_lossy(v.value()).into_owned())
        }
        AvpValue::QoSFilterRule(v) => Value::String(v.value().to_string()),
        AvpValue::Time(v) => Value::String(v.value().format("%Y-%m-%dT%H:%M:%S%z").to_string()),
        AvpValue::UTF8String(v) => Value::String(v.value().to_string()),
        AvpValue::Unknown(_) => Value::Null,
        AvpValue::Unsigned32(v) => Value::from(v.value()),
        AvpValue::Unsigned64(v) => Value::from(v.value()),
    }
}
