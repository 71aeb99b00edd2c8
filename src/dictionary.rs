use lazy_static::lazy_static;
use serde::Deserialize;
use serde_xml_rs::from_str;
use std::collections::HashMap;
use std::sync::Arc;

use crate::avp::AvpType;
use crate::error::{Error, Result};

/// AVP dictionary, indexed by `(application-id, name)` and by
/// `(application-id, code, vendor-id)`. Lookups for a concrete application
/// fall back to the base application (id 0), mirroring how Diameter
/// dictionaries layer application AVPs over the base protocol.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    by_name: HashMap<(u32, String), Arc<AvpDefinition>>,
    by_code: HashMap<(u32, u32, u32), Arc<AvpDefinition>>,
}

#[derive(Debug)]
pub struct AvpDefinition {
    pub code: u32,
    pub vendor_id: u32,
    pub name: String,
    pub avp_type: AvpType,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }

    pub fn add_avp(&mut self, app_id: u32, avp: AvpDefinition) {
        let avp = Arc::new(avp);
        self.by_name
            .insert((app_id, avp.name.clone()), Arc::clone(&avp));
        self.by_code
            .insert((app_id, avp.code, avp.vendor_id), avp);
    }

    pub fn find_by_name(&self, app_id: u32, name: &str) -> Option<&AvpDefinition> {
        self.by_name
            .get(&(app_id, name.to_string()))
            .or_else(|| self.by_name.get(&(0, name.to_string())))
            .map(|avp| avp.as_ref())
    }

    pub fn find_by_code(&self, app_id: u32, code: u32, vendor_id: u32) -> Option<&AvpDefinition> {
        self.by_code
            .get(&(app_id, code, vendor_id))
            .or_else(|| self.by_code.get(&(0, code, vendor_id)))
            .map(|avp| avp.as_ref())
    }

    /// Merges the AVP definitions of an XML dictionary into this one.
    /// Used at startup for the built-in dictionary and for the optional
    /// extra dictionary file named by the configuration.
    pub fn load_xml(&mut self, xml: &str) -> Result<()> {
        let dict: Diameter = from_str(xml)
            .map_err(|e| Error::DictionaryError(format!("cannot parse dictionary: {}", e)))?;

        for application in &dict.applications {
            let app_id = application
                .id
                .parse::<u32>()
                .map_err(|e| Error::DictionaryError(format!("bad application id: {}", e)))?;

            for avp in &application.avps {
                let code = avp
                    .code
                    .parse::<u32>()
                    .map_err(|e| Error::DictionaryError(format!("bad avp code: {}", e)))?;
                let vendor_id = match &avp.vendor_id {
                    Some(v) => v
                        .parse::<u32>()
                        .map_err(|e| Error::DictionaryError(format!("bad vendor id: {}", e)))?,
                    None => 0,
                };

                self.add_avp(
                    app_id,
                    AvpDefinition {
                        code,
                        vendor_id,
                        name: avp.name.clone(),
                        avp_type: parse_avp_type(&avp.data.data_type),
                    },
                );
            }
        }

        Ok(())
    }
}

fn parse_avp_type(name: &str) -> AvpType {
    match name {
        "Address" => AvpType::Address,
        "DiameterIdentity" => AvpType::Identity,
        "DiameterURI" => AvpType::DiameterURI,
        "Enumerated" => AvpType::Enumerated,
        "Float32" => AvpType::Float32,
        "Float64" => AvpType::Float64,
        "Grouped" => AvpType::Grouped,
        "IPFilterRule" => AvpType::IPFilterRule,
        "IPv4" => AvpType::IPv4,
        "Integer32" => AvpType::Integer32,
        "Integer64" => AvpType::Integer64,
        "OctetString" => AvpType::OctetString,
        "QoSFilterRule" => AvpType::QoSFilterRule,
        "Time" => AvpType::Time,
        "UTF8String" => AvpType::UTF8String,
        "Unsigned32" => AvpType::Unsigned32,
        "Unsigned64" => AvpType::Unsigned64,
        _ => AvpType::Unknown,
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Diameter {
    #[serde(rename = "application", default)]
    applications: Vec<Application>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Application {
    id: String,
    name: String,
    #[serde(rename = "avp", default)]
    avps: Vec<Avp>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Avp {
    name: String,
    code: String,
    must: Option<String>,
    may: Option<String>,
    #[serde(rename = "must-not")]
    must_not: Option<String>,
    #[serde(rename = "may-encrypt")]
    may_encrypt: Option<String>,
    #[serde(rename = "vendor-id")]
    vendor_id: Option<String>,
    data: Data,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Data {
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    code: String,
    name: String,
}

lazy_static! {
    pub static ref DEFAULT_DICT: Dictionary = {
        let mut dict = Dictionary::new();
        dict.load_xml(&DEFAULT_DICT_XML)
            .expect("built-in dictionary must parse");
        dict
    };
    pub static ref DEFAULT_DICT_XML: &'static str = {
        let xml = r#"
<diameter>
    <application id="0" name="Base">
        <avp name="User-Name" code="1" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="UTF8String"/>
        </avp>

        <avp name="Called-Station-Id" code="30" must="M" may="-" must-not="V" may-encrypt="Y">
            <data type="UTF8String"/>
        </avp>

        <avp name="Proxy-State" code="33" must="M" may="-" must-not="PV" may-encrypt="N">
            <data type="OctetString"/>
        </avp>

        <avp name="Event-Timestamp" code="55" must="M" may="P" must-not="V" may-encrypt="N">
            <data type="Time"/>
        </avp>

        <avp name="Host-IP-Address" code="257" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Address"/>
        </avp>

        <avp name="Auth-Application-Id" code="258" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Acct-Application-Id" code="259" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Vendor-Specific-Application-Id" code="260" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Grouped"/>
        </avp>

        <avp name="Redirect-Host-Usage" code="261" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Enumerated"/>
        </avp>

        <avp name="Session-Id" code="263" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="UTF8String"/>
        </avp>

        <avp name="Origin-Host" code="264" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

        <avp name="Supported-Vendor-Id" code="265" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Vendor-Id" code="266" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Firmware-Revision" code="267" must="-" may="-" must-not="PVM" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Result-Code" code="268" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Product-Name" code="269" must="-" may="-" must-not="PVM" may-encrypt="-">
            <data type="UTF8String"/>
        </avp>

        <avp name="Disconnect-Cause" code="273" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Enumerated">
                <item code="0" name="REBOOTING"/>
                <item code="1" name="BUSY"/>
                <item code="2" name="DO_NOT_WANT_TO_TALK_TO_YOU"/>
            </data>
        </avp>

        <avp name="Origin-State-Id" code="278" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Error-Message" code="281" must="-" may="P" must-not="VM" may-encrypt="-">
            <data type="UTF8String"/>
        </avp>

        <avp name="Destination-Realm" code="283" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

        <avp name="Redirect-Host" code="292" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterURI"/>
        </avp>

        <avp name="Destination-Host" code="293" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

        <avp name="Error-Reporting-Host" code="294" must="-" may="P" must-not="VM" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

        <avp name="Termination-Cause" code="295" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Enumerated">
                <item code="1" name="DIAMETER_LOGOUT"/>
                <item code="4" name="DIAMETER_ADMINISTRATIVE"/>
                <item code="8" name="DIAMETER_AUTH_EXPIRED"/>
            </data>
        </avp>

        <avp name="Origin-Realm" code="296" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>
    </application>

    <application id="4" name="Credit-Control">
        <avp name="CC-Input-Octets" code="412" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned64"/>
        </avp>

        <avp name="CC-Output-Octets" code="414" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned64"/>
        </avp>

        <avp name="CC-Request-Number" code="415" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned32"/>
        </avp>

        <avp name="CC-Request-Type" code="416" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="1" name="INITIAL_REQUEST"/>
                <item code="2" name="UPDATE_REQUEST"/>
                <item code="3" name="TERMINATION_REQUEST"/>
                <item code="4" name="EVENT_REQUEST"/>
            </data>
        </avp>

        <avp name="CC-Session-Failover" code="418" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="0" name="FAILOVER_NOT_SUPPORTED"/>
                <item code="1" name="FAILOVER_SUPPORTED"/>
            </data>
        </avp>

        <avp name="CC-Time" code="420" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned32"/>
        </avp>

        <avp name="CC-Total-Octets" code="421" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned64"/>
        </avp>

        <avp name="Credit-Control-Failure-Handling" code="427" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="0" name="TERMINATE"/>
                <item code="1" name="CONTINUE"/>
                <item code="2" name="RETRY_AND_TERMINATE"/>
            </data>
        </avp>

        <avp name="Final-Unit-Action" code="449" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="0" name="TERMINATE"/>
                <item code="1" name="REDIRECT"/>
                <item code="2" name="RESTRICT_ACCESS"/>
            </data>
        </avp>

        <avp name="Final-Unit-Indication" code="430" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Grouped"/>
        </avp>

        <avp name="Granted-Service-Unit" code="431" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Grouped"/>
        </avp>

        <avp name="Rating-Group" code="432" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Requested-Action" code="436" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="0" name="DIRECT_DEBITING"/>
                <item code="1" name="REFUND_ACCOUNT"/>
                <item code="2" name="CHECK_BALANCE"/>
                <item code="3" name="PRICE_ENQUIRY"/>
            </data>
        </avp>

        <avp name="Requested-Service-Unit" code="437" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Grouped"/>
        </avp>

        <avp name="Subscription-Id" code="443" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Grouped"/>
        </avp>

        <avp name="Subscription-Id-Data" code="444" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="UTF8String"/>
        </avp>

        <avp name="Subscription-Id-Type" code="450" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="0" name="END_USER_E164"/>
                <item code="1" name="END_USER_IMSI"/>
                <item code="2" name="END_USER_SIP_URI"/>
                <item code="3" name="END_USER_NAI"/>
                <item code="4" name="END_USER_PRIVATE"/>
            </data>
        </avp>

        <avp name="Multiple-Services-Indicator" code="455" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Enumerated">
                <item code="0" name="MULTIPLE_SERVICES_NOT_SUPPORTED"/>
                <item code="1" name="MULTIPLE_SERVICES_SUPPORTED"/>
            </data>
        </avp>

        <avp name="Multiple-Services-Credit-Control" code="456" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Grouped"/>
        </avp>

        <avp name="Used-Service-Unit" code="446" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Grouped"/>
        </avp>

        <avp name="Validity-Time" code="448" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned32"/>
        </avp>

        <avp name="Service-Context-Id" code="461" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="UTF8String"/>
        </avp>

        <avp name="Service-Identifier" code="439" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="Unsigned32"/>
        </avp>
    </application>
</diameter>
    "#;
        xml
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name() {
        let avp = DEFAULT_DICT.find_by_name(4, "CC-Request-Type").unwrap();
        assert_eq!(avp.code, 416);
        assert_eq!(avp.vendor_id, 0);
        assert_eq!(avp.avp_type, AvpType::Enumerated);
    }

    #[test]
    fn test_find_by_name_falls_back_to_base() {
        // Session-Id is defined on the base application but must resolve
        // when looked up for Credit-Control.
        let avp = DEFAULT_DICT.find_by_name(4, "Session-Id").unwrap();
        assert_eq!(avp.code, 263);
        assert_eq!(avp.avp_type, AvpType::UTF8String);
    }

    #[test]
    fn test_find_by_code() {
        let avp = DEFAULT_DICT.find_by_code(4, 268, 0).unwrap();
        assert_eq!(avp.name, "Result-Code");
        assert_eq!(avp.avp_type, AvpType::Unsigned32);
    }

    #[test]
    fn test_find_unknown() {
        assert!(DEFAULT_DICT.find_by_name(4, "Not-An-AVP").is_none());
        assert!(DEFAULT_DICT.find_by_code(4, 999999, 0).is_none());
    }

    #[test]
    fn test_load_extra_dictionary() {
        let mut dict = Dictionary::new();
        dict.load_xml(&DEFAULT_DICT_XML).unwrap();
        dict.load_xml(include_str!("../dict/sy.xml")).unwrap();

        let avp = dict
            .find_by_name(16777302, "Policy-Counter-Identifier")
            .unwrap();
        assert_eq!(avp.code, 2901);
        assert_eq!(avp.vendor_id, 10415);
        assert_eq!(avp.avp_type, AvpType::UTF8String);

        // base definitions still resolve for the Sy application
        let avp = dict.find_by_name(16777302, "Origin-Host").unwrap();
        assert_eq!(avp.code, 264);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut dict = Dictionary::new();
        assert!(dict.load_xml("not xml at all").is_err());
    }
}
