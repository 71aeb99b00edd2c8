//! Configuration record, loaded from a JSON file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;

/// Settings for this program. Field names match the keys of the JSON
/// configuration file; missing keys take zero values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "OriginHost")]
    pub origin_host: String,
    #[serde(rename = "OriginRealm")]
    pub origin_realm: String,
    #[serde(rename = "DiameterServerAddr")]
    pub diameter_server_addr: String,
    #[serde(rename = "LocalRESTServerAddr")]
    pub local_rest_server_addr: String,
    #[serde(rename = "ExtraDiameterXML")]
    pub extra_diameter_xml: String,
    #[serde(rename = "DumpMessage")]
    pub dump_message: bool,
    #[serde(rename = "DumpPCAP")]
    pub dump_pcap: bool,
    #[serde(rename = "DumpFile")]
    pub dump_file: String,
    #[serde(rename = "DiameterTLS")]
    pub diameter_tls: bool,
    #[serde(rename = "DiameterTLSVerify")]
    pub diameter_tls_verify: bool,
}

impl Settings {
    pub fn load(path: &str) -> Result<Settings> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read {}: {}", path, e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("cannot parse {}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"{
            "OriginHost": "ocs.local",
            "OriginRealm": "local",
            "DiameterServerAddr": "127.0.0.1:3868",
            "LocalRESTServerAddr": "127.0.0.1:8080",
            "ExtraDiameterXML": "dict/sy.xml",
            "DumpMessage": true,
            "DumpPCAP": true,
            "DumpFile": "trace.pcap"
        }"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.origin_host, "ocs.local");
        assert_eq!(settings.origin_realm, "local");
        assert_eq!(settings.diameter_server_addr, "127.0.0.1:3868");
        assert!(settings.dump_message);
        assert!(settings.dump_pcap);
        assert_eq!(settings.dump_file, "trace.pcap");
        assert!(!settings.diameter_tls);
    }

    #[test]
    fn test_missing_keys_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.origin_host, "");
        assert!(!settings.dump_pcap);
    }
}
