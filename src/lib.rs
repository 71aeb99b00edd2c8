//! # ccg
//!
//! An HTTP/JSON front-end for submitting Diameter Credit-Control (Gy) and
//! Sy transactions to a remote peer, intended for testing and light
//! operational probing of OCS/PCRF-adjacent servers.
//!
//! Request bodies are free-form JSON objects translated onto Diameter AVPs
//! through a loadable dictionary; answers come back as JSON. Traffic can be
//! captured to a libpcap trace on the side.
//!
//! ## Reference
//! Diameter base protocol per [RFC 6733](https://tools.ietf.org/html/rfc6733),
//! Credit-Control per [RFC 4006](https://tools.ietf.org/html/rfc4006).

pub mod avp;
pub mod bridge;
pub mod config;
pub mod diameter;
pub mod dictionary;
pub mod display;
pub mod error;
pub mod json;
pub mod pcap;
pub mod rest;
pub mod transport;

pub use crate::diameter::flags;
pub use crate::diameter::{ApplicationId, CommandCode, DiameterHeader, DiameterMessage};
pub use crate::error::{Error, Result};
