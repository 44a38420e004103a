use std::net::{IpAddr, SocketAddr};

use serde::Deserialize;

use crate::agent::BindDescriptor;

/// Root configuration for the harness.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "SMSCs", default)]
    pub smscs: Vec<SmscConfig>,

    #[serde(rename = "ESMEs", default)]
    pub esmes: Vec<EsmeConfig>,

    #[serde(rename = "TransceiverBinds", default)]
    pub transceiver_binds: Vec<TransceiverBindConfig>,
}

/// One SMSC definition: where it listens and the password it hands to ESMEs
/// that bind toward it.
#[derive(Debug, Clone, Deserialize)]
pub struct SmscConfig {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "IP")]
    pub ip: String,

    #[serde(rename = "Port")]
    pub port: u16,

    #[serde(rename = "BindPassword", default)]
    pub bind_password: String,
}

/// One ESME definition: the local address its outbound connections share and
/// the identity it asserts in binds.
#[derive(Debug, Clone, Deserialize)]
pub struct EsmeConfig {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "IP")]
    pub ip: String,

    #[serde(rename = "Port")]
    pub port: u16,

    #[serde(rename = "BindSystemID", default)]
    pub bind_system_id: String,

    #[serde(rename = "BindSystemType", default)]
    pub bind_system_type: String,
}

/// A transceiver bind from an ESME to an SMSC, both by name.
#[derive(Debug, Clone, Deserialize)]
pub struct TransceiverBindConfig {
    #[serde(rename = "ESME")]
    pub esme: String,

    #[serde(rename = "SMSC")]
    pub smsc: String,
}

impl SmscConfig {
    /// Listening address. Only valid after `Config::validate` has run.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip.parse::<IpAddr>().expect("validated ip"), self.port)
    }
}

impl EsmeConfig {
    /// Local bind address for outbound dials. Only valid after
    /// `Config::validate` has run.
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip.parse::<IpAddr>().expect("validated ip"), self.port)
    }
}

/// The resolved bind descriptors for one ESME, in declaration order.
#[derive(Debug, Clone)]
pub struct BindPlan {
    pub esme_name: String,
    pub binds: Vec<BindDescriptor>,
}
