//! PDU construction from user-command parameter maps and auto-response
//! policy helpers.
//!
//! Request PDUs leave the factory with a placeholder sequence number; the
//! owning peer session assigns the real one immediately before writing.
//! Response builders preserve the request's sequence number.

use std::collections::HashMap;

use thiserror::Error;

use super::Pdu;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unable to coerce parameter ({name}) from ({value}) to type ({wanted})")]
    BadParameter {
        name: &'static str,
        value: String,
        wanted: &'static str,
    },
}

/// Produces PDUs from string parameter maps. Kept behind a trait so tests
/// can substitute a recording or no-op variant.
pub trait PduFactory: Send + Sync {
    fn create_enquire_link(&self) -> Pdu;
    fn create_enquire_link_resp(&self, request: &Pdu) -> Pdu;
    fn create_submit_sm(&self, params: &HashMap<String, String>) -> Result<Pdu, FactoryError>;
    fn create_submit_sm_resp(&self, request: &Pdu, message_id: &str) -> Pdu;
}

/// The stock factory.
///
/// submit_sm defaults: empty source and destination addresses, NPI 0, and a
/// fixed placeholder short message. Unknown parameter keys are ignored.
#[derive(Debug, Default)]
pub struct DefaultPduFactory;

impl DefaultPduFactory {
    pub fn new() -> Self {
        Self
    }
}

const DEFAULT_SHORT_MESSAGE: &str = "This is a test short message";

impl PduFactory for DefaultPduFactory {
    fn create_enquire_link(&self) -> Pdu {
        Pdu::enquire_link(0)
    }

    fn create_enquire_link_resp(&self, request: &Pdu) -> Pdu {
        Pdu::enquire_link_resp(request.sequence_number)
    }

    fn create_submit_sm(&self, params: &HashMap<String, String>) -> Result<Pdu, FactoryError> {
        let source_addr_npi = u8_param(params, "source_addr_npi", 0)?;
        let dest_addr_npi = u8_param(params, "dest_addr_npi", 0)?;
        let source_addr = str_param(params, "source_addr", "");
        let destination_addr = str_param(params, "destination_addr", "");
        let short_message = str_param(params, "short_message", DEFAULT_SHORT_MESSAGE);

        Ok(Pdu::submit_sm(
            0,
            source_addr_npi,
            &source_addr,
            dest_addr_npi,
            &destination_addr,
            short_message.as_bytes(),
        ))
    }

    fn create_submit_sm_resp(&self, request: &Pdu, message_id: &str) -> Pdu {
        Pdu::submit_sm_resp(request.sequence_number, message_id)
    }
}

fn str_param(params: &HashMap<String, String>, name: &str, default: &str) -> String {
    params
        .get(name)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn u8_param(
    params: &HashMap<String, String>,
    name: &'static str,
    default: u8,
) -> Result<u8, FactoryError> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value.parse::<u8>().map_err(|_| FactoryError::BadParameter {
            name,
            value: value.clone(),
            wanted: "uint8",
        }),
    }
}
