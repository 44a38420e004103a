//! Event output formatting.
//!
//! One formatted line per agent event. The standard generator produces the
//! harness's plain-text lines; alternate formatters can be swapped in
//! through the trait.

use crate::pdu::{CommandId, Pdu};

/// Produces one line of output per event kind.
pub trait OutputGenerator: Send + Sync {
    fn pdu_received(&self, agent_name: &str, peer_name: &str, pdu: &Pdu) -> String;
    fn pdu_sent(&self, agent_name: &str, peer_name: &str, pdu: &Pdu) -> String;
    fn bind_completed(&self, agent_name: &str, peer_name: &str) -> String;
    fn unbind_completed(&self, agent_name: &str, peer_name: &str) -> String;
    fn transport_closed(&self, agent_name: &str, peer_name: &str) -> String;
    fn transport_error(&self, agent_name: &str, peer_name: &str, error: &str) -> String;
    fn application_error(&self, agent_name: &str, error: &str) -> String;
}

#[derive(Debug, Default)]
pub struct StandardOutputGenerator;

impl StandardOutputGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl OutputGenerator for StandardOutputGenerator {
    fn pdu_received(&self, agent_name: &str, peer_name: &str, pdu: &Pdu) -> String {
        match pdu.command_id {
            CommandId::SubmitSm => {
                let mut line = format!("{agent_name} received submit-sm from {peer_name}");

                if let Some(dest_addr) = pdu.cstring_param(6) {
                    if !dest_addr.is_empty() {
                        line = format!("{line}, dest_addr=({dest_addr})");
                    }
                }

                let short_message = pdu
                    .octet_param(17)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                format!("{line}, short_message=({short_message})")
            }

            CommandId::SubmitSmResp => {
                let message_id = pdu.first_cstring_param().unwrap_or_default();
                format!(
                    "{agent_name} received submit-sm-resp from {peer_name}, message_id=({message_id})"
                )
            }

            _ => format!(
                "{agent_name} received {} from {peer_name}",
                pdu.command_name()
            ),
        }
    }

    fn pdu_sent(&self, agent_name: &str, peer_name: &str, pdu: &Pdu) -> String {
        format!("{agent_name} sent {} to {peer_name}", pdu.command_name())
    }

    fn bind_completed(&self, agent_name: &str, peer_name: &str) -> String {
        format!("{agent_name} completed a transceiver bind with {peer_name}")
    }

    fn unbind_completed(&self, agent_name: &str, peer_name: &str) -> String {
        format!("{agent_name} completed an unbind with {peer_name}")
    }

    fn transport_closed(&self, agent_name: &str, peer_name: &str) -> String {
        format!("{agent_name} peer connection closed from {peer_name}")
    }

    fn transport_error(&self, agent_name: &str, peer_name: &str, error: &str) -> String {
        format!("{agent_name} received error on transport with {peer_name}: {error}")
    }

    fn application_error(&self, agent_name: &str, error: &str) -> String {
        format!("{agent_name} reports an application error: {error}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_received_line() {
        let generator = StandardOutputGenerator::new();
        let line = generator.pdu_received("esme01", "smsc01", &Pdu::enquire_link(1));
        assert_eq!(line, "esme01 received enquire-link from smsc01");
    }

    #[test]
    fn submit_sm_line_with_dest_addr() {
        let generator = StandardOutputGenerator::new();
        let pdu = Pdu::submit_sm(1, 0, "", 0, "001100", b"hi there");

        let line = generator.pdu_received("smsc01", "esme01", &pdu);
        assert_eq!(
            line,
            "smsc01 received submit-sm from esme01, dest_addr=(001100), short_message=(hi there)"
        );
    }

    #[test]
    fn submit_sm_line_without_dest_addr() {
        let generator = StandardOutputGenerator::new();
        let pdu = Pdu::submit_sm(1, 0, "", 0, "", b"hi");

        let line = generator.pdu_received("smsc01", "esme01", &pdu);
        assert_eq!(
            line,
            "smsc01 received submit-sm from esme01, short_message=(hi)"
        );
    }

    #[test]
    fn submit_sm_resp_line_carries_message_id() {
        let generator = StandardOutputGenerator::new();
        let pdu = Pdu::submit_sm_resp(1, "smsc01");

        let line = generator.pdu_received("esme01", "smsc01", &pdu);
        assert_eq!(
            line,
            "esme01 received submit-sm-resp from smsc01, message_id=(smsc01)"
        );
    }

    #[test]
    fn sent_bind_and_error_lines() {
        let generator = StandardOutputGenerator::new();

        assert_eq!(
            generator.pdu_sent("esme01", "smsc01", &Pdu::enquire_link(1)),
            "esme01 sent enquire-link to smsc01"
        );
        assert_eq!(
            generator.bind_completed("esme01", "smsc01"),
            "esme01 completed a transceiver bind with smsc01"
        );
        assert_eq!(
            generator.transport_closed("esme01", "smsc01"),
            "esme01 peer connection closed from smsc01"
        );
        assert_eq!(
            generator.transport_error("esme01", "smsc01", "broken pipe"),
            "esme01 received error on transport with smsc01: broken pipe"
        );
        assert_eq!(
            generator.application_error("smsc01", "bad first pdu"),
            "smsc01 reports an application error: bad first pdu"
        );
    }
}
