//! SMPP v3.4 PDU model.
//!
//! The harness treats a PDU generically: a command identifier, a command
//! status, a sequence number, and an ordered list of mandatory parameters.
//! Optional (TLV) parameters are carried as an opaque tail and re-emitted
//! verbatim on encode; the harness never constructs them.

mod codec;
mod factory;
mod reader;

pub use codec::CodecError;
pub use factory::{DefaultPduFactory, FactoryError, PduFactory};
pub use reader::{PduStreamReader, ReadError};

use bytes::Bytes;

/// SMPP 3.4 command identifiers exchanged by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandId {
    GenericNack = 0x8000_0000,
    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,
    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,
    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,
    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,
}

impl CommandId {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0x8000_0000 => Some(Self::GenericNack),
            0x0000_0009 => Some(Self::BindTransceiver),
            0x8000_0009 => Some(Self::BindTransceiverResp),
            0x0000_0006 => Some(Self::Unbind),
            0x8000_0006 => Some(Self::UnbindResp),
            0x0000_0004 => Some(Self::SubmitSm),
            0x8000_0004 => Some(Self::SubmitSmResp),
            0x0000_0015 => Some(Self::EnquireLink),
            0x8000_0015 => Some(Self::EnquireLinkResp),
            _ => None,
        }
    }

    /// Response PDUs carry the high bit of the command identifier.
    pub fn is_response(self) -> bool {
        (self as u32) & 0x8000_0000 != 0
    }

    pub fn is_request(self) -> bool {
        !self.is_response()
    }

    /// Wire name as used in command input and event output lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::GenericNack => "generic-nack",
            Self::BindTransceiver => "bind-transceiver",
            Self::BindTransceiverResp => "bind-transceiver-resp",
            Self::Unbind => "unbind",
            Self::UnbindResp => "unbind-resp",
            Self::SubmitSm => "submit-sm",
            Self::SubmitSmResp => "submit-sm-resp",
            Self::EnquireLink => "enquire-link",
            Self::EnquireLinkResp => "enquire-link-resp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "generic-nack" => Some(Self::GenericNack),
            "bind-transceiver" => Some(Self::BindTransceiver),
            "bind-transceiver-resp" => Some(Self::BindTransceiverResp),
            "unbind" => Some(Self::Unbind),
            "unbind-resp" => Some(Self::UnbindResp),
            "submit-sm" => Some(Self::SubmitSm),
            "submit-sm-resp" => Some(Self::SubmitSmResp),
            "enquire-link" => Some(Self::EnquireLink),
            "enquire-link-resp" => Some(Self::EnquireLinkResp),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One mandatory parameter value.
///
/// `CString` is a null-terminated octet string; `OctetString` is a counted
/// octet string whose length is carried by the preceding `Byte` parameter
/// (`sm_length` / `short_message` in submit_sm).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Byte(u8),
    CString(String),
    OctetString(Vec<u8>),
}

/// A single SMPP PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub command_id: CommandId,
    pub command_status: u32,
    pub sequence_number: u32,
    pub mandatory: Vec<Parameter>,
    /// Optional-parameter (TLV) tail, retained verbatim.
    pub optional_tail: Bytes,
}

impl Pdu {
    pub fn new(
        command_id: CommandId,
        command_status: u32,
        sequence_number: u32,
        mandatory: Vec<Parameter>,
    ) -> Self {
        Self {
            command_id,
            command_status,
            sequence_number,
            mandatory,
            optional_tail: Bytes::new(),
        }
    }

    pub fn is_request(&self) -> bool {
        self.command_id.is_request()
    }

    pub fn command_name(&self) -> &'static str {
        self.command_id.name()
    }

    /// The mandatory parameter at `idx`, if it is a C-octet string.
    pub fn cstring_param(&self, idx: usize) -> Option<&str> {
        match self.mandatory.get(idx) {
            Some(Parameter::CString(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The mandatory parameter at `idx`, if it is a counted octet string.
    pub fn octet_param(&self, idx: usize) -> Option<&[u8]> {
        match self.mandatory.get(idx) {
            Some(Parameter::OctetString(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// The first mandatory parameter as a C-octet string. Used to extract the
    /// asserted system_id from a peer's bind_transceiver.
    pub fn first_cstring_param(&self) -> Option<&str> {
        self.cstring_param(0)
    }

    /// bind_transceiver with interface_version 0x34 and an empty address range.
    pub fn bind_transceiver(
        sequence_number: u32,
        system_id: &str,
        password: &str,
        system_type: &str,
    ) -> Self {
        Self::new(
            CommandId::BindTransceiver,
            0,
            sequence_number,
            vec![
                Parameter::CString(system_id.to_string()),
                Parameter::CString(password.to_string()),
                Parameter::CString(system_type.to_string()),
                Parameter::Byte(0x34), // interface_version
                Parameter::Byte(0),    // addr_ton
                Parameter::Byte(0),    // addr_npi
                Parameter::CString(String::new()), // address_range
            ],
        )
    }

    pub fn bind_transceiver_resp(sequence_number: u32, system_id: &str) -> Self {
        Self::new(
            CommandId::BindTransceiverResp,
            0,
            sequence_number,
            vec![Parameter::CString(system_id.to_string())],
        )
    }

    pub fn enquire_link(sequence_number: u32) -> Self {
        Self::new(CommandId::EnquireLink, 0, sequence_number, Vec::new())
    }

    pub fn enquire_link_resp(sequence_number: u32) -> Self {
        Self::new(CommandId::EnquireLinkResp, 0, sequence_number, Vec::new())
    }

    pub fn unbind(sequence_number: u32) -> Self {
        Self::new(CommandId::Unbind, 0, sequence_number, Vec::new())
    }

    pub fn unbind_resp(sequence_number: u32) -> Self {
        Self::new(CommandId::UnbindResp, 0, sequence_number, Vec::new())
    }

    pub fn submit_sm_resp(sequence_number: u32, message_id: &str) -> Self {
        Self::new(
            CommandId::SubmitSmResp,
            0,
            sequence_number,
            vec![Parameter::CString(message_id.to_string())],
        )
    }

    /// submit_sm with the full 18-field SMPP 3.4 mandatory parameter list.
    /// `destination_addr` lands at index 6 and `short_message` at index 17,
    /// the positions the output generator reads back.
    pub fn submit_sm(
        sequence_number: u32,
        source_addr_npi: u8,
        source_addr: &str,
        dest_addr_npi: u8,
        destination_addr: &str,
        short_message: &[u8],
    ) -> Self {
        Self::new(
            CommandId::SubmitSm,
            0,
            sequence_number,
            vec![
                Parameter::CString(String::new()), // service_type
                Parameter::Byte(0),                // source_addr_ton
                Parameter::Byte(source_addr_npi),
                Parameter::CString(source_addr.to_string()),
                Parameter::Byte(0), // dest_addr_ton
                Parameter::Byte(dest_addr_npi),
                Parameter::CString(destination_addr.to_string()),
                Parameter::Byte(0),                // esm_class
                Parameter::Byte(0),                // protocol_id
                Parameter::Byte(0),                // priority_flag
                Parameter::CString(String::new()), // schedule_delivery_time
                Parameter::CString(String::new()), // validity_period
                Parameter::Byte(0),                // registered_delivery
                Parameter::Byte(0),                // replace_if_present_flag
                Parameter::Byte(0),                // data_coding
                Parameter::Byte(0),                // sm_default_msg_id
                Parameter::Byte(short_message.len() as u8),
                Parameter::OctetString(short_message.to_vec()),
            ],
        )
    }
}
