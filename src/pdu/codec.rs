//! Wire encoding and decoding for single PDUs.
//!
//! The 16-byte header carries command_length, command_id, command_status and
//! sequence_number, all big-endian. Mandatory parameter bodies are decoded
//! against a per-command layout table; any bytes remaining before
//! command_length is exhausted are retained as the optional-parameter tail.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

use super::{CommandId, Parameter, Pdu};

/// Size of the fixed PDU header.
pub const HEADER_SIZE: usize = 16;

/// Upper bound on command_length, to keep a misbehaving peer from forcing
/// unbounded buffering.
pub const MAX_PDU_SIZE: u32 = 65_536;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown command_id {0:#010x}")]
    UnknownCommandId(u32),

    #[error("invalid command_length {length}, must be {min}-{max}")]
    InvalidLength { length: u32, min: u32, max: u32 },

    #[error("truncated {command} body")]
    Truncated { command: &'static str },

    #[error("field {field} in {command} is not valid UTF-8")]
    Utf8 {
        command: &'static str,
        field: &'static str,
    },
}

/// Shape of one mandatory field in a PDU body.
#[derive(Debug, Clone, Copy)]
enum Field {
    Byte(&'static str),
    CString(&'static str),
    /// Counted octet string; the count is the immediately preceding Byte field.
    CountedBytes(&'static str),
}

fn body_layout(id: CommandId) -> &'static [Field] {
    use Field::*;
    match id {
        CommandId::BindTransceiver => &[
            CString("system_id"),
            CString("password"),
            CString("system_type"),
            Byte("interface_version"),
            Byte("addr_ton"),
            Byte("addr_npi"),
            CString("address_range"),
        ],
        CommandId::BindTransceiverResp => &[CString("system_id")],
        CommandId::SubmitSm => &[
            CString("service_type"),
            Byte("source_addr_ton"),
            Byte("source_addr_npi"),
            CString("source_addr"),
            Byte("dest_addr_ton"),
            Byte("dest_addr_npi"),
            CString("destination_addr"),
            Byte("esm_class"),
            Byte("protocol_id"),
            Byte("priority_flag"),
            CString("schedule_delivery_time"),
            CString("validity_period"),
            Byte("registered_delivery"),
            Byte("replace_if_present_flag"),
            Byte("data_coding"),
            Byte("sm_default_msg_id"),
            Byte("sm_length"),
            CountedBytes("short_message"),
        ],
        CommandId::SubmitSmResp => &[CString("message_id")],
        CommandId::EnquireLink
        | CommandId::EnquireLinkResp
        | CommandId::Unbind
        | CommandId::UnbindResp
        | CommandId::GenericNack => &[],
    }
}

impl Pdu {
    /// Encode the whole PDU, header included, with a correct command_length.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + 64);
        buf.put_u32(0); // patched below
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);

        for param in &self.mandatory {
            match param {
                Parameter::Byte(b) => buf.put_u8(*b),
                Parameter::CString(s) => {
                    buf.put_slice(s.as_bytes());
                    buf.put_u8(0);
                }
                Parameter::OctetString(bytes) => buf.put_slice(bytes),
            }
        }
        buf.put_slice(&self.optional_tail);

        let length = buf.len() as u32;
        buf[0..4].copy_from_slice(&length.to_be_bytes());
        buf.freeze()
    }

    /// Decode one complete PDU from `frame`, which must span exactly
    /// command_length bytes.
    pub fn decode(frame: &[u8]) -> Result<Pdu, CodecError> {
        let mut cursor = Cursor::new(frame);
        if cursor.remaining() < HEADER_SIZE {
            return Err(CodecError::InvalidLength {
                length: frame.len() as u32,
                min: HEADER_SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        let _command_length = cursor.get_u32();
        let raw_id = cursor.get_u32();
        let command_id =
            CommandId::from_u32(raw_id).ok_or(CodecError::UnknownCommandId(raw_id))?;
        let command_status = cursor.get_u32();
        let sequence_number = cursor.get_u32();

        let command = command_id.name();
        let mut mandatory = Vec::new();
        for field in body_layout(command_id) {
            match field {
                Field::Byte(_) => {
                    if cursor.remaining() < 1 {
                        return Err(CodecError::Truncated { command });
                    }
                    mandatory.push(Parameter::Byte(cursor.get_u8()));
                }
                Field::CString(name) => {
                    let s = read_cstring(&mut cursor, command, name)?;
                    mandatory.push(Parameter::CString(s));
                }
                Field::CountedBytes(_) => {
                    let count = match mandatory.last() {
                        Some(Parameter::Byte(n)) => *n as usize,
                        _ => 0,
                    };
                    if cursor.remaining() < count {
                        return Err(CodecError::Truncated { command });
                    }
                    let mut bytes = vec![0u8; count];
                    cursor.copy_to_slice(&mut bytes);
                    mandatory.push(Parameter::OctetString(bytes));
                }
            }
        }

        let optional_tail = Bytes::copy_from_slice(&frame[frame.len() - cursor.remaining()..]);

        Ok(Pdu {
            command_id,
            command_status,
            sequence_number,
            mandatory,
            optional_tail,
        })
    }
}

fn read_cstring(
    cursor: &mut Cursor<&[u8]>,
    command: &'static str,
    field: &'static str,
) -> Result<String, CodecError> {
    let start = cursor.position() as usize;
    let slice = &cursor.get_ref()[start..];
    let nul = slice
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::Truncated { command })?;
    let value = std::str::from_utf8(&slice[..nul])
        .map_err(|_| CodecError::Utf8 { command, field })?
        .to_string();
    cursor.set_position((start + nul + 1) as u64);
    Ok(value)
}
