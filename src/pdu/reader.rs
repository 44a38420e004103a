//! Framed PDU reader over a byte stream.
//!
//! `extract_next` blocks until at least one complete PDU has been buffered,
//! then returns every complete PDU currently in the buffer. Trailing partial
//! bytes are retained for the next call. The reader is owned by a single
//! receive loop and is never shared.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::codec::{CodecError, HEADER_SIZE, MAX_PDU_SIZE};
use super::Pdu;

#[derive(Debug, Error)]
pub enum ReadError {
    /// Clean end-of-stream: the peer closed with no partial frame pending.
    #[error("peer closed the connection")]
    Closed,

    #[error("transport read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame decode failed: {0}")]
    Codec(#[from] CodecError),
}

pub struct PduStreamReader<R> {
    source: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> PduStreamReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Wait for the next batch of PDUs.
    ///
    /// Returns a non-empty `Vec` of every PDU fully present in the buffer.
    /// `ReadError::Closed` signals a clean end-of-stream; end-of-stream in
    /// the middle of a frame is an I/O error.
    pub async fn extract_next(&mut self) -> Result<Vec<Pdu>, ReadError> {
        loop {
            let pdus = self.drain_complete_frames()?;
            if !pdus.is_empty() {
                return Ok(pdus);
            }

            if 0 == self.source.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Err(ReadError::Closed);
                }
                return Err(ReadError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed mid-frame",
                )));
            }
        }
    }

    fn drain_complete_frames(&mut self) -> Result<Vec<Pdu>, ReadError> {
        let mut pdus = Vec::new();

        loop {
            if self.buffer.len() < 4 {
                break;
            }

            let length = u32::from_be_bytes([
                self.buffer[0],
                self.buffer[1],
                self.buffer[2],
                self.buffer[3],
            ]);

            if length < HEADER_SIZE as u32 || length > MAX_PDU_SIZE {
                return Err(ReadError::Codec(CodecError::InvalidLength {
                    length,
                    min: HEADER_SIZE as u32,
                    max: MAX_PDU_SIZE,
                }));
            }

            if self.buffer.len() < length as usize {
                break;
            }

            let pdu = Pdu::decode(&self.buffer[..length as usize])?;
            self.buffer.advance(length as usize);
            pdus.push(pdu);
        }

        Ok(pdus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn single_pdu_is_returned() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = PduStreamReader::new(rx);

        tx.write_all(&Pdu::enquire_link(5).encode()).await.unwrap();

        let pdus = reader.extract_next().await.unwrap();
        assert_eq!(pdus.len(), 1);
        assert_eq!(pdus[0].sequence_number, 5);
    }

    #[tokio::test]
    async fn batched_writes_come_back_in_one_call() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = PduStreamReader::new(rx);

        let mut bytes = Pdu::bind_transceiver_resp(1, "smsc01").encode().to_vec();
        bytes.extend_from_slice(&Pdu::enquire_link(9).encode());
        bytes.extend_from_slice(&Pdu::enquire_link(10).encode());
        tx.write_all(&bytes).await.unwrap();

        let pdus = reader.extract_next().await.unwrap();
        assert_eq!(pdus.len(), 3);
        assert_eq!(pdus[0].command_id, crate::pdu::CommandId::BindTransceiverResp);
        assert_eq!(pdus[1].sequence_number, 9);
        assert_eq!(pdus[2].sequence_number, 10);
    }

    #[tokio::test]
    async fn partial_frame_is_retained_across_reads() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = PduStreamReader::new(rx);

        let encoded = Pdu::submit_sm(3, 0, "", 0, "001100", b"hi").encode();
        let (head, tail) = encoded.split_at(10);

        tx.write_all(head).await.unwrap();
        tx.flush().await.unwrap();

        let tail = tail.to_vec();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            tx.write_all(&tail).await.unwrap();
            tx
        });

        let pdus = reader.extract_next().await.unwrap();
        assert_eq!(pdus.len(), 1);
        assert_eq!(pdus[0].sequence_number, 3);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn clean_close_yields_closed() {
        let (tx, rx) = tokio::io::duplex(1024);
        let mut reader = PduStreamReader::new(rx);
        drop(tx);

        assert!(matches!(
            reader.extract_next().await,
            Err(ReadError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_mid_frame_is_an_io_error() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = PduStreamReader::new(rx);

        let encoded = Pdu::enquire_link(1).encode();
        tx.write_all(&encoded[..7]).await.unwrap();
        drop(tx);

        assert!(matches!(reader.extract_next().await, Err(ReadError::Io(_))));
    }

    #[tokio::test]
    async fn bogus_length_is_a_codec_error() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = PduStreamReader::new(rx);

        tx.write_all(&3u32.to_be_bytes()).await.unwrap();

        assert!(matches!(
            reader.extract_next().await,
            Err(ReadError::Codec(CodecError::InvalidLength { length: 3, .. }))
        ));
    }
}
