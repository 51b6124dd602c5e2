//! Wire codec for negotiation messages.
//!
//! Messages travel as a sequence of self-delimiting JSON documents over any
//! duplex byte stream. The encoder writes one document per message followed
//! by a newline; the decoder needs no separator at all and only relies on
//! the JSON grammar to find document boundaries.

use bytes::{Buf, BytesMut};
use serde_json::Value;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::{CodecError, Result};
use crate::message::{limits, Decoded, Message};

const READ_CHUNK: usize = 4096;

/// Writes messages to a stream.
pub struct MessageEncoder<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encode and flush one message.
    pub async fn encode(&mut self, message: &Message) -> Result<()> {
        let mut bytes =
            serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))?;
        bytes.push(b'\n');

        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

/// Reads messages from a stream.
pub struct MessageDecoder<R> {
    reader: R,
    buf: BytesMut,
    max_document: usize,
}

impl<R: AsyncRead + Unpin> MessageDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            max_document: limits::MAX_DOCUMENT_BYTES,
        }
    }

    /// Override the maximum size of a single inbound document.
    pub fn with_max_document(mut self, max_document: usize) -> Self {
        self.max_document = max_document;
        self
    }

    /// Read the next message.
    ///
    /// Errors are fatal for the stream. Unknown or uninterpretable documents
    /// are returned as [`Decoded::Unrecognized`] / [`Decoded::Malformed`].
    pub async fn decode(&mut self) -> Result<Decoded> {
        let document = self.next_document().await?;
        Ok(Message::from_document(document))
    }

    /// Read the next generic JSON document.
    pub async fn next_document(&mut self) -> Result<Value> {
        loop {
            if let Some(document) = self.parse_buffered()? {
                return Ok(document);
            }

            if self.buf.len() > self.max_document {
                return Err(CodecError::DocumentTooLarge {
                    limit: self.max_document,
                });
            }

            self.buf.reserve(READ_CHUNK);
            let read = self.reader.read_buf(&mut self.buf).await?;
            if read == 0 {
                return if self.buf.iter().all(u8::is_ascii_whitespace) {
                    Err(CodecError::Closed)
                } else {
                    Err(CodecError::UnexpectedEof)
                };
            }
        }
    }

    /// Try to take one complete document off the front of the buffer.
    fn parse_buffered(&mut self) -> Result<Option<Value>> {
        let (document, consumed) = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
            match stream.next() {
                Some(Ok(document)) => (document, stream.byte_offset()),
                // Incomplete document, wait for more bytes
                Some(Err(e)) if e.is_eof() => return Ok(None),
                Some(Err(e)) => return Err(CodecError::Syntax(e.to_string())),
                None => {
                    self.buf.clear();
                    return Ok(None);
                }
            }
        };

        if consumed > self.max_document {
            return Err(CodecError::DocumentTooLarge {
                limit: self.max_document,
            });
        }

        self.buf.advance(consumed);
        Ok(Some(document))
    }
}

/// Split a duplex stream into a decoder/encoder pair.
pub fn message_pair<S>(stream: S) -> (MessageDecoder<ReadHalf<S>>, MessageEncoder<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, writer) = split(stream);
    (MessageDecoder::new(reader), MessageEncoder::new(writer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::duplex;

    fn decode_bytes(bytes: &[u8]) -> Vec<Result<Decoded>> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut decoder = MessageDecoder::new(bytes);
            let mut out = Vec::new();
            loop {
                let next = decoder.decode().await;
                let done = next.is_err();
                out.push(next);
                if done {
                    break;
                }
            }
            out
        })
    }

    #[tokio::test]
    async fn test_encode_then_decode_over_duplex() {
        let (a, b) = duplex(64);
        let (_, mut encoder) = message_pair(a);
        let (mut decoder, _) = message_pair(b);

        let sent = vec![
            Message::greeting(["alice", "bob"], 1_700_000_000_000_000_000),
            Message::kick("alice"),
            Message::Backoff,
        ];

        let writer = {
            let sent = sent.clone();
            tokio::spawn(async move {
                for msg in &sent {
                    encoder.encode(msg).await.unwrap();
                }
            })
        };

        for expected in sent {
            assert_eq!(decoder.decode().await.unwrap(), Decoded::Message(expected));
        }
        writer.await.unwrap();
    }

    #[test]
    fn test_documents_without_separator() {
        let results = decode_bytes(br#"{"type":"backoff"}{"type":"kick","id":"bob"}"#);

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Decoded::Message(Message::Backoff)
        );
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Decoded::Message(Message::kick("bob"))
        );
        assert!(matches!(results[2], Err(CodecError::Closed)));
    }

    #[test]
    fn test_unknown_type_does_not_break_stream() {
        let results = decode_bytes(b"{\"type\":\"ping\"}\n{\"type\":\"backoff\"}\n");

        assert_eq!(
            results[0].as_ref().unwrap(),
            &Decoded::Unrecognized("ping".into())
        );
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Decoded::Message(Message::Backoff)
        );
        assert!(results[2].as_ref().unwrap_err().is_closed());
    }

    #[test]
    fn test_truncated_document() {
        let results = decode_bytes(br#"{"type":"kick","id":"al"#);
        assert!(matches!(results[0], Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let results = decode_bytes(b"{\"type\":\"kick\"]\n{\"type\":\"backoff\"}");
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CodecError::Syntax(_))));
    }

    #[tokio::test]
    async fn test_document_too_large() {
        let mut doc = String::from(r#"{"type":"kick","id":""#);
        doc.push_str(&"x".repeat(256));
        doc.push_str("\"}");

        let mut decoder = MessageDecoder::new(doc.as_bytes()).with_max_document(64);
        assert!(matches!(
            decoder.decode().await,
            Err(CodecError::DocumentTooLarge { limit: 64 })
        ));
    }

    #[tokio::test]
    async fn test_write_to_closed_stream_fails() {
        let (a, b) = duplex(64);
        drop(b);

        let mut encoder = MessageEncoder::new(a);
        assert!(encoder.encode(&Message::Backoff).await.is_err());
    }

    proptest! {
        #[test]
        fn test_greeting_survives_codec(
            ids in prop::collection::btree_set("[a-z][a-z0-9_.-]{0,15}", 0..8),
            timestamp in any::<i64>(),
        ) {
            let msg = Message::greeting(ids, timestamp);
            let mut bytes = serde_json::to_vec(&msg).unwrap();
            bytes.push(b'\n');

            let results = decode_bytes(&bytes);
            prop_assert_eq!(results[0].as_ref().unwrap(), &Decoded::Message(msg));
        }
    }
}
