use bytes::Bytes;
use embedded_io_async::{Read, Write};
use rand_core::RngCore;

use crate::{Connection, OpCode, error::Error};

/// A whole message: the payload of one text or binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text WebSocket message
    Text(String),
    /// A binary WebSocket message
    Binary(Bytes),
}

impl Message {
    /// Indicates whether a message is a text message.
    pub fn is_text(&self) -> bool {
        matches!(*self, Message::Text(_))
    }

    /// Indicates whether a message is a binary message.
    pub fn is_binary(&self) -> bool {
        matches!(*self, Message::Binary(_))
    }

    /// Returns the opcode the message is sent with.
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    /// Returns the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(payload) => payload.as_bytes(),
            Message::Binary(payload) => &payload[..],
        }
    }

    /// Get the length of the WebSocket message.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the WebSocket message has no content.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_owned())
    }
}

impl From<Bytes> for Message {
    fn from(payload: Bytes) -> Self {
        Message::Binary(payload)
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Message::Binary(Bytes::from(payload))
    }
}

fn text<I>(payload: Bytes) -> Result<String, Error<I>> {
    String::from_utf8(Vec::from(payload)).map_err(|_| Error::InvalidUtf8)
}

impl<R, W, Rng> Connection<R, W, Rng>
where
    R: Read,
    W: Write<Error = R::Error>,
    Rng: RngCore,
{
    /// Reads the payload of the next frame, whatever its opcode.
    pub async fn read_message(&self) -> Result<Bytes, Error<R::Error>> {
        let mut frame = self.read_frame().await?;

        Ok(frame.take_payload())
    }

    /// Sends `payload` as a binary frame.
    pub async fn write_message(&self, payload: &[u8]) -> Result<(), Error<R::Error>> {
        self.write_frame(OpCode::Binary, payload).await
    }

    /// Reads the payload of the next frame as UTF-8 text, whatever its opcode.
    pub async fn read_text(&self) -> Result<String, Error<R::Error>> {
        text(self.read_message().await?)
    }

    /// Sends `text` as a text frame.
    pub async fn write_text(&self, text: &str) -> Result<(), Error<R::Error>> {
        self.write_frame(OpCode::Text, text.as_bytes()).await
    }

    /// Reads the next frame as a [`Message`].
    ///
    /// Continuation frames are returned as binary. Any other non-data frame is
    /// consumed and reported as [`Error::Unsupported`]; the connection stays usable.
    pub async fn read_msg(&self) -> Result<Message, Error<R::Error>> {
        let mut frame = self.read_frame().await?;

        match frame.opcode() {
            OpCode::Text => text(frame.take_payload()).map(Message::Text),
            OpCode::Binary | OpCode::Continuation => Ok(Message::Binary(frame.take_payload())),
            opcode => Err(Error::Unsupported { opcode }),
        }
    }

    /// Sends a [`Message`] with its opcode.
    pub async fn write_msg(&self, message: &Message) -> Result<(), Error<R::Error>> {
        self.write_frame(message.opcode(), message.as_bytes()).await
    }
}
