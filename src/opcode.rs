/// The 4-bit frame opcode.
///
/// Opcodes outside the RFC 6455 set are not rejected. They decode to
/// [`OpCode::Reserved`] and are handed to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OpCode {
    /// Continuation of a fragmented message (`0x0`).
    #[default]
    Continuation,
    /// UTF-8 text payload (`0x1`).
    Text,
    /// Binary payload (`0x2`).
    Binary,
    /// Connection close (`0x8`).
    Close,
    /// Ping (`0x9`).
    Ping,
    /// Pong (`0xA`).
    Pong,
    /// Any other value of the low 4 bits.
    Reserved(u8),
}

impl OpCode {
    /// Returns `true` for close, ping and pong.
    pub const fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Returns `true` for frames that carry application data.
    pub const fn is_data(&self) -> bool {
        matches!(
            self,
            OpCode::Continuation | OpCode::Text | OpCode::Binary
        )
    }
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        match value {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(other) => other & 0x0F,
        }
    }
}
