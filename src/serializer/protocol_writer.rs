//! Protocol to write a persistent binary version of a Fsm.

use std::io::Write;

/// Trait for writing binary data in some platform independent way.\
/// Mirrors [crate::serializer::protocol_reader::ProtocolReader] byte for byte; a value written
/// through one implementation of this trait must be readable by the matching `ProtocolReader`
/// implementation regardless of host OS or byte-order.
pub trait ProtocolWriter<W: Write> {
    /// Writes the protocol version, checked by the reader's `verify_version`.
    fn write_version(&mut self);

    /// Flushes and closes the underlying stream.
    fn close(&mut self);

    /// Writes a boolean.
    fn write_boolean(&mut self, value: bool);

    /// Writes an optional string.
    fn write_option_string(&mut self, value: &Option<String>);

    /// Writes a string.
    fn write_str(&mut self, value: &str);

    /// Writes a usize value. Implementations can assume the value is in u32 range.
    fn write_usize(&mut self, value: usize);

    /// Writes an unsigned value.
    fn write_uint(&mut self, value: u64);

    fn write_u8(&mut self, value: u8) {
        self.write_uint(value as u64)
    }

    fn write_u16(&mut self, value: u16) {
        self.write_uint(value as u64)
    }

    fn write_u32(&mut self, value: u32) {
        self.write_uint(value as u64)
    }

    fn has_error(&self) -> bool;
}
