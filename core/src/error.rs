//! Errors produced while decoding persisted values.

/// A persisted value could not be decoded.
///
/// Decoding never returns a partial value: a truncated or corrupted stream always surfaces as one
/// of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input ended before the terminating byte of a value was read.
    #[error("unexpected end of stream")]
    UnexpectedEof,
    /// The encoded value does not fit the requested integer width.
    #[error("encoded value overflows a {bits}-bit integer")]
    Overflow {
        /// Width of the integer that was requested.
        bits: u32,
    },
}

#[cfg(feature = "std")]
impl From<DecodeError> for std::io::Error {
    fn from(err: DecodeError) -> Self {
        let kind = match err {
            DecodeError::UnexpectedEof => std::io::ErrorKind::UnexpectedEof,
            DecodeError::Overflow { .. } => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}
