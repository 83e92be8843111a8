// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, PartialEq)]
pub enum PldmCodecError {
    BufferTooShort,
    Unsupported,
}

/// A trait for encoding and decoding PLDM (Platform Level Data Model) messages.
///
/// This trait provides methods for encoding a PLDM message into a byte buffer
/// and decoding a PLDM message from a byte buffer. Implementers of this trait
/// must also implement the `Debug` trait and be `Sized`.
pub trait PldmCodec: core::fmt::Debug + Sized {
    /// Encodes the PLDM message into the provided byte buffer.
    ///
    /// # Arguments
    ///
    /// * `buffer` - A mutable reference to a byte slice where the encoded message will be stored.
    ///
    /// # Returns
    ///
    /// A `Result` containing the size of the encoded message on success, or a `PldmCodecError` on failure.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError>;

    /// Decodes a PLDM message from the provided byte buffer.
    ///
    /// # Arguments
    ///
    /// * `buffer` - A reference to a byte slice containing the encoded message.
    ///
    /// # Returns
    ///
    /// A `Result` containing the decoded message on success, or a `PldmCodecError` on failure.
    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError>;
}

// Default implementation of PldmCodec for types that can leverage zerocopy.
impl<T> PldmCodec for T
where
    T: core::fmt::Debug + Sized + FromBytes + IntoBytes + Immutable,
{
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        self.write_to_prefix(buffer)
            .map_err(|_| PldmCodecError::BufferTooShort)
            .map(|_| core::mem::size_of::<T>())
    }

    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError> {
        Ok(Self::read_from_prefix(buffer)
            .map_err(|_| PldmCodecError::BufferTooShort)?
            .0)
    }
}

/// Messages whose wire body is a fixed-size zerocopy struct followed by a variable-length
/// tail (a version string, an opaque data blob) can't use the blanket `PldmCodec` impl above
/// since their Rust type isn't itself `FromBytes`. These helpers hold the offset bookkeeping
/// shared by that shape so each message only has to say what its tail is and how long it is.
pub fn encode_fixed_with_tail<F>(
    fixed: &F,
    tail: &[u8],
    buffer: &mut [u8],
) -> Result<usize, PldmCodecError>
where
    F: FromBytes + IntoBytes + Immutable,
{
    let fixed_len = core::mem::size_of::<F>();
    if buffer.len() < fixed_len + tail.len() {
        return Err(PldmCodecError::BufferTooShort);
    }
    fixed
        .write_to(&mut buffer[..fixed_len])
        .map_err(|_| PldmCodecError::BufferTooShort)?;
    buffer[fixed_len..fixed_len + tail.len()].copy_from_slice(tail);
    Ok(fixed_len + tail.len())
}

/// Reads the fixed portion of a tailed message off the front of `buffer` and returns it
/// alongside the byte offset its tail starts at.
pub fn decode_fixed<F>(buffer: &[u8]) -> Result<(F, usize), PldmCodecError>
where
    F: FromBytes + IntoBytes + Immutable,
{
    let fixed_len = core::mem::size_of::<F>();
    let fixed = F::read_from_bytes(buffer.get(..fixed_len).ok_or(PldmCodecError::BufferTooShort)?)
        .map_err(|_| PldmCodecError::BufferTooShort)?;
    Ok((fixed, fixed_len))
}

/// Implemented by every firmware-update response so callers can ask "did this work" without
/// hand-rolling a `== PldmBaseCompletionCode::Success as u8` check at every call site.
pub trait CompletionCode {
    fn completion_code(&self) -> u8;

    fn is_success(&self) -> bool {
        self.completion_code() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
    #[repr(C, packed)]
    struct Fixed {
        a: u8,
        b: u16,
    }

    #[test]
    fn fixed_with_tail_round_trips() {
        let fixed = Fixed { a: 7, b: 0x1234 };
        let tail = [1u8, 2, 3];
        let mut buffer = [0u8; 16];
        let written = encode_fixed_with_tail(&fixed, &tail, &mut buffer).unwrap();
        assert_eq!(written, core::mem::size_of::<Fixed>() + tail.len());

        let (decoded, offset): (Fixed, usize) = decode_fixed(&buffer).unwrap();
        assert_eq!(decoded, fixed);
        assert_eq!(&buffer[offset..offset + tail.len()], &tail);
    }

    #[test]
    fn fixed_with_tail_rejects_short_buffer() {
        let fixed = Fixed { a: 1, b: 2 };
        let mut buffer = [0u8; 2];
        assert_eq!(
            encode_fixed_with_tail(&fixed, &[0u8; 3], &mut buffer),
            Err(PldmCodecError::BufferTooShort)
        );
    }
}
