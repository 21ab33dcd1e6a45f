//! Per-device frame obfuscation.
//!
//! Devices XOR the bytes following the marker byte with their passkey, one
//! passkey byte per frame byte and no wrap-around:
//!
//! ```text
//! frame[k + 1] ^= passkey[k]    for k in 0..passkey.len()
//! ```
//!
//! The marker byte and everything past the passkey span travel in clear.
//! XOR is its own inverse, so the same routine scrambles and descrambles.

use crate::domain::FrameRejection;

/// Marker byte plus trailing checksum byte, never covered by the passkey
const RESERVED_BYTES: usize = 2;

/// Descramble `frame` into a new buffer; the inbound bytes are left untouched
pub fn descramble(frame: &[u8], passkey: &[u8]) -> Result<Vec<u8>, FrameRejection> {
    let mut working = frame.to_vec();
    descramble_in_place(&mut working, passkey)?;
    Ok(working)
}

/// Apply the passkey to a buffer the caller owns
pub fn descramble_in_place(frame: &mut [u8], passkey: &[u8]) -> Result<(), FrameRejection> {
    if passkey.len() + RESERVED_BYTES > frame.len() {
        return Err(FrameRejection::FrameTooShort {
            expected: passkey.len() + RESERVED_BYTES,
            actual: frame.len(),
        });
    }

    for (byte, key) in frame[1..=passkey.len()].iter_mut().zip(passkey) {
        *byte ^= key;
    }

    Ok(())
}
