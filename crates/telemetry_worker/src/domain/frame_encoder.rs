use crate::domain::{checksum, descramble_in_place, FrameRejection};

pub const SALE_PROTOCOL_VERSION: u8 = 0x01;

/// Build a wire frame from plaintext: append the checksum, then scramble
///
/// `plaintext` starts with the marker byte and excludes the checksum.
pub fn seal_frame(plaintext: &[u8], passkey: &[u8]) -> Result<Vec<u8>, FrameRejection> {
    let mut frame = Vec::with_capacity(plaintext.len() + 1);
    frame.extend_from_slice(plaintext);
    frame.push(checksum(plaintext));

    descramble_in_place(&mut frame, passkey)?;
    Ok(frame)
}

/// Plaintext of a sale frame
pub fn sale_plaintext(
    marker: u8,
    item_price_units: u32,
    item_number: u16,
    timestamp: u32,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(12);
    body.push(marker);
    body.push(SALE_PROTOCOL_VERSION);
    body.extend_from_slice(&item_price_units.to_be_bytes());
    body.extend_from_slice(&item_number.to_be_bytes());
    body.extend_from_slice(&timestamp.to_be_bytes());
    body
}
