use crate::domain::FrameRejection;

/// Wrapping 8-bit sum of `bytes`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Check the trailing checksum byte against every preceding byte
pub fn verify_checksum(frame: &[u8]) -> Result<(), FrameRejection> {
    let Some((&trailer, body)) = frame.split_last() else {
        return Err(FrameRejection::FrameTooShort {
            expected: 1,
            actual: 0,
        });
    };

    let computed = checksum(body);
    if computed != trailer {
        return Err(FrameRejection::ChecksumMismatch { computed, trailer });
    }

    Ok(())
}
