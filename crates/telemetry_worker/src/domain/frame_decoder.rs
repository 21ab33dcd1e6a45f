use crate::domain::{
    check_freshness, descramble, extract_pax_count, extract_sale, extract_status, frame_timestamp,
    min_frame_len, verify_checksum, EventKind, FrameRejection, PaxCountFrame, SaleFrame,
};

/// Validated content of one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    Status(String),
    Sale(SaleFrame),
    PaxCount(PaxCountFrame),
}

/// Run one frame through the validation chain
///
/// Order: length, descramble, checksum, freshness, field extraction. The
/// descrambled copy is dropped before returning, whatever the outcome.
/// Status frames are plain text and skip every check; `passkey` is ignored
/// for them.
pub fn decode_frame(
    kind: EventKind,
    frame: &[u8],
    passkey: &[u8],
    now: i64,
) -> Result<DecodedFrame, FrameRejection> {
    match kind {
        EventKind::Status => Ok(DecodedFrame::Status(extract_status(frame))),
        EventKind::Sale => {
            let plain = open_sealed(kind, frame, passkey, now)?;
            extract_sale(&plain).map(DecodedFrame::Sale)
        }
        EventKind::PaxCounter => {
            let plain = open_sealed(kind, frame, passkey, now)?;
            extract_pax_count(&plain).map(DecodedFrame::PaxCount)
        }
    }
}

/// Descrambled copy of a sealed frame that passed length, checksum and freshness checks
fn open_sealed(
    kind: EventKind,
    frame: &[u8],
    passkey: &[u8],
    now: i64,
) -> Result<Vec<u8>, FrameRejection> {
    let expected = min_frame_len(kind);
    if frame.len() < expected {
        return Err(FrameRejection::FrameTooShort {
            expected,
            actual: frame.len(),
        });
    }

    let plain = descramble(frame, passkey)?;
    verify_checksum(&plain)?;
    check_freshness(i64::from(frame_timestamp(&plain)?), now)?;
    Ok(plain)
}
