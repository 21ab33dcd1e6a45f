//! Fixed frame layouts per event kind.
//!
//! Offsets are into the descrambled frame, big-endian:
//!
//! | kind         | bytes                                                       | min len |
//! |--------------|-------------------------------------------------------------|---------|
//! | `sale`       | `[1]` version, `[2..6]` price, `[6..8]` item, `[8..12]` ts  | 13      |
//! | `paxcounter` | `[8..12]` ts, `[12..14]` count                              | 15      |
//! | `status`     | whole payload as UTF-8 text                                 | 0       |
//!
//! The last byte of sale and paxcounter frames is the checksum.

use crate::domain::{EventKind, FrameRejection};
use bytes::Buf;

pub const SALE_FRAME_LEN: usize = 13;
pub const PAX_COUNTER_FRAME_LEN: usize = 15;

const TIMESTAMP_OFFSET: usize = 8;

/// Sale price is reported in cents
pub const PRICE_UNIT_SCALE: u32 = 1;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleFrame {
    /// Protocol version, logged but never validated
    pub version: u8,
    pub item_price_units: u32,
    pub item_number: u16,
    pub timestamp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaxCountFrame {
    pub timestamp: u32,
    pub count: u16,
}

/// Minimum length of a frame of `kind`, including marker and checksum bytes
pub fn min_frame_len(kind: EventKind) -> usize {
    match kind {
        EventKind::Sale => SALE_FRAME_LEN,
        EventKind::PaxCounter => PAX_COUNTER_FRAME_LEN,
        EventKind::Status => 0,
    }
}

fn ensure_len(frame: &[u8], expected: usize) -> Result<(), FrameRejection> {
    if frame.len() < expected {
        return Err(FrameRejection::FrameTooShort {
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Embedded timestamp of a sale or paxcounter frame
pub fn frame_timestamp(frame: &[u8]) -> Result<u32, FrameRejection> {
    ensure_len(frame, TIMESTAMP_OFFSET + 4)?;
    Ok((&frame[TIMESTAMP_OFFSET..]).get_u32())
}

pub fn extract_sale(frame: &[u8]) -> Result<SaleFrame, FrameRejection> {
    ensure_len(frame, SALE_FRAME_LEN)?;

    let mut cursor = &frame[1..];
    Ok(SaleFrame {
        version: cursor.get_u8(),
        item_price_units: cursor.get_u32(),
        item_number: cursor.get_u16(),
        timestamp: cursor.get_u32(),
    })
}

pub fn extract_pax_count(frame: &[u8]) -> Result<PaxCountFrame, FrameRejection> {
    ensure_len(frame, PAX_COUNTER_FRAME_LEN)?;

    let mut cursor = &frame[TIMESTAMP_OFFSET..];
    Ok(PaxCountFrame {
        timestamp: cursor.get_u32(),
        count: cursor.get_u16(),
    })
}

/// Status payloads are plain text; invalid UTF-8 is replaced, never rejected
pub fn extract_status(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sale_fields() {
        let frame = [
            0xA0, // marker
            0x01, // version
            0x00, 0x00, 0x00, 0xC8, // price 200
            0x00, 0x05, // item 5
            0x65, 0x53, 0xF1, 0x00, // ts 1700000000
            0x00, // checksum (not checked here)
        ];

        let sale = extract_sale(&frame).unwrap();

        assert_eq!(
            sale,
            SaleFrame {
                version: 1,
                item_price_units: 200,
                item_number: 5,
                timestamp: 1_700_000_000,
            }
        );
        assert_eq!(frame_timestamp(&frame).unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_extract_sale_too_short() {
        let result = extract_sale(&[0u8; 12]);

        assert_eq!(
            result,
            Err(FrameRejection::FrameTooShort {
                expected: 13,
                actual: 12
            })
        );
    }

    #[test]
    fn test_extract_pax_count_fields() {
        let mut frame = [0u8; PAX_COUNTER_FRAME_LEN];
        frame[8..12].copy_from_slice(&1_700_000_123u32.to_be_bytes());
        frame[12..14].copy_from_slice(&513u16.to_be_bytes());

        let pax = extract_pax_count(&frame).unwrap();

        assert_eq!(pax.timestamp, 1_700_000_123);
        assert_eq!(pax.count, 513);
    }

    #[test]
    fn test_extract_pax_count_too_short() {
        assert!(matches!(
            extract_pax_count(&[0u8; 14]),
            Err(FrameRejection::FrameTooShort {
                expected: 15,
                actual: 14
            })
        ));
    }

    #[test]
    fn test_extract_status_is_lossy() {
        assert_eq!(extract_status(b"online"), "online");
        assert_eq!(extract_status(&[0x6F, 0xFF, 0x6B]), "o\u{FFFD}k");
        assert_eq!(extract_status(&[]), "");
    }

    #[test]
    fn test_min_frame_len() {
        assert_eq!(min_frame_len(EventKind::Sale), 13);
        assert_eq!(min_frame_len(EventKind::PaxCounter), 15);
        assert_eq!(min_frame_len(EventKind::Status), 0);
    }
}
