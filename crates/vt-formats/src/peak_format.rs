//! `.vtpk` peak dumps: recorded analysis frames for offline replay.
//!
//! Little-endian layout:
//!
//! ```text
//! "VTPK" | version: u16 | frame_count: u32 | frame*
//! frame  = max_db: f32 | peak_count: u32 | (frequency: f32, db: f32) * peak_count
//! ```

use std::io::{Cursor, Write};

use binrw::{binrw, BinRead, BinWrite};
use vt_ir::{Peak, PeakFrame, MAX_PEAKS};

use crate::FormatError;

pub const FORMAT_VERSION: u16 = 1;

/// Smallest encoded frame: max + count.
const MIN_FRAME_BYTES: u64 = 8;

#[binrw]
#[brw(little, magic = b"VTPK")]
#[br(import(file_len: u64))]
struct PeakFile {
    version: u16,

    #[bw(calc = frames.len() as u32)]
    #[br(assert(frame_count as u64 * MIN_FRAME_BYTES <= file_len))]
    frame_count: u32,

    #[br(if(version == FORMAT_VERSION), count = frame_count)]
    frames: Vec<FrameRecord>,
}

#[binrw]
#[brw(little)]
struct FrameRecord {
    max_db: f32,

    #[bw(calc = peaks.len() as u32)]
    #[br(assert(peak_count as usize <= MAX_PEAKS))]
    peak_count: u32,

    #[br(count = peak_count)]
    peaks: Vec<PeakRecord>,
}

#[binrw]
#[brw(little)]
struct PeakRecord {
    frequency: f32,
    db: f32,
}

impl From<&FrameRecord> for PeakFrame {
    fn from(record: &FrameRecord) -> Self {
        let mut frame = PeakFrame::new();
        for p in &record.peaks {
            frame.push(Peak::new(p.frequency, p.db));
        }
        frame.set_max_log_magnitude(record.max_db);
        frame
    }
}

impl From<&PeakFrame> for FrameRecord {
    fn from(frame: &PeakFrame) -> Self {
        FrameRecord {
            max_db: frame.max_log_magnitude(),
            peaks: frame
                .peaks()
                .iter()
                .map(|p| PeakRecord { frequency: p.frequency, db: p.log_magnitude })
                .collect(),
        }
    }
}

/// Parse a peak dump. Invalid peaks inside a frame are dropped the same way
/// [`PeakFrame::push`] drops them.
pub fn load_peaks(data: &[u8]) -> Result<Vec<PeakFrame>, FormatError> {
    let mut cursor = Cursor::new(data);
    let file = PeakFile::read_args(&mut cursor, (data.len() as u64,)).map_err(classify)?;
    if file.version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(file.version));
    }
    Ok(file.frames.iter().map(PeakFrame::from).collect())
}

pub fn save_peaks(w: &mut impl Write, frames: &[PeakFrame]) -> Result<(), FormatError> {
    w.write_all(&peaks_to_bytes(frames)?)?;
    Ok(())
}

pub fn peaks_to_bytes(frames: &[PeakFrame]) -> Result<Vec<u8>, FormatError> {
    let file = PeakFile {
        version: FORMAT_VERSION,
        frames: frames.iter().map(FrameRecord::from).collect(),
    };
    let mut cursor = Cursor::new(Vec::new());
    file.write(&mut cursor).map_err(classify)?;
    Ok(cursor.into_inner())
}

fn classify(e: binrw::Error) -> FormatError {
    if e.is_eof() {
        return FormatError::UnexpectedEof;
    }
    match e {
        binrw::Error::Io(io) => FormatError::from(io),
        binrw::Error::Backtrace(bt) => classify(*bt.error),
        binrw::Error::BadMagic { .. } | binrw::Error::AssertFail { .. } => FormatError::InvalidHeader,
        other => FormatError::Io(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frames() -> Vec<PeakFrame> {
        let mut quiet = PeakFrame::new();
        quiet.set_max_log_magnitude(-3.0);
        vec![
            PeakFrame::from_peaks(&[Peak::new(440.0, -10.0), Peak::new(880.0, -20.0)]),
            quiet,
            PeakFrame::from_peaks(&[Peak::new(441.0, -11.0)]),
        ]
    }

    #[test]
    fn layout_matches_documented_format() {
        let bytes = peaks_to_bytes(&sample_frames()).unwrap();
        assert_eq!(&bytes[0..4], b"VTPK");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
        assert_eq!(u32::from_le_bytes(bytes[6..10].try_into().unwrap()), 3);
        // first frame: max, count, two peaks
        assert_eq!(f32::from_le_bytes(bytes[10..14].try_into().unwrap()), -10.0);
        assert_eq!(u32::from_le_bytes(bytes[14..18].try_into().unwrap()), 2);
        assert_eq!(f32::from_le_bytes(bytes[18..22].try_into().unwrap()), 440.0);
        assert_eq!(bytes.len(), 10 + (8 + 16) + 8 + (8 + 8));
    }

    #[test]
    fn reload_keeps_frames() {
        let frames = sample_frames();
        let loaded = load_peaks(&peaks_to_bytes(&frames).unwrap()).unwrap();
        assert_eq!(loaded, frames);
        assert_eq!(loaded[1].max_log_magnitude(), -3.0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = peaks_to_bytes(&sample_frames()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(load_peaks(&bytes), Err(FormatError::InvalidHeader)));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = peaks_to_bytes(&sample_frames()).unwrap();
        bytes[4] = 2;
        assert!(matches!(load_peaks(&bytes), Err(FormatError::UnsupportedVersion(2))));
    }

    #[test]
    fn truncated_file_is_eof() {
        let bytes = peaks_to_bytes(&sample_frames()).unwrap();
        assert!(matches!(load_peaks(&bytes[..bytes.len() - 3]), Err(FormatError::UnexpectedEof)));
        assert!(matches!(load_peaks(b"VTP"), Err(FormatError::UnexpectedEof)));
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let mut bytes = b"VTPK".to_vec();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(load_peaks(&bytes), Err(FormatError::InvalidHeader)));

        let mut bytes = b"VTPK".to_vec();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        bytes.extend_from_slice(&(MAX_PEAKS as u32 + 1).to_le_bytes());
        assert!(matches!(load_peaks(&bytes), Err(FormatError::InvalidHeader)));
    }

    #[test]
    fn invalid_peaks_are_dropped_on_load() {
        let mut bytes = b"VTPK".to_vec();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(-5.0f32).to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        for (f, db) in [(f32::NAN, -5.0f32), (300.0, -6.0)] {
            bytes.extend_from_slice(&f.to_le_bytes());
            bytes.extend_from_slice(&db.to_le_bytes());
        }
        let frames = load_peaks(&bytes).unwrap();
        assert_eq!(frames[0].len(), 1);
        assert_eq!(frames[0].peaks()[0].frequency, 300.0);
        assert_eq!(frames[0].max_log_magnitude(), -5.0);
    }
}
