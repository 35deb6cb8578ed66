//! CSV export of voice frames, one row per (frame, slot).

use std::io::Write;

use vt_ir::{MagnitudeScale, VoiceFrame};

const HEADER: &str = "frame,slot,frequency,magnitude,state";

/// Streaming CSV writer. The header goes out with the first frame.
pub struct CsvWriter<W: Write> {
    inner: W,
    scale: MagnitudeScale,
    frame: usize,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(inner: W, scale: MagnitudeScale) -> Self {
        Self { inner, scale, frame: 0 }
    }

    pub fn write_frame(&mut self, voices: &VoiceFrame) -> std::io::Result<()> {
        if self.frame == 0 {
            writeln!(self.inner, "{}", HEADER)?;
        }
        for (slot, voice) in voices.iter().enumerate() {
            writeln!(
                self.inner,
                "{},{},{},{},{}",
                self.frame,
                slot,
                voice.frequency,
                voice.magnitude(self.scale),
                voice.state.code()
            )?;
        }
        self.frame += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frame
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> std::io::Result<W> {
        if self.frame == 0 {
            writeln!(self.inner, "{}", HEADER)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

pub fn write_csv(w: &mut impl Write, frames: &[VoiceFrame], scale: MagnitudeScale) -> std::io::Result<()> {
    let mut writer = CsvWriter::new(w, scale);
    for frame in frames {
        writer.write_frame(frame)?;
    }
    writer.finish()?;
    Ok(())
}
