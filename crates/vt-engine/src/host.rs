//! Marshalling between host control buffers and engine frames.
//!
//! Hosts hand the engine parallel arrays of peak frequencies and linear
//! magnitudes, and expect parallel arrays of voice frequencies, magnitudes
//! and state codes back, one row per voice slot.

use vt_ir::{linear_to_db, MagnitudeScale, Peak, PeakFrame, VoiceFrame};

/// Refill `frame` from parallel frequency / linear-magnitude buffers.
///
/// Rows where either value is zero are treated as empty and skipped.
/// Magnitudes are converted to dB; the frame maximum is taken from the
/// accepted peaks (floored at `DB_FLOOR`). Returns the number of peaks kept.
pub fn fill_peak_frame(frame: &mut PeakFrame, frequencies: &[f32], magnitudes: &[f32]) -> usize {
    frame.clear();
    for (&freq, &mag) in frequencies.iter().zip(magnitudes) {
        if freq == 0.0 || mag == 0.0 {
            continue;
        }
        frame.push(Peak::new(freq, linear_to_db(mag)));
    }
    frame.len()
}

/// Write one row per voice slot into the host buffers.
///
/// Rows past the voice count are zeroed. Returns the number of voice rows
/// written.
pub fn write_voice_frame(
    voices: &VoiceFrame,
    frequencies: &mut [f32],
    magnitudes: &mut [f32],
    states: &mut [f32],
    scale: MagnitudeScale,
) -> usize {
    let rows = frequencies.len().min(magnitudes.len()).min(states.len());
    for row in 0..rows {
        match voices.get(row) {
            Some(voice) => {
                frequencies[row] = voice.frequency;
                magnitudes[row] = voice.magnitude(scale);
                states[row] = voice.state.code() as f32;
            }
            None => {
                frequencies[row] = 0.0;
                magnitudes[row] = 0.0;
                states[row] = 0.0;
            }
        }
    }
    voices.len().min(rows)
}
