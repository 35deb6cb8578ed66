//! Spectral peaks: the per-frame input to the tracker.

use arrayvec::ArrayVec;

use crate::db::DB_FLOOR;

/// Maximum number of peaks accepted in one frame. Extra peaks are dropped.
pub const MAX_PEAKS: usize = 256;

/// A candidate spectral peak. Has no identity; lives for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Peak {
    /// Frequency in Hz.
    pub frequency: f32,
    /// Log-magnitude in dB.
    pub log_magnitude: f32,
}

impl Peak {
    pub const fn new(frequency: f32, log_magnitude: f32) -> Self {
        Self {
            frequency,
            log_magnitude,
        }
    }

    /// Sanitize a raw peak: non-finite or non-positive frequencies and
    /// NaN magnitudes are rejected; magnitudes are clamped to `DB_FLOOR`.
    pub fn sanitized(self) -> Option<Self> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.log_magnitude.is_nan() {
            return None;
        }
        // +inf dB is a detector bug; pin it rather than poison the cost math
        let log_magnitude = self.log_magnitude.clamp(DB_FLOOR, f32::MAX);
        Some(Self::new(self.frequency, log_magnitude))
    }
}

/// One analysis frame worth of peaks plus the frame's maximum log-magnitude.
///
/// Peaks keep their input order, which is the order the tracker matches them
/// in. Every stored peak has passed [`Peak::sanitized`].
#[derive(Clone, Debug, PartialEq)]
pub struct PeakFrame {
    peaks: ArrayVec<Peak, MAX_PEAKS>,
    max_log_magnitude: f32,
}

impl PeakFrame {
    /// Create an empty frame (maximum at `DB_FLOOR`).
    pub fn new() -> Self {
        Self {
            peaks: ArrayVec::new(),
            max_log_magnitude: DB_FLOOR,
        }
    }

    /// Build a frame from a slice, dropping invalid peaks and any beyond
    /// `MAX_PEAKS`.
    pub fn from_peaks(peaks: &[Peak]) -> Self {
        let mut frame = Self::new();
        for &peak in peaks {
            frame.push(peak);
        }
        frame
    }

    /// Append a peak. Returns `false` if it was invalid or the frame is full.
    ///
    /// The frame maximum is raised to cover the peak.
    pub fn push(&mut self, peak: Peak) -> bool {
        let Some(peak) = peak.sanitized() else {
            return false;
        };
        if self.peaks.try_push(peak).is_err() {
            return false;
        }
        if peak.log_magnitude > self.max_log_magnitude {
            self.max_log_magnitude = peak.log_magnitude;
        }
        true
    }

    /// Override the frame maximum with the value reported by the peak
    /// source (e.g. the true spectral maximum). Non-finite values are
    /// ignored; the result never sits below the loudest stored peak.
    pub fn set_max_log_magnitude(&mut self, max: f32) {
        if !max.is_finite() {
            return;
        }
        let loudest = self
            .peaks
            .iter()
            .map(|p| p.log_magnitude)
            .fold(DB_FLOOR, f32::max);
        self.max_log_magnitude = max.max(loudest).max(DB_FLOOR);
    }

    /// Remove all peaks and reset the maximum.
    pub fn clear(&mut self) {
        self.peaks.clear();
        self.max_log_magnitude = DB_FLOOR;
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn max_log_magnitude(&self) -> f32 {
        self.max_log_magnitude
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.peaks.is_full()
    }
}

impl Default for PeakFrame {
    fn default() -> Self {
        Self::new()
    }
}
