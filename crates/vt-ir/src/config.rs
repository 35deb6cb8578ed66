//! Configuration surface for the tracker and the allocator.
//!
//! Configuration is validated when it is applied, never per frame. A host
//! that gets a `ConfigError` back can reject the setting before it reaches
//! the realtime path.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::voice::MAX_VOICES;

/// Continuity cost used to score a (trajectory, peak) pair.
///
/// Both methods normalize the frequency and magnitude deviations by the
/// configured maximum deviations and produce a match probability in
/// `[0, 1]`; the pair is accepted when the probability clears the
/// acceptance threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum MatchMethod {
    /// Weighted mean of absolute normalized deviations; probability = 1 - cost.
    #[default]
    Proximity,
    /// Gaussian likelihood of the weighted squared normalized deviations.
    Probability,
}

/// Order in which unclaimed trajectories compete for free voices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PriorityMode {
    #[default]
    LowestFrequencyFirst,
    LoudestFirst,
}

/// What the birth thresholds are measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ThresholdReference {
    /// Thresholds are absolute dB levels.
    #[default]
    Absolute,
    /// Thresholds are dB below the frame's maximum log-magnitude.
    FrameMax,
}

/// Partial tracker settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Peaks below this level are discarded (dB).
    pub birth_low_db: f32,
    /// Peaks at or above this level may start a new trajectory (dB).
    pub birth_high_db: f32,
    pub threshold_reference: ThresholdReference,
    /// Frames a trajectory must live before it is reported.
    pub min_track_length: u32,
    pub method: MatchMethod,
    pub frequency_weight: f32,
    pub magnitude_weight: f32,
    /// Minimum match probability for a pair to be accepted.
    pub acceptance: f32,
    /// Largest frequency jump a match may make (Hz).
    pub max_frequency_deviation: f32,
    /// Largest magnitude jump a match may make (dB).
    pub max_magnitude_deviation: f32,
    /// Missed frames tolerated before a trajectory dies.
    pub death_tolerance: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            birth_low_db: -60.0,
            birth_high_db: -24.0,
            threshold_reference: ThresholdReference::Absolute,
            min_track_length: 1,
            method: MatchMethod::Proximity,
            frequency_weight: 1.0,
            magnitude_weight: 1.0,
            acceptance: 0.5,
            max_frequency_deviation: 50.0,
            max_magnitude_deviation: 15.0,
            death_tolerance: 0,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_track_length < 1 {
            return Err(ConfigError::MinTrackLength(self.min_track_length));
        }
        if !self.birth_low_db.is_finite() {
            return Err(ConfigError::NonFinite("birth_low_db"));
        }
        if !self.birth_high_db.is_finite() {
            return Err(ConfigError::NonFinite("birth_high_db"));
        }
        if self.birth_low_db > self.birth_high_db {
            return Err(ConfigError::ThresholdOrder {
                low: self.birth_low_db,
                high: self.birth_high_db,
            });
        }
        if !(self.max_frequency_deviation.is_finite() && self.max_frequency_deviation > 0.0) {
            return Err(ConfigError::Deviation("max_frequency_deviation"));
        }
        if !(self.max_magnitude_deviation.is_finite() && self.max_magnitude_deviation > 0.0) {
            return Err(ConfigError::Deviation("max_magnitude_deviation"));
        }
        let weights = [self.frequency_weight, self.magnitude_weight];
        let total = weights.iter().sum::<f32>();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || !total.is_finite() || total <= 0.0 {
            return Err(ConfigError::Weights);
        }
        if !(0.0..=1.0).contains(&self.acceptance) {
            return Err(ConfigError::Acceptance(self.acceptance));
        }
        Ok(())
    }
}

/// Voice allocator settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AllocatorConfig {
    /// Number of voice slots, `1..=MAX_VOICES`.
    pub voice_count: usize,
    pub priority: PriorityMode,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            voice_count: 1,
            priority: PriorityMode::LowestFrequencyFirst,
        }
    }
}

impl AllocatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voice_count == 0 || self.voice_count > MAX_VOICES {
            return Err(ConfigError::VoiceCount(self.voice_count));
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub allocator: AllocatorConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.allocator.validate()
    }
}

/// Rejected configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    /// Voice count outside `1..=MAX_VOICES`.
    VoiceCount(usize),
    /// Minimum track length below one frame.
    MinTrackLength(u32),
    /// Birth-low threshold above birth-high.
    ThresholdOrder { low: f32, high: f32 },
    /// A threshold that must be finite is not.
    NonFinite(&'static str),
    /// A maximum deviation that is non-positive or non-finite.
    Deviation(&'static str),
    /// Continuity weights negative, non-finite, or all zero.
    Weights,
    /// Acceptance threshold outside `[0, 1]`.
    Acceptance(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::VoiceCount(n) => {
                write!(f, "voice count {} outside 1..={}", n, MAX_VOICES)
            }
            ConfigError::MinTrackLength(n) => {
                write!(f, "minimum track length {} must be at least 1", n)
            }
            ConfigError::ThresholdOrder { low, high } => {
                write!(f, "birth low threshold {} dB above birth high threshold {} dB", low, high)
            }
            ConfigError::NonFinite(name) => write!(f, "{} must be finite", name),
            ConfigError::Deviation(name) => write!(f, "{} must be positive and finite", name),
            ConfigError::Weights => {
                write!(f, "continuity weights must be finite, non-negative and not both zero")
            }
            ConfigError::Acceptance(p) => write!(f, "acceptance threshold {} outside [0, 1]", p),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let cfg = TrackerConfig {
            birth_low_db: -20.0,
            birth_high_db: -40.0,
            ..TrackerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ThresholdOrder { low: -20.0, high: -40.0 })
        );
    }

    #[test]
    fn equal_thresholds_are_allowed() {
        let cfg = TrackerConfig {
            birth_low_db: -30.0,
            birth_high_db: -30.0,
            ..TrackerConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_track_length() {
        let cfg = TrackerConfig {
            min_track_length: 0,
            ..TrackerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MinTrackLength(0)));
    }

    #[test]
    fn rejects_bad_deviation_weights_and_acceptance() {
        let base = TrackerConfig::default();
        let no_range = TrackerConfig { max_frequency_deviation: 0.0, ..base };
        assert!(matches!(no_range.validate(), Err(ConfigError::Deviation(_))));
        let nan_mag = TrackerConfig { max_magnitude_deviation: f32::NAN, ..base };
        assert!(matches!(nan_mag.validate(), Err(ConfigError::Deviation(_))));
        let zero_weights = TrackerConfig { frequency_weight: 0.0, magnitude_weight: 0.0, ..base };
        assert_eq!(zero_weights.validate(), Err(ConfigError::Weights));
        let negative = TrackerConfig { magnitude_weight: -1.0, ..base };
        assert_eq!(negative.validate(), Err(ConfigError::Weights));
        let overflow = TrackerConfig { frequency_weight: f32::MAX, magnitude_weight: f32::MAX, ..base };
        assert_eq!(overflow.validate(), Err(ConfigError::Weights));
        let too_sure = TrackerConfig { acceptance: 1.5, ..base };
        assert_eq!(too_sure.validate(), Err(ConfigError::Acceptance(1.5)));
        let nan_threshold = TrackerConfig { birth_high_db: f32::NAN, ..base };
        assert_eq!(nan_threshold.validate(), Err(ConfigError::NonFinite("birth_high_db")));
    }

    #[test]
    fn voice_count_bounds() {
        let zero = AllocatorConfig { voice_count: 0, ..AllocatorConfig::default() };
        assert_eq!(zero.validate(), Err(ConfigError::VoiceCount(0)));
        let max = AllocatorConfig { voice_count: MAX_VOICES, ..AllocatorConfig::default() };
        assert!(max.validate().is_ok());
        let over = AllocatorConfig { voice_count: MAX_VOICES + 1, ..AllocatorConfig::default() };
        assert_eq!(over.validate(), Err(ConfigError::VoiceCount(MAX_VOICES + 1)));
    }
}
