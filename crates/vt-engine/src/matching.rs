//! Frame-to-frame continuity cost.
//!
//! All matching policy lives here so the tracker's birth/death bookkeeping
//! never has to know which cost formula is in force.

use vt_ir::{MatchMethod, Peak, TrackerConfig, Trajectory};

/// Steepness of the `Probability` method: a pair sitting at the maximum
/// deviation on both axes scores `exp(-GAUSSIAN_K)`.
const GAUSSIAN_K: f32 = 2.0;

/// Scores (trajectory, peak) pairs for one tracker configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matcher {
    method: MatchMethod,
    /// Frequency weight normalized so the two weights sum to one.
    frequency_weight: f32,
    magnitude_weight: f32,
    acceptance: f32,
    max_frequency_deviation: f32,
    max_magnitude_deviation: f32,
}

impl Matcher {
    /// Build from a validated configuration.
    pub fn new(config: &TrackerConfig) -> Self {
        let total = config.frequency_weight + config.magnitude_weight;
        Self {
            method: config.method,
            frequency_weight: config.frequency_weight / total,
            magnitude_weight: config.magnitude_weight / total,
            acceptance: config.acceptance,
            max_frequency_deviation: config.max_frequency_deviation,
            max_magnitude_deviation: config.max_magnitude_deviation,
        }
    }

    /// Match probability in `[0, 1]`, or `None` when the pair falls outside
    /// the maximum deviation on either axis.
    pub fn probability(&self, trajectory: &Trajectory, peak: &Peak) -> Option<f32> {
        let df = (peak.frequency - trajectory.frequency).abs();
        let da = (peak.log_magnitude - trajectory.log_magnitude).abs();
        if df > self.max_frequency_deviation || da > self.max_magnitude_deviation {
            return None;
        }
        let df = df / self.max_frequency_deviation;
        let da = da / self.max_magnitude_deviation;
        let p = match self.method {
            MatchMethod::Proximity => {
                1.0 - (self.frequency_weight * df + self.magnitude_weight * da)
            }
            MatchMethod::Probability => {
                let d2 = self.frequency_weight * df * df + self.magnitude_weight * da * da;
                libm::expf(-GAUSSIAN_K * d2)
            }
        };
        Some(p.clamp(0.0, 1.0))
    }

    /// Cost of an accepted pair (lower is better), or `None` if the pair is
    /// out of range or its probability does not clear the acceptance
    /// threshold.
    pub fn cost(&self, trajectory: &Trajectory, peak: &Peak) -> Option<f32> {
        let p = self.probability(trajectory, peak)?;
        (p >= self.acceptance).then_some(1.0 - p)
    }
}
