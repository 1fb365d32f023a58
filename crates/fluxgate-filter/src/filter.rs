//! Stateful similarity admission filter

use crate::similarity::{cosine_similarity, drop_weight, sharpened_score};
use crate::{FilterError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Configuration for the similarity filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Score above which a frame becomes a drop candidate
    pub threshold: f32,
    /// Exponent applied to the normalized similarity
    pub threshold_scale: f32,
    /// Lower bound on the norm product in cosine similarity
    pub eps: f32,
    /// Random seed (entropy when unset)
    pub seed: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: crate::DEFAULT_THRESHOLD,
            threshold_scale: crate::DEFAULT_THRESHOLD_SCALE,
            eps: crate::DEFAULT_EPS,
            seed: None,
        }
    }
}

impl FilterConfig {
    /// Builder-style threshold override
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder-style seed override
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if !self.threshold_scale.is_finite() || self.threshold_scale <= 0.0 {
            return Err(FilterError::InvalidThresholdScale(self.threshold_scale));
        }
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(FilterError::InvalidEpsilon(self.eps));
        }
        Ok(())
    }
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(FilterError::InvalidThreshold(threshold))
    }
}

/// Why a frame was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassReason {
    /// No previous frame to compare against
    FirstFrame,
    /// Representation length changed since the previous frame
    ShapeChanged,
    /// Score at or below threshold
    Distinct,
    /// Drop candidate admitted by the half-normal draw
    Escaped,
}

/// Decision for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Admission {
    /// Forward the frame to the engine
    Pass(PassReason),
    /// Frame is redundant with its predecessor
    Drop {
        /// Sharpened similarity score that triggered the drop
        score: f32,
    },
}

impl Admission {
    /// Whether the frame should be forwarded
    pub fn is_pass(&self) -> bool {
        matches!(self, Admission::Pass(_))
    }

    /// Whether the frame was rejected
    pub fn is_drop(&self) -> bool {
        matches!(self, Admission::Drop { .. })
    }
}

/// Filter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Frames evaluated
    pub evaluated: u64,
    /// Frames passed (including escapes)
    pub passed: u64,
    /// Frames dropped
    pub dropped: u64,
    /// Drop candidates that escaped
    pub escaped: u64,
}

impl FilterStats {
    /// Fraction of evaluated frames that were dropped
    pub fn drop_rate(&self) -> f32 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.dropped as f32 / self.evaluated as f32
        }
    }

    /// Fraction of drop candidates that escaped
    pub fn escape_rate(&self) -> f32 {
        let candidates = self.dropped + self.escaped;
        if candidates == 0 {
            0.0
        } else {
            self.escaped as f32 / candidates as f32
        }
    }
}

/// Similarity admission filter over consecutive frame representations.
///
/// Near-identical consecutive frames become drop candidates. Candidates are
/// admitted with a probability that decays as the score approaches 1, so a
/// static scene still refreshes occasionally instead of freezing.
///
/// The previous representation advances on every call, admitted or not:
/// the decision concerns the transition between consecutive frames.
///
/// # Example
///
/// ```
/// use fluxgate_filter::{FilterConfig, SimilarityFilter};
///
/// let mut filter = SimilarityFilter::new(FilterConfig::default().with_seed(7)).unwrap();
/// let frame = vec![0.25f32; 64];
///
/// assert!(filter.admit(&frame).is_pass());
/// ```
#[derive(Debug)]
pub struct SimilarityFilter<R = StdRng> {
    config: FilterConfig,
    previous: Option<Vec<f32>>,
    last_score: Option<f32>,
    stats: FilterStats,
    rng: R,
}

impl SimilarityFilter<StdRng> {
    /// Create a filter seeded from the config (entropy when no seed is set)
    pub fn new(config: FilterConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> SimilarityFilter<R> {
    /// Create a filter drawing from the given random source
    pub fn with_rng(config: FilterConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            previous: None,
            last_score: None,
            stats: FilterStats::default(),
            rng,
        })
    }

    /// Decide whether `repr` should be forwarded to the engine
    pub fn admit(&mut self, repr: &[f32]) -> Admission {
        self.stats.evaluated += 1;

        let previous = match self.previous.as_mut() {
            None => {
                self.previous = Some(repr.to_vec());
                self.last_score = None;
                return self.record(Admission::Pass(PassReason::FirstFrame));
            }
            Some(previous) => previous,
        };

        if previous.len() != repr.len() {
            trace!(
                previous = previous.len(),
                current = repr.len(),
                "representation shape changed"
            );
            previous.clear();
            previous.extend_from_slice(repr);
            self.last_score = None;
            return self.record(Admission::Pass(PassReason::ShapeChanged));
        }

        let similarity = cosine_similarity(previous.as_slice(), repr, self.config.eps);
        let score = sharpened_score(similarity, self.config.threshold_scale);

        previous.copy_from_slice(repr);
        self.last_score = Some(score);

        // Non-finite input gives a NaN score, which is never a drop candidate
        if score.is_nan() || score <= self.config.threshold {
            return self.record(Admission::Pass(PassReason::Distinct));
        }

        let sample: f64 = self.rng.sample::<f64, _>(StandardNormal).abs();
        let weight = drop_weight(score, self.config.threshold);

        let admission = if (weight as f64) < sample {
            Admission::Pass(PassReason::Escaped)
        } else {
            Admission::Drop { score }
        };

        trace!(score, weight, sample, ?admission, "drop candidate");
        self.record(admission)
    }

    fn record(&mut self, admission: Admission) -> Admission {
        match admission {
            Admission::Pass(PassReason::Escaped) => {
                self.stats.passed += 1;
                self.stats.escaped += 1;
            }
            Admission::Pass(_) => self.stats.passed += 1,
            Admission::Drop { .. } => self.stats.dropped += 1,
        }
        admission
    }

    /// Change the threshold without touching the previous representation
    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        validate_threshold(threshold)?;
        self.config.threshold = threshold;
        Ok(())
    }

    /// Current threshold
    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Current configuration
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Score of the most recent comparison, if one happened
    pub fn last_score(&self) -> Option<f32> {
        self.last_score
    }

    /// Whether a previous representation is held
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Forget the previous representation; the next frame passes
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_score = None;
    }

    /// Filter statistics
    pub fn stats(&self) -> FilterStats {
        self.stats
    }
}
