//! Temporal decay weighting.
//!
//! Older events contribute less to the current risk assessment. The decay
//! curve is configurable; exponential with a 30-minute half-life is the
//! default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shape of the decay curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayFunction {
    /// exp(-lambda * age)
    #[default]
    Exponential,
    /// Linear ramp down to zero at twice the half-life
    Linear,
    /// 1.0 inside one half-life, 0.5 inside two, 0.1 beyond
    Step,
    /// Logistic falloff centered on the half-life
    Sigmoid,
}

/// Configuration for temporal decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Decay curve shape
    pub function: DecayFunction,
    /// Half-life in minutes
    pub half_life_minutes: f64,
    /// Lower clamp on computed weights
    pub min_weight: f64,
    /// Upper clamp on computed weights
    pub max_weight: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            function: DecayFunction::Exponential,
            half_life_minutes: 30.0,
            min_weight: 0.1,
            max_weight: 1.0,
        }
    }
}

/// Applies time-based decay to timestamped scalars.
#[derive(Debug, Clone)]
pub struct TemporalDecay {
    config: DecayConfig,
    decay_constant: f64,
}

impl Default for TemporalDecay {
    fn default() -> Self {
        Self::new(DecayConfig::default())
    }
}

impl TemporalDecay {
    pub fn new(config: DecayConfig) -> Self {
        let decay_constant = std::f64::consts::LN_2 / (config.half_life_minutes * 60.0);
        Self {
            config,
            decay_constant,
        }
    }

    /// Weight of an event that occurred at `event_time`, seen from `now`.
    ///
    /// Returns a value in [min_weight, max_weight]. Future-dated events get
    /// the maximum weight.
    pub fn weight_at(&self, event_time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_seconds = (now - event_time).num_milliseconds() as f64 / 1000.0;
        if age_seconds <= 0.0 {
            return self.config.max_weight;
        }

        let half_life_seconds = self.config.half_life_minutes * 60.0;
        let weight = match self.config.function {
            DecayFunction::Exponential => (-self.decay_constant * age_seconds).exp(),
            DecayFunction::Linear => (1.0 - age_seconds / (2.0 * half_life_seconds)).max(0.0),
            DecayFunction::Step => {
                if age_seconds < half_life_seconds {
                    1.0
                } else if age_seconds < 2.0 * half_life_seconds {
                    0.5
                } else {
                    0.1
                }
            }
            DecayFunction::Sigmoid => {
                let x = (age_seconds - half_life_seconds) / (half_life_seconds / 4.0);
                1.0 / (1.0 + x.exp())
            }
        };

        weight.clamp(self.config.min_weight, self.config.max_weight)
    }

    /// Decay-weighted average of timestamped values.
    ///
    /// Empty input yields 0.0.
    pub fn apply(&self, values: &[(DateTime<Utc>, f64)], now: DateTime<Utc>) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for (timestamp, value) in values {
            let weight = self.weight_at(*timestamp, now);
            weighted_sum += weight * value;
            total_weight += weight;
        }

        if total_weight == 0.0 {
            return 0.0;
        }

        weighted_sum / total_weight
    }
}
