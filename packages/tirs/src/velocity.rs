//! Action velocity tracking.
//!
//! Detects sudden spikes in an agent's action rate against an
//! exponentially-updated baseline. The baseline is updated after the ratio
//! is read so a single spike does not absorb itself.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration for velocity tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Sliding window size in seconds
    pub window_secs: i64,
    /// Initial baseline actions per minute
    pub baseline_per_minute: f64,
    /// Ratio at which the anomaly score saturates at 1.0
    pub spike_ratio: f64,
    /// EMA smoothing factor for baseline updates
    pub baseline_alpha: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            baseline_per_minute: 2.0,
            spike_ratio: 3.0,
            baseline_alpha: 0.1,
        }
    }
}

/// Metrics from one recorded action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityReading {
    /// Agent the reading belongs to
    pub agent_id: String,
    /// Current rate in actions per minute over the window
    pub current_rate: f64,
    /// Baseline rate before this action was absorbed
    pub baseline_rate: f64,
    /// current_rate / baseline_rate
    pub ratio: f64,
    /// Anomaly score in [0, 1]
    pub anomaly_score: f64,
    /// Actions currently inside the window
    pub actions_in_window: usize,
}

#[derive(Debug, Default)]
struct AgentWindow {
    timestamps: VecDeque<DateTime<Utc>>,
    baseline: f64,
}

/// Per-agent sliding-window action-rate tracker.
pub struct VelocityTracker {
    config: VelocityConfig,
    windows: Mutex<HashMap<String, AgentWindow>>,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(VelocityConfig::default())
    }
}

impl VelocityTracker {
    pub fn new(config: VelocityConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an action and return the resulting velocity metrics.
    pub fn record(&self, agent_id: &str, now: DateTime<Utc>) -> VelocityReading {
        let mut windows = self.windows.lock();
        let window = windows.entry(agent_id.to_string()).or_insert_with(|| AgentWindow {
            timestamps: VecDeque::new(),
            baseline: self.config.baseline_per_minute,
        });

        window.timestamps.push_back(now);

        let cutoff = now - Duration::seconds(self.config.window_secs);
        while window.timestamps.front().is_some_and(|t| *t < cutoff) {
            window.timestamps.pop_front();
        }

        let window_minutes = self.config.window_secs as f64 / 60.0;
        let current_rate = window.timestamps.len() as f64 / window_minutes;

        let baseline = window.baseline;
        let ratio = if baseline > 0.0 {
            current_rate / baseline
        } else {
            1.0
        };
        let anomaly_score = self.score_ratio(ratio);

        // Baseline absorbs the new rate only after the ratio is read.
        let alpha = self.config.baseline_alpha;
        window.baseline = alpha * current_rate + (1.0 - alpha) * baseline;

        VelocityReading {
            agent_id: agent_id.to_string(),
            current_rate,
            baseline_rate: baseline,
            ratio,
            anomaly_score,
            actions_in_window: window.timestamps.len(),
        }
    }

    /// Current anomaly score for an agent without recording an action.
    pub fn anomaly_score(&self, agent_id: &str, now: DateTime<Utc>) -> f64 {
        let windows = self.windows.lock();
        let Some(window) = windows.get(agent_id) else {
            return 0.0;
        };

        let cutoff = now - Duration::seconds(self.config.window_secs);
        let in_window = window.timestamps.iter().filter(|t| **t >= cutoff).count();
        if in_window == 0 || window.baseline <= 0.0 {
            return 0.0;
        }

        let window_minutes = self.config.window_secs as f64 / 60.0;
        let current_rate = in_window as f64 / window_minutes;
        self.score_ratio(current_rate / window.baseline)
    }

    /// Forget an agent's window (used on resurrection).
    pub fn reset(&self, agent_id: &str) {
        self.windows.lock().remove(agent_id);
    }

    fn score_ratio(&self, ratio: f64) -> f64 {
        if ratio <= 1.0 {
            0.0
        } else if ratio >= self.config.spike_ratio {
            1.0
        } else {
            (ratio - 1.0) / (self.config.spike_ratio - 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_actions_not_anomalous() {
        let tracker = VelocityTracker::default();
        let now = Utc::now();
        let reading = tracker.record("agent-1", now);
        assert_eq!(reading.anomaly_score, 0.0);
        assert_eq!(reading.actions_in_window, 1);
    }

    #[test]
    fn test_burst_scores_high() {
        let tracker = VelocityTracker::default();
        let now = Utc::now();

        let mut last = tracker.record("agent-1", now);
        for i in 1..40 {
            last = tracker.record("agent-1", now + Duration::seconds(i));
        }
        // 40 actions in ~40s against a 2/min baseline is a clear spike.
        assert!(last.ratio > 3.0, "ratio was {}", last.ratio);
        assert_eq!(last.anomaly_score, 1.0);
    }

    #[test]
    fn test_window_prunes_old_actions() {
        let tracker = VelocityTracker::default();
        let start = Utc::now();
        tracker.record("agent-1", start);
        tracker.record("agent-1", start + Duration::seconds(1));
        let reading = tracker.record("agent-1", start + Duration::seconds(400));
        assert_eq!(reading.actions_in_window, 1);
    }

    #[test]
    fn test_baseline_updates_after_ratio_read() {
        let config = VelocityConfig::default();
        let tracker = VelocityTracker::new(config.clone());
        let now = Utc::now();
        let reading = tracker.record("agent-1", now);
        // The first reading must be computed against the untouched baseline.
        assert_eq!(reading.baseline_rate, config.baseline_per_minute);
    }

    #[test]
    fn test_reset_clears_window() {
        let tracker = VelocityTracker::default();
        let now = Utc::now();
        for i in 0..20 {
            tracker.record("agent-1", now + Duration::seconds(i));
        }
        tracker.reset("agent-1");
        assert_eq!(tracker.anomaly_score("agent-1", now + Duration::seconds(21)), 0.0);
    }
}
