//! Core types for the pulsekit pipeline
//!
//! This module defines the data structures that flow through the pipeline:
//! decoded firmware samples and the derived wellness snapshot.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Raw step value the firmware emits when the pedometer register glitches.
/// Normalized to 0 downstream of decoding.
pub const STEP_GLITCH_SENTINEL: u32 = 123;

/// One decoded firmware reading.
///
/// The timestamp is the device clock in epoch seconds and serves as the
/// unique key inside [`crate::store::SampleStore`]. The serde field names
/// match the on-disk cache layout and must not change without a new cache
/// file name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSample {
    /// Epoch seconds, device clock
    pub timestamp: u32,
    /// Heart rate (bpm), plausible range roughly 40-200
    pub hr: u16,
    /// Blood oxygen saturation (percent), plausible range roughly 70-100
    pub spo2: u8,
    /// Skin temperature in Celsius (raw int16 / 100 applied at decode)
    #[serde(rename = "temp")]
    pub skin_temp_c: f64,
    /// Cumulative step counter, raw (may carry the glitch sentinel)
    pub steps: u32,
}

impl DeviceSample {
    /// Step count with the firmware glitch sentinel filtered out
    pub fn normalized_steps(&self) -> u32 {
        if self.steps == STEP_GLITCH_SENTINEL {
            0
        } else {
            self.steps
        }
    }

    /// Device timestamp as a chrono instant
    pub fn datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(i64::from(self.timestamp), 0)
            .single()
            .unwrap_or_default()
    }

    /// Copy of this sample with the steps sentinel normalized
    pub fn sanitized(&self) -> DeviceSample {
        DeviceSample {
            steps: self.normalized_steps(),
            ..*self
        }
    }
}

/// Recovery phase band derived from the wellness score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    /// Score >= 80
    Regenerative,
    /// Score >= 60
    Calibrating,
    /// Score below 60
    RebootNeeded,
    /// Sentinel: not enough sample history to score
    NotConnected,
}

impl RecoveryPhase {
    /// Band for a computed score, evaluated high-to-low
    pub fn for_score(score: u8) -> Self {
        if score >= 80 {
            RecoveryPhase::Regenerative
        } else if score >= 60 {
            RecoveryPhase::Calibrating
        } else {
            RecoveryPhase::RebootNeeded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryPhase::Regenerative => "regenerative",
            RecoveryPhase::Calibrating => "calibrating",
            RecoveryPhase::RebootNeeded => "reboot needed",
            RecoveryPhase::NotConnected => "not connected",
        }
    }
}

/// Derived wellness state for a reference instant.
///
/// Recomputed on demand by [`crate::wellness::WellnessEngine`]; never
/// persisted. A `score` of 0 only appears on the unavailable sentinel -
/// computed scores are clamped to 20-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessSnapshot {
    /// Composite wellness score, clamped 20-100 (0 = unavailable)
    pub score: u8,
    /// Balance index score, clamped 30-95 (0 = unavailable)
    pub balance_score: u8,
    /// Categorical band for the score
    pub recovery_phase: RecoveryPhase,
    /// Highest-priority observation about the current state
    pub highlight: String,
    /// Short-horizon heart rate trend description
    pub trend: String,
    /// One-line summary of the overall state
    pub summary: String,
}

impl WellnessSnapshot {
    /// Sentinel returned when the trailing windows hold no samples.
    /// Callers must distinguish this from a genuinely low score.
    pub fn unavailable() -> Self {
        Self {
            score: 0,
            balance_score: 0,
            recovery_phase: RecoveryPhase::NotConnected,
            highlight: "Connect your device to start tracking.".to_string(),
            trend: "No recent data.".to_string(),
            summary: "Waiting for device data.".to_string(),
        }
    }

    /// True when this is the no-data sentinel rather than a computed score
    pub fn is_unavailable(&self) -> bool {
        self.recovery_phase == RecoveryPhase::NotConnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_glitch_sentinel_normalization() {
        let sample = DeviceSample {
            timestamp: 1_700_000_000,
            hr: 72,
            spo2: 97,
            skin_temp_c: 33.4,
            steps: STEP_GLITCH_SENTINEL,
        };
        assert_eq!(sample.normalized_steps(), 0);
        assert_eq!(sample.sanitized().steps, 0);

        let healthy = DeviceSample { steps: 124, ..sample };
        assert_eq!(healthy.normalized_steps(), 124);
    }

    #[test]
    fn test_serde_field_names_match_cache_layout() {
        let sample = DeviceSample {
            timestamp: 1_700_000_000,
            hr: 64,
            spo2: 98,
            skin_temp_c: 33.25,
            steps: 4200,
        };

        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000u32);
        assert_eq!(json["hr"], 64);
        assert_eq!(json["spo2"], 98);
        assert_eq!(json["temp"], 33.25);
        assert_eq!(json["steps"], 4200);
    }

    #[test]
    fn test_recovery_phase_thresholds() {
        assert_eq!(RecoveryPhase::for_score(100), RecoveryPhase::Regenerative);
        assert_eq!(RecoveryPhase::for_score(80), RecoveryPhase::Regenerative);
        assert_eq!(RecoveryPhase::for_score(79), RecoveryPhase::Calibrating);
        assert_eq!(RecoveryPhase::for_score(60), RecoveryPhase::Calibrating);
        assert_eq!(RecoveryPhase::for_score(59), RecoveryPhase::RebootNeeded);
        assert_eq!(RecoveryPhase::for_score(20), RecoveryPhase::RebootNeeded);
    }

    #[test]
    fn test_unavailable_sentinel() {
        let snapshot = WellnessSnapshot::unavailable();
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.recovery_phase, RecoveryPhase::NotConnected);
        assert!(snapshot.is_unavailable());
    }

    #[test]
    fn test_datetime_conversion() {
        let sample = DeviceSample {
            timestamp: 0,
            hr: 60,
            spo2: 97,
            skin_temp_c: 33.0,
            steps: 0,
        };
        assert_eq!(sample.datetime().timestamp(), 0);
    }
}
