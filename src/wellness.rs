//! Wellness scoring
//!
//! This module computes the composite wellness snapshot from the full
//! sample collection and a reference instant. The computation is a pure
//! function of its inputs: no state, no I/O, recomputed whenever a caller
//! asks.
//!
//! The engine refuses to score without history: if either the trailing
//! 6-hour or 24-hour window is empty it returns the unavailable sentinel
//! rather than a partially computed result.

use chrono::{DateTime, Utc};

use crate::types::{DeviceSample, RecoveryPhase, WellnessSnapshot};

/// Short trailing window: recent heart rate vs. the daily baseline
const SHORT_WINDOW_SECS: i64 = 6 * 3600;
/// Long trailing window: the daily baseline itself
const LONG_WINDOW_SECS: i64 = 24 * 3600;

/// Daily step goal the progress factor is measured against
pub const DAILY_STEP_GOAL: f64 = 10_000.0;
/// Skin temperature with peak suitability; the factor falls off
/// symmetrically over +-3 degrees
pub const IDEAL_SKIN_TEMP_C: f64 = 33.5;

/// Heart rate below this counts as "relaxed" for the balance index
const RELAXED_HR_BPM: u16 = 85;

/// Composite factor weights (step, spo2, temperature, HR stability)
const WEIGHT_STEPS: f64 = 40.0;
const WEIGHT_SPO2: f64 = 25.0;
const WEIGHT_TEMP: f64 = 15.0;
const WEIGHT_HR_STABILITY: f64 = 20.0;

/// Wellness engine: sample collection + reference instant in, snapshot out
pub struct WellnessEngine;

impl WellnessEngine {
    /// Compute the wellness snapshot for `reference`.
    ///
    /// Returns [`WellnessSnapshot::unavailable`] when either trailing
    /// window holds zero samples.
    pub fn compute(samples: &[DeviceSample], reference: DateTime<Utc>) -> WellnessSnapshot {
        let ref_ts = reference.timestamp();
        let window_6h = window(samples, ref_ts, SHORT_WINDOW_SECS);
        let window_24h = window(samples, ref_ts, LONG_WINDOW_SECS);

        if window_6h.is_empty() || window_24h.is_empty() {
            return WellnessSnapshot::unavailable();
        }

        let avg_hr_6h = mean(window_6h.iter().map(|s| f64::from(s.hr)));
        let avg_hr_24h = mean(window_24h.iter().map(|s| f64::from(s.hr)));
        let avg_spo2 = mean(window_24h.iter().map(|s| f64::from(s.spo2)));
        let avg_temp = mean(window_24h.iter().map(|s| s.skin_temp_c));

        // Negative delta = recent HR below the daily baseline (more relaxed).
        let hr_delta = avg_hr_6h - avg_hr_24h;

        let today_steps = f64::from(today_steps(&window_24h, reference));

        // Factor normalization to [0, 1].
        let spo2_norm = ((avg_spo2 - 92.0) / 8.0).clamp(0.0, 1.0);
        let temp_norm = (1.0 - (avg_temp - IDEAL_SKIN_TEMP_C).abs() / 3.0).clamp(0.0, 1.0);
        let hr_stability = (1.0 - hr_delta.abs() / 12.0).clamp(0.0, 1.0);
        // Headroom above the goal feeds the highlight rules but not the score.
        let step_ratio = (today_steps / DAILY_STEP_GOAL).min(1.2);
        let step_progress = step_ratio.clamp(0.0, 1.0);

        let raw_score = WEIGHT_STEPS * step_progress
            + WEIGHT_SPO2 * spo2_norm
            + WEIGHT_TEMP * temp_norm
            + WEIGHT_HR_STABILITY * hr_stability;
        let score = raw_score.clamp(20.0, 100.0).round() as u8;

        // Balance peaks when the day is neither all-stress nor all-rest.
        let relaxed_count = window_24h.iter().filter(|s| s.hr < RELAXED_HR_BPM).count();
        let relaxed_ratio = relaxed_count as f64 / window_24h.len() as f64;
        let centered = 2.0 * relaxed_ratio - 1.0;
        let balance_index = (1.0 - centered.abs()).clamp(0.0, 1.0);
        let balance_score = (100.0 * (0.6 * balance_index + 0.4 * step_progress))
            .clamp(30.0, 95.0)
            .round() as u8;

        let recovery_phase = RecoveryPhase::for_score(score);

        WellnessSnapshot {
            score,
            balance_score,
            recovery_phase,
            highlight: highlight(step_ratio, hr_delta, avg_spo2, temp_norm),
            trend: trend(hr_delta),
            summary: summary(recovery_phase, score),
        }
    }
}

/// Samples with timestamp in `[ref_ts - span, ref_ts]`, both bounds inclusive
fn window(samples: &[DeviceSample], ref_ts: i64, span: i64) -> Vec<&DeviceSample> {
    let start = ref_ts - span;
    samples
        .iter()
        .filter(|s| {
            let ts = i64::from(s.timestamp);
            ts >= start && ts <= ref_ts
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Today's step count: the most recent reading on the reference's calendar
/// day, falling back to the window's last sample when the day has no entry.
fn today_steps(window_24h: &[&DeviceSample], reference: DateTime<Utc>) -> u32 {
    let today = reference.date_naive();
    let same_day = window_24h
        .iter()
        .filter(|s| s.datetime().date_naive() == today)
        .max_by_key(|s| s.timestamp);

    same_day
        .or_else(|| window_24h.iter().max_by_key(|s| s.timestamp))
        .map(|s| s.normalized_steps())
        .unwrap_or(0)
}

/// Highlight selection: fixed priority chain, first match wins
fn highlight(step_ratio: f64, hr_delta: f64, avg_spo2: f64, temp_norm: f64) -> String {
    if step_ratio < 0.3 {
        "Activity is low so far. A short walk would move the needle.".to_string()
    } else if step_ratio > 0.95 {
        "Step goal reached. Great consistency today.".to_string()
    } else if hr_delta <= -5.0 {
        "Heart rate is well below your daily baseline. Recovery is kicking in.".to_string()
    } else if avg_spo2 >= 98.0 {
        "Oxygen saturation is high and stable.".to_string()
    } else if temp_norm < 0.55 {
        "Skin temperature is running off its comfort zone.".to_string()
    } else {
        "Steady signals. A few deep breaths keep it that way.".to_string()
    }
}

fn trend(hr_delta: f64) -> String {
    if hr_delta < -3.0 {
        "Heart rate trending down. You are winding down.".to_string()
    } else if hr_delta > 3.0 {
        "Heart rate elevated against your daily baseline. Plan some breaks.".to_string()
    } else {
        "Heart rate is stable.".to_string()
    }
}

fn summary(phase: RecoveryPhase, score: u8) -> String {
    match phase {
        RecoveryPhase::Regenerative => {
            format!("Score {score}. Your body is recovering well today.")
        }
        RecoveryPhase::Calibrating => {
            format!("Score {score}. Mixed signals, give yourself some slack.")
        }
        RecoveryPhase::RebootNeeded => {
            format!("Score {score}. Your body is asking for rest.")
        }
        RecoveryPhase::NotConnected => "Waiting for device data.".to_string(),
    }
}
