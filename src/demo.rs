//! Synthetic demo data
//!
//! This module produces plausible multi-day sample sequences for running
//! the pipeline without live hardware. Days are drawn from a small catalog
//! of named profiles that bias heart rate, SpO2, skin temperature, and step
//! accrual. The random source is injected, so seeded runs are fully
//! reproducible for scenario tests.

use chrono::{DateTime, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::DeviceSample;

/// Days of history the default demo dataset covers
pub const DEFAULT_DEMO_DAYS: usize = 10;

/// Simulated sampling cadence (one reading every 10 minutes)
const SAMPLE_INTERVAL_SECS: i64 = 600;
const SECS_PER_DAY: i64 = 86_400;
const SAMPLES_PER_DAY: i64 = SECS_PER_DAY / SAMPLE_INTERVAL_SECS;

/// Archetype biasing one simulated day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayProfile {
    /// Ordinary day: moderate activity, healthy vitals
    Balanced,
    /// Mostly sedentary day with low step accrual
    LowActivity,
    /// Elevated heart rate throughout the waking hours
    Stress,
    /// Depressed oxygen saturation readings
    LowOxygen,
    /// Skin temperature running warm all day
    ElevatedTemperature,
}

impl DayProfile {
    /// Every profile in the catalog
    pub const ALL: [DayProfile; 5] = [
        DayProfile::Balanced,
        DayProfile::LowActivity,
        DayProfile::Stress,
        DayProfile::LowOxygen,
        DayProfile::ElevatedTemperature,
    ];

    /// Non-balanced archetypes that a plan guarantees at least once
    const SPECIAL: [DayProfile; 4] = [
        DayProfile::LowActivity,
        DayProfile::Stress,
        DayProfile::LowOxygen,
        DayProfile::ElevatedTemperature,
    ];
}

/// Generator for synthetic sample sequences
pub struct DemoGenerator;

impl DemoGenerator {
    /// Generate `days` of samples at the 10-minute cadence, ending at `end`.
    ///
    /// The day plan guarantees each non-balanced archetype at least once
    /// when the day count allows, fills the remainder randomly, and
    /// shuffles day order.
    pub fn generate<R: Rng>(rng: &mut R, days: usize, end: DateTime<Utc>) -> Vec<DeviceSample> {
        let plan = Self::profile_plan(rng, days);
        Self::generate_with_plan(rng, &plan, end)
    }

    /// Generate samples for an explicit scripted day plan, ending at `end`
    pub fn generate_with_plan<R: Rng>(
        rng: &mut R,
        plan: &[DayProfile],
        end: DateTime<Utc>,
    ) -> Vec<DeviceSample> {
        let days = plan.len();
        let mut samples = Vec::with_capacity(days * SAMPLES_PER_DAY as usize + 1);

        for (day, profile) in plan.iter().enumerate() {
            let day_start = end.timestamp() - (days - day) as i64 * SECS_PER_DAY;
            // The sequence is inclusive of `end`, so the final day carries
            // one extra reading right at the boundary.
            let count = if day + 1 == days {
                SAMPLES_PER_DAY + 1
            } else {
                SAMPLES_PER_DAY
            };
            generate_day(rng, *profile, day_start, count, &mut samples);
        }

        samples
    }

    /// Build a day plan: every non-balanced archetype at least once (as far
    /// as `days` allows), the rest random, then shuffled.
    pub fn profile_plan<R: Rng>(rng: &mut R, days: usize) -> Vec<DayProfile> {
        let mut plan: Vec<DayProfile> = DayProfile::SPECIAL.iter().copied().take(days).collect();
        while plan.len() < days {
            let profile = DayProfile::ALL
                .choose(rng)
                .copied()
                .unwrap_or(DayProfile::Balanced);
            plan.push(profile);
        }
        plan.shuffle(rng);
        plan
    }
}

/// Waking-hours heart rate curve the noise is applied around
fn base_hr(hour: u32) -> f64 {
    match hour {
        0..=5 => 56.0,
        6..=9 => 72.0,
        10..=17 => 88.0,
        18..=21 => 82.0,
        _ => 62.0,
    }
}

fn generate_day<R: Rng>(
    rng: &mut R,
    profile: DayProfile,
    day_start: i64,
    count: i64,
    out: &mut Vec<DeviceSample>,
) {
    // The cumulative pedometer register resets at the day boundary.
    let mut steps: u32 = 0;

    for i in 0..count {
        let ts = day_start + i * SAMPLE_INTERVAL_SECS;
        let hour = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.hour())
            .unwrap_or(12);

        let hr_bias = match profile {
            DayProfile::Stress => 16.0,
            DayProfile::LowActivity => -6.0,
            _ => 0.0,
        };
        let hr_noise: f64 = rng.gen_range(-12.0..=12.0);
        let hr = (base_hr(hour) + hr_bias + hr_noise).clamp(45.0, 170.0) as u16;

        let spo2 = match profile {
            DayProfile::LowOxygen => {
                (rng.gen_range(89i32..=95) + rng.gen_range(-1i32..=1)).clamp(86, 98) as u8
            }
            _ => (rng.gen_range(95i32..=99) + rng.gen_range(-2i32..=2)).clamp(92, 100) as u8,
        };

        let temp_bias = match profile {
            DayProfile::ElevatedTemperature => 1.3,
            _ => 0.0,
        };
        let diurnal = (f64::from(hour) / 24.0 * std::f64::consts::TAU).sin() * 1.2;
        let temp_noise: f64 = rng.gen_range(-0.6..=0.6);
        let skin_temp_c = (33.0 + diurnal + temp_bias + temp_noise).clamp(29.0, 37.5);

        let active = (7..22).contains(&hour);
        let accrual: u32 = match (profile, active) {
            (_, false) => rng.gen_range(0..=8),
            (DayProfile::Balanced, true) => rng.gen_range(40..=200),
            (DayProfile::LowActivity, true) => rng.gen_range(0..=45),
            (DayProfile::Stress, true) => rng.gen_range(30..=160),
            (DayProfile::LowOxygen, true) => rng.gen_range(20..=140),
            (DayProfile::ElevatedTemperature, true) => rng.gen_range(20..=120),
        };
        steps = steps.saturating_add(accrual);

        out.push(DeviceSample {
            timestamp: ts as u32,
            hr,
            spo2,
            skin_temp_c,
            steps,
        });
    }
}
