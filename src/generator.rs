//! # Signal Generator Module
//!
//! Produces synthetic heart readings from a patient profile. The profile's
//! simulate-flags select which rhythm is drawn; with no flag set the reading
//! follows the profile's baseline with bounded noise.
//!
//! ## Models
//! - Tachycardia: HR uniform in (100, 130), RR = 60 / HR exactly
//! - Bradycardia: HR uniform in (40, 60), RR = 60 / HR exactly
//! - Arrhythmia: HR = base ± 10, RR = base RR ± intensity-scaled fraction of itself
//! - Normal: HR = base ± variability, RR = 60 / HR ± RR variability

use rand::Rng;

use crate::reading::{Reading, MAX_NORMAL_HEART_RATE, MIN_NORMAL_HEART_RATE};

/// Width of the abnormal heart-rate bands above and below the normal range.
const TACHYCARDIA_SPAN: u32 = 30;
const BRADYCARDIA_SPAN: u32 = 20;

/// Maximum heart-rate offset while simulating arrhythmia.
const ARRHYTHMIA_HR_OFFSET: i64 = 10;

/// RR intervals are never emitted below this, whatever the noise draws.
const MIN_RR_INTERVAL: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct PatientProfile {
    /// Shown in session logs
    pub id: String,
    pub base_heart_rate: u32,
    /// Maximum absolute heart-rate offset in normal mode (BPM)
    pub heart_rate_variability: u32,
    /// Maximum absolute RR perturbation in normal mode (seconds)
    pub rr_variability: f64,
    pub simulate_tachycardia: bool,
    pub simulate_bradycardia: bool,
    pub simulate_arrhythmia: bool,
    /// Scales the RR deviation in arrhythmia mode, 0.0 to 1.0
    pub arrhythmia_intensity: f64,
}

impl Default for PatientProfile {
    fn default() -> Self {
        Self {
            id: "patient-1".to_string(),
            base_heart_rate: 75,
            heart_rate_variability: 5,
            rr_variability: 0.05,
            simulate_tachycardia: false,
            simulate_bradycardia: false,
            simulate_arrhythmia: false,
            arrhythmia_intensity: 0.3,
        }
    }
}

/// Draw one reading for the profile's active condition.
///
/// Only reads the clock for the timestamp; all randomness comes from `rng`.
pub fn generate<R: Rng>(profile: &PatientProfile, rng: &mut R) -> Reading {
    let (heart_rate, rr_interval) = if profile.simulate_tachycardia {
        let hr = rng.gen_range(MAX_NORMAL_HEART_RATE + 1..MAX_NORMAL_HEART_RATE + TACHYCARDIA_SPAN);
        (hr, 60.0 / hr as f64)
    } else if profile.simulate_bradycardia {
        let hr = rng.gen_range(MIN_NORMAL_HEART_RATE - BRADYCARDIA_SPAN + 1..MIN_NORMAL_HEART_RATE);
        (hr, 60.0 / hr as f64)
    } else if profile.simulate_arrhythmia {
        let offset = rng.gen_range(-ARRHYTHMIA_HR_OFFSET..=ARRHYTHMIA_HR_OFFSET);
        let hr = offset_heart_rate(profile.base_heart_rate, offset);
        let base_rr = 60.0 / hr as f64;
        let intensity = profile.arrhythmia_intensity.clamp(0.0, 1.0);
        let deviation = rng.gen_range(-1.0_f64..=1.0) * intensity * base_rr;
        (hr, base_rr + deviation)
    } else {
        let spread = profile.heart_rate_variability as i64;
        let offset = rng.gen_range(-spread..=spread);
        let hr = offset_heart_rate(profile.base_heart_rate, offset);
        let jitter = if profile.rr_variability > 0.0 {
            rng.gen_range(-profile.rr_variability..=profile.rr_variability)
        } else {
            0.0
        };
        (hr, 60.0 / hr as f64 + jitter)
    };

    Reading::new(heart_rate, rr_interval.max(MIN_RR_INTERVAL))
}

fn offset_heart_rate(base: u32, offset: i64) -> u32 {
    (base as i64 + offset).max(1) as u32
}
