//! Caloric expenditure estimation
//!
//! Activity expenditure is regressed from per-epoch triaxial counts with a
//! gender-specific linear formula; epochs whose estimate comes out negative
//! contribute zero. The activity total rides on top of a Harris-Benedict
//! basal metabolic rate prorated over the recording duration.

use serde::{Deserialize, Serialize};

use crate::types::EpochSeries;

/// Subject gender, selecting the regression and BMR coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Subject biometrics, collected upstream of this crate
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub age_years: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub gender: Gender,
}

/// Expenditure breakdown for one recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyEstimate {
    /// Basal metabolic rate (kcal/day)
    pub bmr_kcal_per_day: f64,
    /// BMR share prorated over the recording duration (kcal)
    pub bmr_kcal: f64,
    /// Activity share from the triaxial regression (kcal)
    pub activity_kcal: f64,
    /// bmr_kcal + activity_kcal
    pub total_kcal: f64,
    /// Number of epochs that went into the estimate
    pub epochs: usize,
}

/// Estimator combining the triaxial regression with prorated BMR
pub struct EnergyEstimator;

impl EnergyEstimator {
    /// Estimate total expenditure for a recording of `recording_hours`
    pub fn estimate(
        series: &EpochSeries,
        profile: &SubjectProfile,
        recording_hours: f64,
    ) -> EnergyEstimate {
        let bmr_kcal_per_day = bmr_kcal_per_day(profile);
        let bmr_kcal = bmr_kcal_per_day / 24.0 * recording_hours;
        let activity_kcal = activity_kcal(series, profile);

        EnergyEstimate {
            bmr_kcal_per_day,
            bmr_kcal,
            activity_kcal,
            total_kcal: bmr_kcal + activity_kcal,
            epochs: series.len(),
        }
    }
}

/// Harris-Benedict basal metabolic rate in kcal/day
pub fn bmr_kcal_per_day(profile: &SubjectProfile) -> f64 {
    let SubjectProfile {
        age_years: a,
        height_cm: h,
        weight_kg: w,
        ..
    } = *profile;

    match profile.gender {
        Gender::Male => 88.362 + 13.397 * w + 4.799 * h - 5.677 * a,
        Gender::Female => 447.593 + 9.247 * w + 3.098 * h - 4.330 * a,
    }
}

/// Activity expenditure in kcal over all epochs.
///
/// Each epoch's kcal/min estimate is floored at zero, then the sum is divided
/// by four because epochs are quarter-minute buckets.
pub fn activity_kcal(series: &EpochSeries, profile: &SubjectProfile) -> f64 {
    let per_minute_sum: f64 = series
        .counts
        .iter()
        .map(|&count| epoch_kcal_per_min(count, profile).max(0.0))
        .sum();
    per_minute_sum / 4.0
}

fn epoch_kcal_per_min(count: f64, profile: &SubjectProfile) -> f64 {
    let a = profile.age_years;
    let w = profile.weight_kg;

    match profile.gender {
        Gender::Male => -106.59251 + 0.40825 * a + 0.35249 * w - 0.22485 * count,
        Gender::Female => -56.09672 + 0.38459 * a + 0.16541 * w - 0.16912 * count,
    }
}
