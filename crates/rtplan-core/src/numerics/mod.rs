use crate::common::constants::FULL_CIRCLE_DEG;

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn stable_weighted_sum(values: &[f64], weights: &[f64]) -> Option<f64> {
    if values.len() != weights.len() {
        return None;
    }

    let mut sum = 0.0;
    let mut correction = 0.0;
    for (&value, &weight) in values.iter().zip(weights) {
        kahan_add(&mut sum, &mut correction, value * weight);
    }

    Some(sum)
}

pub fn stable_weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    if values.len() != weights.len() {
        return None;
    }

    let total_weight = stable_sum(weights);
    if total_weight == 0.0 {
        return None;
    }

    let weighted_sum = stable_weighted_sum(values, weights)?;
    Some(weighted_sum / total_weight)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

/// Weighted mean that degrades to the plain mean when every weight is zero.
pub fn weighted_mean_or_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    stable_weighted_mean(values, weights).or_else(|| mean(values))
}

/// Mean of `|v[i] - v[i-1]|`; needs at least two samples.
pub fn mean_abs_first_difference(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let differences: Vec<f64> = values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();
    mean(&differences)
}

/// Population coefficient of variation, `None` for a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let average = mean(values)?;
    if average <= 0.0 {
        return None;
    }

    let squared: Vec<f64> = values
        .iter()
        .map(|value| (value - average) * (value - average))
        .collect();
    let variance = stable_sum(&squared) / values.len() as f64;
    Some(variance.sqrt() / average)
}

/// Unsigned rotation between two angles, taking the short way round.
pub fn angular_distance_deg(from: f64, to: f64) -> f64 {
    let difference = (to - from).rem_euclid(FULL_CIRCLE_DEG);
    difference.min(FULL_CIRCLE_DEG - difference)
}

pub fn ratio_or(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() {
        numerator / denominator
    } else {
        fallback
    }
}

/// Running compensated sums of `value * weight` and `weight`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedAccumulator {
    weighted: f64,
    weighted_correction: f64,
    weight: f64,
    weight_correction: f64,
    plain: f64,
    plain_correction: f64,
    count: usize,
}

impl WeightedAccumulator {
    pub fn push(&mut self, value: f64, weight: f64) {
        kahan_add(&mut self.weighted, &mut self.weighted_correction, value * weight);
        kahan_add(&mut self.weight, &mut self.weight_correction, weight);
        kahan_add(&mut self.plain, &mut self.plain_correction, value);
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total_weight(&self) -> f64 {
        self.weight
    }

    pub fn weighted_mean(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.weighted / self.weight)
    }

    /// Weighted mean, or the unweighted mean if no weight was accumulated.
    pub fn mean_or_unweighted(&self) -> Option<f64> {
        self.weighted_mean()
            .or_else(|| (self.count > 0).then(|| self.plain / self.count as f64))
    }
}
