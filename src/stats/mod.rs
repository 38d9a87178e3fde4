//! Descriptive statistics and the hypothesis tests used by the analyses.

use std::cmp::Ordering;

use num::Float;
use serde::Serialize;

use crate::error::{AnalysisError, Result};

pub mod anova;
pub mod binomial;
pub mod chi2;
pub mod studentized_range;
pub mod ttest;

pub use anova::{f_oneway, tukey_hsd, Anova, TukeyHsd, TukeyPair};
pub use binomial::{binom_test, BinomialTest};
pub use chi2::{chi2_contingency, ChiSquaredTest};
pub use ttest::{ttest_1samp, ttest_1samp_greater, ttest_ind, OneSidedTTest, TTest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    TwoSided,
    Less,
    Greater,
}

pub fn mean<T: Float>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    let n = T::from(values.len())?;
    Some(values.iter().fold(T::zero(), |acc, &v| acc + v) / n)
}

pub fn median<T: Float>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        let two = T::one() + T::one();
        Some((sorted[mid - 1] + sorted[mid]) / two)
    } else {
        Some(sorted[mid])
    }
}

/// Sample variance (n - 1 denominator).
pub fn variance<T: Float>(values: &[T]) -> Option<T> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values
        .iter()
        .fold(T::zero(), |acc, &v| acc + (v - m) * (v - m));
    Some(ss / T::from(values.len() - 1)?)
}

pub fn sum_of_squares(values: &[f64], center: f64) -> f64 {
    values.iter().map(|v| (v - center).powi(2)).sum()
}

pub fn require_observations(group: &str, actual: usize, required: usize) -> Result<()> {
    if actual < required {
        return Err(AnalysisError::InsufficientData {
            group: group.to_string(),
            required,
            actual,
        });
    }
    Ok(())
}

pub(crate) fn ensure_finite(test: &'static str, statistic: f64) -> Result<f64> {
    if statistic.is_finite() {
        Ok(statistic)
    } else {
        Err(AnalysisError::Degenerate {
            test,
            reason: format!("statistic is {}", statistic),
        })
    }
}
