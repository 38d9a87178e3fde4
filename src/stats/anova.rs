use std::fmt;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use super::{ensure_finite, mean, studentized_range, sum_of_squares};
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anova {
    pub statistic: f64,
    pub df_between: f64,
    pub df_within: f64,
    pub p_value: f64,
}

/// One-way analysis of variance over `groups`.
pub fn f_oneway(groups: &[&[f64]]) -> Result<Anova> {
    let k = groups.len();
    super::require_observations("groups", k, 2)?;
    let (ss_within, n_total) = within_group(groups);
    if n_total <= k {
        return Err(AnalysisError::InsufficientData {
            group: "all groups".to_string(),
            required: k + 1,
            actual: n_total,
        });
    }

    let all: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let grand = mean(&all).unwrap_or(f64::NAN);
    let ss_between: f64 = groups
        .iter()
        .map(|g| g.len() as f64 * (mean(g).unwrap_or(f64::NAN) - grand).powi(2))
        .sum();

    if ss_within == 0.0 {
        return Err(AnalysisError::Degenerate {
            test: "one-way ANOVA",
            reason: "all groups are constant".to_string(),
        });
    }

    let df_between = (k - 1) as f64;
    let df_within = (n_total - k) as f64;
    let statistic = ensure_finite(
        "one-way ANOVA",
        (ss_between / df_between) / (ss_within / df_within),
    )?;
    let p_value = f_sf(statistic, df_between, df_within)?;

    Ok(Anova {
        statistic,
        df_between,
        df_within,
        p_value,
    })
}

fn within_group(groups: &[&[f64]]) -> (f64, usize) {
    groups.iter().fold((0.0, 0), |(ss, n), g| {
        (ss + sum_of_squares(g, mean(g).unwrap_or(0.0)), n + g.len())
    })
}

/// Upper tail of the F distribution.
fn f_sf(f: f64, d1: f64, d2: f64) -> Result<f64> {
    if f <= 0.0 {
        return Ok(1.0);
    }
    let dist = FisherSnedecor::new(d1, d2)?;
    Ok(dist.sf(f).clamp(0.0, 1.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyPair {
    pub group1: String,
    pub group2: String,
    /// `mean(group2) - mean(group1)`
    pub meandiff: f64,
    pub p_adj: f64,
    pub lower: f64,
    pub upper: f64,
    pub reject: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyHsd {
    pub alpha: f64,
    pub df: f64,
    pub q_crit: f64,
    pub pairs: Vec<TukeyPair>,
}

impl TukeyHsd {
    pub fn any_reject(&self) -> bool {
        self.pairs.iter().any(|p| p.reject)
    }
}

/// Tukey's honestly significant difference over all pairs of `groups`,
/// using the pooled within-group variance.
pub fn tukey_hsd(groups: &[(&str, &[f64])], alpha: f64) -> Result<TukeyHsd> {
    let k = groups.len();
    super::require_observations("groups", k, 2)?;
    let samples: Vec<&[f64]> = groups.iter().map(|(_, g)| *g).collect();
    let (ss_within, n_total) = within_group(&samples);
    if n_total <= k {
        return Err(AnalysisError::InsufficientData {
            group: "all groups".to_string(),
            required: k + 1,
            actual: n_total,
        });
    }
    let df = (n_total - k) as f64;
    let mse = ss_within / df;
    if mse == 0.0 {
        return Err(AnalysisError::Degenerate {
            test: "Tukey HSD",
            reason: "all groups are constant".to_string(),
        });
    }
    let q_crit = studentized_range::quantile(1.0 - alpha, k, df);
    if !q_crit.is_finite() {
        return Err(AnalysisError::Degenerate {
            test: "Tukey HSD",
            reason: format!("no critical value for alpha {}", alpha),
        });
    }

    let means: Vec<f64> = samples
        .iter()
        .map(|g| mean(g).unwrap_or(f64::NAN))
        .collect();
    let mut pairs = Vec::with_capacity(k * (k - 1) / 2);
    for i in 0..k {
        for j in i + 1..k {
            let (ni, nj) = (samples[i].len() as f64, samples[j].len() as f64);
            let se = (mse / 2.0 * (1.0 / ni + 1.0 / nj)).sqrt();
            let meandiff = means[j] - means[i];
            let half_width = q_crit * se;
            pairs.push(TukeyPair {
                group1: groups[i].0.to_string(),
                group2: groups[j].0.to_string(),
                meandiff,
                p_adj: studentized_range::sf(meandiff.abs() / se, k, df),
                lower: meandiff - half_width,
                upper: meandiff + half_width,
                reject: meandiff.abs() > half_width,
            });
        }
    }

    Ok(TukeyHsd {
        alpha,
        df,
        q_crit,
        pairs,
    })
}

impl fmt::Display for TukeyHsd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Multiple Comparison of Means - Tukey HSD, FWER={:.2}",
            self.alpha
        )?;
        writeln!(
            f,
            "{:<18}{:<18}{:>10}{:>8}{:>10}{:>10}{:>8}",
            "group1", "group2", "meandiff", "p-adj", "lower", "upper", "reject"
        )?;
        for p in &self.pairs {
            writeln!(
                f,
                "{:<18}{:<18}{:>10.4}{:>8.4}{:>10.4}{:>10.4}{:>8}",
                p.group1, p.group2, p.meandiff, p.p_adj, p.lower, p.upper, p.reject
            )?;
        }
        Ok(())
    }
}
