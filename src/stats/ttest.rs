use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{ensure_finite, mean, variance, Alternative};
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTest {
    pub statistic: f64,
    pub df: f64,
    pub p_value: f64,
    pub alternative: Alternative,
}

/// One-sample test against `popmean` under the alternative `mean > popmean`.
///
/// `halved_p_value` is the two-sided p-value divided by two. It equals the
/// one-sided p-value only when the sample mean is above the reference;
/// `mean_exceeds_reference` says whether that holds, and `p_value` is the
/// one-sided value that is correct on either side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneSidedTTest {
    pub statistic: f64,
    pub df: f64,
    pub two_sided_p_value: f64,
    pub halved_p_value: f64,
    pub p_value: f64,
    pub mean_exceeds_reference: bool,
}

fn check_len(n: usize) -> Result<()> {
    super::require_observations("sample", n, 2)
}

pub fn ttest_1samp(sample: &[f64], popmean: f64) -> Result<TTest> {
    check_len(sample.len())?;
    let n = sample.len() as f64;
    let m = mean(sample).unwrap_or(f64::NAN);
    let var = variance(sample).unwrap_or(f64::NAN);
    if var == 0.0 {
        return Err(AnalysisError::Degenerate {
            test: "one-sample t-test",
            reason: "sample has zero variance".to_string(),
        });
    }
    let statistic = ensure_finite("one-sample t-test", (m - popmean) / (var / n).sqrt())?;
    let df = n - 1.0;

    Ok(TTest {
        statistic,
        df,
        p_value: two_sided(statistic, df)?,
        alternative: Alternative::TwoSided,
    })
}

pub fn ttest_1samp_greater(sample: &[f64], popmean: f64) -> Result<OneSidedTTest> {
    let test = ttest_1samp(sample, popmean)?;
    let halved_p_value = test.p_value / 2.0;
    let mean_exceeds_reference = test.statistic > 0.0;
    let p_value = if mean_exceeds_reference {
        halved_p_value
    } else {
        1.0 - halved_p_value
    };

    Ok(OneSidedTTest {
        statistic: test.statistic,
        df: test.df,
        two_sided_p_value: test.p_value,
        halved_p_value,
        p_value,
        mean_exceeds_reference,
    })
}

/// Two-sided test for a difference in means of two independent samples.
/// Pooled variance when `equal_var`, Welch's correction otherwise.
pub fn ttest_ind(a: &[f64], b: &[f64], equal_var: bool) -> Result<TTest> {
    check_len(a.len())?;
    check_len(b.len())?;
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (ma, mb) = (mean(a).unwrap_or(f64::NAN), mean(b).unwrap_or(f64::NAN));
    let (va, vb) = (
        variance(a).unwrap_or(f64::NAN),
        variance(b).unwrap_or(f64::NAN),
    );

    let (se, df) = if equal_var {
        let df = na + nb - 2.0;
        let pooled = ((na - 1.0) * va + (nb - 1.0) * vb) / df;
        ((pooled * (1.0 / na + 1.0 / nb)).sqrt(), df)
    } else {
        let (sa, sb) = (va / na, vb / nb);
        let df = (sa + sb).powi(2) / (sa.powi(2) / (na - 1.0) + sb.powi(2) / (nb - 1.0));
        ((sa + sb).sqrt(), df)
    };
    if se == 0.0 {
        return Err(AnalysisError::Degenerate {
            test: "two-sample t-test",
            reason: "both samples have zero variance".to_string(),
        });
    }
    let statistic = ensure_finite("two-sample t-test", (ma - mb) / se)?;

    Ok(TTest {
        statistic,
        df,
        p_value: two_sided(statistic, df)?,
        alternative: Alternative::TwoSided,
    })
}

fn two_sided(statistic: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)?;
    Ok((2.0 * dist.sf(statistic.abs())).min(1.0))
}
