use serde::Serialize;
use statrs::distribution::{Binomial, Discrete};

use super::Alternative;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinomialTest {
    pub successes: u64,
    pub trials: u64,
    pub null_proportion: f64,
    /// Successes expected under the null, `trials * null_proportion`.
    pub expected: f64,
    pub alternative: Alternative,
    pub p_value: f64,
}

/// Exact binomial test of `successes` out of `trials` against `p0`.
pub fn binom_test(successes: u64, trials: u64, p0: f64, alternative: Alternative) -> Result<BinomialTest> {
    super::require_observations("trials", trials as usize, 1)?;
    if successes > trials {
        return Err(AnalysisError::Degenerate {
            test: "binomial test",
            reason: format!("{} successes out of {} trials", successes, trials),
        });
    }
    let dist = Binomial::new(p0, trials)?;

    let p_value = match alternative {
        Alternative::Greater => (successes..=trials).map(|i| dist.pmf(i)).sum::<f64>(),
        Alternative::Less => (0..=successes).map(|i| dist.pmf(i)).sum::<f64>(),
        Alternative::TwoSided => {
            // outcomes no more likely than the observed one, with a relative tolerance
            let observed = dist.pmf(successes) * (1.0 + 1e-7);
            (0..=trials)
                .map(|i| dist.pmf(i))
                .filter(|&p| p <= observed)
                .sum::<f64>()
        }
    };

    Ok(BinomialTest {
        successes,
        trials,
        null_proportion: p0,
        expected: trials as f64 * p0,
        alternative,
        p_value: p_value.clamp(0.0, 1.0),
    })
}
