use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChiSquaredTest {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    /// Counts expected under independence, same shape as the observed table.
    pub expected: Vec<Vec<f64>>,
    pub yates_correction: bool,
}

/// Pearson's chi-squared test of independence on an `r x c` table of counts.
///
/// With `correction`, Yates' continuity correction is applied when the
/// table has a single degree of freedom.
pub fn chi2_contingency(observed: &[Vec<u64>], correction: bool) -> Result<ChiSquaredTest> {
    let rows = observed.len();
    let cols = observed.first().map_or(0, Vec::len);
    if observed.iter().any(|row| row.len() != cols) {
        return Err(AnalysisError::Degenerate {
            test: "chi-squared test",
            reason: "ragged contingency table".to_string(),
        });
    }
    if rows < 2 || cols < 2 {
        return Err(AnalysisError::Degenerate {
            test: "chi-squared test",
            reason: format!("table is {}x{}, at least 2x2 required", rows, cols),
        });
    }

    let row_sums: Vec<f64> = observed
        .iter()
        .map(|row| row.iter().sum::<u64>() as f64)
        .collect();
    let col_sums: Vec<f64> = (0..cols)
        .map(|j| observed.iter().map(|row| row[j]).sum::<u64>() as f64)
        .collect();
    let total: f64 = row_sums.iter().sum();

    let expected: Vec<Vec<f64>> = row_sums
        .iter()
        .map(|r| col_sums.iter().map(|c| r * c / total).collect())
        .collect();
    if expected.iter().flatten().any(|&e| e <= 0.0 || e.is_nan()) {
        return Err(AnalysisError::Degenerate {
            test: "chi-squared test",
            reason: "a row or column of the table is empty".to_string(),
        });
    }

    let dof = (rows - 1) * (cols - 1);
    let yates_correction = correction && dof == 1;
    let mut statistic = 0.0;
    for (obs_row, exp_row) in observed.iter().zip(&expected) {
        for (&o, &e) in obs_row.iter().zip(exp_row) {
            let mut diff = o as f64 - e;
            if yates_correction {
                diff = diff.signum() * (diff.abs() - 0.5).max(0.0);
            }
            statistic += diff * diff / e;
        }
    }

    let p_value = if statistic > 0.0 {
        ChiSquared::new(dof as f64)?.sf(statistic).clamp(0.0, 1.0)
    } else {
        1.0
    };

    Ok(ChiSquaredTest {
        statistic,
        p_value,
        dof,
        expected,
        yates_correction,
    })
}
