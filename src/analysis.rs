//! The ordered list of questions asked of the labeled table, and the
//! findings each one produces.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::Result;
use crate::partition::{by_chest_pain, by_diagnosis, ContingencyTable, Subset};
use crate::records::{HeartDisease, Measure, PatientTable};
use crate::stats::{
    self, binom_test, chi2_contingency, f_oneway, require_observations, ttest_1samp_greater,
    ttest_ind, Alternative, Anova, BinomialTest, ChiSquaredTest, OneSidedTTest, TTest, TukeyHsd,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Significance level used when interpreting results and for Tukey's HSD.
    pub alpha: f64,
    /// Cholesterol level (mg/dl) considered high.
    pub chol_threshold: f64,
    /// Share of the population with fasting blood sugar above 120 mg/dl.
    pub fbs_rate: f64,
    /// Pooled-variance two-sample t-test; Welch's test when false.
    pub equal_var: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            alpha: 0.05,
            chol_threshold: 240.0,
            fbs_rate: 0.08,
            equal_var: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Analysis {
    CholesterolThreshold,
    FastingBloodSugarRate,
    MaxHeartRateByDiagnosis,
    CholesterolByDiagnosis,
    MaxHeartRateByChestPain,
    ChestPainAssociation,
}

impl Analysis {
    pub const ALL: [Analysis; 6] = [
        Analysis::CholesterolThreshold,
        Analysis::FastingBloodSugarRate,
        Analysis::MaxHeartRateByDiagnosis,
        Analysis::CholesterolByDiagnosis,
        Analysis::MaxHeartRateByChestPain,
        Analysis::ChestPainAssociation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Analysis::CholesterolThreshold => "cholesterol_threshold",
            Analysis::FastingBloodSugarRate => "fasting_blood_sugar_rate",
            Analysis::MaxHeartRateByDiagnosis => "max_heart_rate_by_diagnosis",
            Analysis::CholesterolByDiagnosis => "cholesterol_by_diagnosis",
            Analysis::MaxHeartRateByChestPain => "max_heart_rate_by_chest_pain",
            Analysis::ChestPainAssociation => "chest_pain_association",
        }
    }

    pub fn question(self) -> &'static str {
        match self {
            Analysis::CholesterolThreshold => {
                "Is the average cholesterol level above the high-cholesterol threshold?"
            }
            Analysis::FastingBloodSugarRate => {
                "Is the share of patients with high fasting blood sugar above the national rate?"
            }
            Analysis::MaxHeartRateByDiagnosis => {
                "Does maximum heart rate differ between patients with and without heart disease?"
            }
            Analysis::CholesterolByDiagnosis => {
                "Does cholesterol differ between patients with and without heart disease?"
            }
            Analysis::MaxHeartRateByChestPain => {
                "Does maximum heart rate differ across chest pain types?"
            }
            Analysis::ChestPainAssociation => {
                "Is chest pain type associated with a heart disease diagnosis?"
            }
        }
    }

    pub fn run(self, table: &PatientTable, config: &AnalysisConfig) -> Result<Finding> {
        debug!("Running {} over {} records", self.name(), table.len());
        match self {
            Analysis::CholesterolThreshold => cholesterol_threshold(table, config),
            Analysis::FastingBloodSugarRate => fasting_blood_sugar_rate(table, config),
            Analysis::MaxHeartRateByDiagnosis => two_sample(
                table,
                config,
                Measure::Thalach,
                HeartDisease::Absence,
                HeartDisease::Presence,
            ),
            Analysis::CholesterolByDiagnosis => two_sample(
                table,
                config,
                Measure::Chol,
                HeartDisease::Presence,
                HeartDisease::Absence,
            ),
            Analysis::MaxHeartRateByChestPain => chest_pain_anova(table, config),
            Analysis::ChestPainAssociation => chest_pain_association(table),
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Threshold(ThresholdFinding),
    Proportion(ProportionFinding),
    TwoSample(TwoSampleFinding),
    Anova(AnovaFinding),
    Association(AssociationFinding),
}

/// One-sample result for a single diagnosis group. A group too small for the
/// test keeps its error here so the other group still reports.
#[derive(Debug, Clone, Serialize)]
pub struct GroupThreshold {
    pub group: HeartDisease,
    pub n: usize,
    pub mean: Option<f64>,
    pub test: Option<OneSidedTTest>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdFinding {
    pub measure: Measure,
    pub reference: f64,
    pub groups: Vec<GroupThreshold>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProportionFinding {
    pub patients: usize,
    pub test: BinomialTest,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwoSampleFinding {
    pub measure: Measure,
    pub first: HeartDisease,
    pub second: HeartDisease,
    pub n_first: usize,
    pub n_second: usize,
    /// `mean(first) - mean(second)`
    pub mean_diff: f64,
    /// `median(first) - median(second)`, descriptive only
    pub median_diff: f64,
    pub equal_var: bool,
    pub test: TTest,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub n: usize,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnovaFinding {
    pub measure: Measure,
    pub groups: Vec<GroupSummary>,
    pub anova: Anova,
    pub tukey: TukeyHsd,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssociationFinding {
    pub table: ContingencyTable,
    pub test: ChiSquaredTest,
}

fn threshold_for(subset: &Subset<'_>, label: HeartDisease, reference: f64) -> GroupThreshold {
    let values = subset.values(Measure::Chol);
    let outcome = require_observations(&subset.name(), values.len(), 2)
        .and_then(|_| ttest_1samp_greater(&values, reference));
    let (test, error) = match outcome {
        Ok(test) => {
            if !test.mean_exceeds_reference {
                warn!(
                    "{} mean {} is not above {}, halving the two-sided p-value does not give the one-sided p-value",
                    subset.name(),
                    Measure::Chol,
                    reference
                );
            }
            (Some(test), None)
        }
        Err(e) => {
            warn!("One-sample test on {} skipped: {}", subset.name(), e);
            (None, Some(e.to_string()))
        }
    };

    GroupThreshold {
        group: label,
        n: values.len(),
        mean: stats::mean(&values),
        test,
        error,
    }
}

fn cholesterol_threshold(table: &PatientTable, config: &AnalysisConfig) -> Result<Finding> {
    let [absence, presence] = by_diagnosis(table);
    let groups = vec![
        threshold_for(&presence, HeartDisease::Presence, config.chol_threshold),
        threshold_for(&absence, HeartDisease::Absence, config.chol_threshold),
    ];

    Ok(Finding::Threshold(ThresholdFinding {
        measure: Measure::Chol,
        reference: config.chol_threshold,
        groups,
    }))
}

fn fasting_blood_sugar_rate(table: &PatientTable, config: &AnalysisConfig) -> Result<Finding> {
    let high = table.iter().filter(|r| r.fbs == Some(true)).count();
    let test = binom_test(
        high as u64,
        table.len() as u64,
        config.fbs_rate,
        Alternative::Greater,
    )?;

    Ok(Finding::Proportion(ProportionFinding {
        patients: table.len(),
        test,
    }))
}

fn two_sample(
    table: &PatientTable,
    config: &AnalysisConfig,
    measure: Measure,
    first: HeartDisease,
    second: HeartDisease,
) -> Result<Finding> {
    let [absence, presence] = by_diagnosis(table);
    let pick = |label| if label == HeartDisease::Absence { absence } else { presence };
    let (a, b) = (pick(first), pick(second));
    let (xs, ys) = (a.values(measure), b.values(measure));
    require_observations(&a.name(), xs.len(), 2)?;
    require_observations(&b.name(), ys.len(), 2)?;

    let mean_diff = stats::mean(&xs).unwrap_or(f64::NAN) - stats::mean(&ys).unwrap_or(f64::NAN);
    let median_diff =
        stats::median(&xs).unwrap_or(f64::NAN) - stats::median(&ys).unwrap_or(f64::NAN);
    let test = ttest_ind(&xs, &ys, config.equal_var)?;

    Ok(Finding::TwoSample(TwoSampleFinding {
        measure,
        first,
        second,
        n_first: xs.len(),
        n_second: ys.len(),
        mean_diff,
        median_diff,
        equal_var: config.equal_var,
        test,
    }))
}

fn chest_pain_anova(table: &PatientTable, config: &AnalysisConfig) -> Result<Finding> {
    let measure = Measure::Thalach;
    let samples: Vec<(String, Vec<f64>)> = by_chest_pain(table)
        .iter()
        .map(|subset| (subset.name(), subset.values(measure)))
        .filter(|(_, values)| !values.is_empty())
        .collect();
    for (name, values) in &samples {
        require_observations(name, values.len(), 2)?;
    }

    let groups: Vec<&[f64]> = samples.iter().map(|(_, v)| v.as_slice()).collect();
    let labeled: Vec<(&str, &[f64])> = samples
        .iter()
        .map(|(name, v)| (name.as_str(), v.as_slice()))
        .collect();
    let anova = f_oneway(&groups)?;
    let tukey = stats::tukey_hsd(&labeled, config.alpha)?;

    if (anova.p_value < config.alpha) != tukey.any_reject() {
        info!(
            "ANOVA p-value {:.4} and Tukey HSD disagree on whether any pair differs",
            anova.p_value
        );
    }

    Ok(Finding::Anova(AnovaFinding {
        measure,
        groups: samples
            .iter()
            .map(|(name, values)| GroupSummary {
                group: name.clone(),
                n: values.len(),
                mean: stats::mean(values),
            })
            .collect(),
        anova,
        tukey,
    }))
}

fn chest_pain_association(table: &PatientTable) -> Result<Finding> {
    let xtab = ContingencyTable::crosstab(table);
    let test = chi2_contingency(&xtab.counts, true)?;
    Ok(Finding::Association(AssociationFinding { table: xtab, test }))
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome {
    Completed(Finding),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis: Analysis,
    pub question: &'static str,
    pub outcome: Outcome,
}

/// Run every analysis on the blocking pool. Reports come back in list order;
/// a test that cannot be computed is reported as failed without stopping the
/// others.
pub async fn run_all(table: Arc<PatientTable>, config: &AnalysisConfig) -> Result<Vec<AnalysisReport>> {
    let handles: Vec<_> = Analysis::ALL
        .iter()
        .map(|&analysis| {
            let table = Arc::clone(&table);
            let config = config.clone();
            (
                analysis,
                tokio::task::spawn_blocking(move || analysis.run(&table, &config)),
            )
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (analysis, handle) in handles {
        let outcome = match handle.await? {
            Ok(finding) => Outcome::Completed(finding),
            Err(e) if !e.is_fatal() => {
                warn!("Analysis {} failed: {}", analysis, e);
                Outcome::Failed(e.to_string())
            }
            Err(e) => return Err(e),
        };
        reports.push(AnalysisReport {
            analysis,
            question: analysis.question(),
            outcome,
        });
    }
    info!("{} analyses finished", reports.len());
    Ok(reports)
}
