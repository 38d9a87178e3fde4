use std::fmt;
use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::analysis::{
    AnalysisReport, AnovaFinding, AssociationFinding, Finding, Outcome, ProportionFinding,
    ThresholdFinding, TwoSampleFinding,
};
use crate::error::Result;
use crate::pipeline::GroupMeans;
use crate::records::{Category, PatientRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub dataset_id: u32,
    pub patients: usize,
    pub alpha: f64,
    pub group_means: Vec<GroupMeans>,
    /// Leading rows of the Presence subset.
    pub presence_preview: Vec<PatientRecord>,
    pub analyses: Vec<AnalysisReport>,
}

impl Report {
    pub fn write<W: Write>(&self, format: ReportFormat, out: W) -> Result<()> {
        match format {
            ReportFormat::Text => write_text(self, out),
            ReportFormat::Json => write_json(self, out),
            ReportFormat::Csv => write_csv(self, out),
        }
    }
}

pub fn write_text<W: Write>(report: &Report, mut out: W) -> Result<()> {
    write!(out, "{}", report)?;
    Ok(())
}

pub fn write_json<W: Write>(report: &Report, out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, report)?;
    Ok(())
}

/// One row per reported p-value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub analysis: String,
    pub subject: String,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub note: String,
}

impl SummaryRow {
    fn new(report: &AnalysisReport, subject: impl Into<String>) -> Self {
        SummaryRow {
            analysis: report.analysis.name().to_string(),
            subject: subject.into(),
            statistic: None,
            p_value: None,
            note: String::new(),
        }
    }

    fn with_values(mut self, statistic: f64, p_value: f64) -> Self {
        self.statistic = Some(statistic);
        self.p_value = Some(p_value);
        self
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

pub fn summary_rows(report: &Report) -> Vec<SummaryRow> {
    let mut rows = Vec::new();
    for analysis in &report.analyses {
        match &analysis.outcome {
            Outcome::Failed(reason) => {
                rows.push(SummaryRow::new(analysis, "").with_note(reason.clone()))
            }
            Outcome::Completed(Finding::Threshold(f)) => {
                for group in &f.groups {
                    let row = SummaryRow::new(analysis, group.group.label());
                    rows.push(match (&group.test, &group.error) {
                        (Some(test), _) if test.mean_exceeds_reference => {
                            row.with_values(test.statistic, test.p_value)
                        }
                        (Some(test), _) => row
                            .with_values(test.statistic, test.p_value)
                            .with_note(format!(
                                "sample mean not above {}; halved two-sided p = {}",
                                f.reference, test.halved_p_value
                            )),
                        (None, Some(error)) => row.with_note(error.clone()),
                        (None, None) => row,
                    });
                }
            }
            Outcome::Completed(Finding::Proportion(f)) => rows.push(
                SummaryRow::new(analysis, "fbs")
                    .with_values(f.test.successes as f64, f.test.p_value)
                    .with_note(format!("expected {:.2} of {}", f.test.expected, f.test.trials)),
            ),
            Outcome::Completed(Finding::TwoSample(f)) => rows.push(
                SummaryRow::new(analysis, format!("{} {} vs {}", f.measure, f.first, f.second))
                    .with_values(f.test.statistic, f.test.p_value),
            ),
            Outcome::Completed(Finding::Anova(f)) => {
                rows.push(
                    SummaryRow::new(analysis, format!("{} by cp", f.measure))
                        .with_values(f.anova.statistic, f.anova.p_value),
                );
                for pair in &f.tukey.pairs {
                    rows.push(
                        SummaryRow::new(analysis, format!("{} vs {}", pair.group1, pair.group2))
                            .with_values(pair.meandiff, pair.p_adj)
                            .with_note(if pair.reject { "reject" } else { "" }),
                    );
                }
            }
            Outcome::Completed(Finding::Association(f)) => rows.push(
                SummaryRow::new(analysis, "cp x heart_disease")
                    .with_values(f.test.statistic, f.test.p_value)
                    .with_note(format!("dof {}", f.test.dof)),
            ),
        }
    }
    rows
}

pub fn write_csv<W: Write>(report: &Report, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in summary_rows(report) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset {}: {} patients", self.dataset_id, self.patients)?;
        writeln!(f, "Significance threshold: {}", self.alpha)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<14}{:>9}{:>9}{:>10}{:>9}{:>7}{:>7}{:>9}{:>6}",
            "heart_disease", "patients", "age", "trestbps", "chol", "fbs", "exang", "thalach", "num"
        )?;
        for m in &self.group_means {
            writeln!(
                f,
                "{:<14}{:>9}{:>9}{:>10}{:>9}{:>7}{:>7}{:>9}{:>6}",
                m.heart_disease,
                m.patients,
                cell(m.age, 2),
                cell(m.trestbps, 2),
                cell(m.chol, 2),
                cell(m.fbs, 3),
                cell(m.exang, 3),
                cell(m.thalach, 2),
                cell(m.num, 2)
            )?;
        }

        if !self.presence_preview.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "First {} patients with heart disease:",
                self.presence_preview.len()
            )?;
            writeln!(
                f,
                "{:>5}{:>8}{:>18}{:>10}{:>8}{:>7}{:>7}{:>9}{:>5}",
                "age", "sex", "cp", "trestbps", "chol", "fbs", "exang", "thalach", "num"
            )?;
            for r in &self.presence_preview {
                writeln!(
                    f,
                    "{:>5}{:>8}{:>18}{:>10}{:>8}{:>7}{:>7}{:>9}{:>5}",
                    field(r.age),
                    field(r.sex.map(|s| s.label())),
                    field(r.cp.map(|cp| cp.label())),
                    field(r.trestbps),
                    field(r.chol),
                    field(r.fbs),
                    field(r.exang),
                    field(r.thalach),
                    r.num
                )?;
            }
        }

        for analysis in &self.analyses {
            writeln!(f)?;
            writeln!(f, "== {}", analysis.analysis)?;
            writeln!(f, "{}", analysis.question)?;
            match &analysis.outcome {
                Outcome::Completed(finding) => write!(f, "{}", finding)?,
                Outcome::Failed(reason) => writeln!(f, "not computed: {}", reason)?,
            }
        }
        Ok(())
    }
}

fn field<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn cell(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Threshold(x) => fmt::Display::fmt(x, f),
            Finding::Proportion(x) => fmt::Display::fmt(x, f),
            Finding::TwoSample(x) => fmt::Display::fmt(x, f),
            Finding::Anova(x) => fmt::Display::fmt(x, f),
            Finding::Association(x) => fmt::Display::fmt(x, f),
        }
    }
}

impl fmt::Display for ThresholdFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            match group.mean {
                Some(mean) => writeln!(
                    f,
                    "Mean {} of {} patients ({}): {:.2}",
                    self.measure, group.group, group.n, mean
                )?,
                None => writeln!(f, "No {} values for {} patients", self.measure, group.group)?,
            }
            match (&group.test, &group.error) {
                (Some(test), _) => {
                    writeln!(
                        f,
                        "  one-sample t = {:.4}, one-sided p-value (mean > {}): {:e}",
                        test.statistic, self.reference, test.p_value
                    )?;
                    if !test.mean_exceeds_reference {
                        writeln!(
                            f,
                            "  warning: sample mean is not above {}; the halved two-sided p-value {:e} is not a valid one-sided p-value",
                            self.reference, test.halved_p_value
                        )?;
                    }
                }
                (None, Some(error)) => writeln!(f, "  not computed: {}", error)?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for ProportionFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of patients: {}", self.patients)?;
        writeln!(
            f,
            "Patients with high fasting blood sugar: {}",
            self.test.successes
        )?;
        writeln!(
            f,
            "Expected at a rate of {}: {:.2}",
            self.test.null_proportion, self.test.expected
        )?;
        writeln!(
            f,
            "One-sided p-value from binomial test: {:e}",
            self.test.p_value
        )
    }
}

impl fmt::Display for TwoSampleFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Difference in means of {} ({} - {}): {:.2}",
            self.measure, self.first, self.second, self.mean_diff
        )?;
        writeln!(
            f,
            "Difference in medians of {} ({} - {}): {}",
            self.measure, self.first, self.second, self.median_diff
        )?;
        writeln!(
            f,
            "{} two-sample t = {:.4}, df = {:.2}, p-value: {:e}",
            if self.equal_var { "Pooled" } else { "Welch" },
            self.test.statistic,
            self.test.df,
            self.test.p_value
        )
    }
}

impl fmt::Display for AnovaFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(
                f,
                "{:<18} n = {:>4}  mean {} = {}",
                group.group,
                group.n,
                self.measure,
                cell(group.mean, 2)
            )?;
        }
        writeln!(
            f,
            "ANOVA F({}, {}) = {:.4}, p-value: {:e}",
            self.anova.df_between, self.anova.df_within, self.anova.statistic, self.anova.p_value
        )?;
        write!(f, "{}", self.tukey)
    }
}

impl fmt::Display for AssociationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        writeln!(
            f,
            "chi-squared = {:.4}, dof = {}, p-value: {:e}",
            self.test.statistic, self.test.dof, self.test.p_value
        )?;
        writeln!(f, "Expected counts under independence:")?;
        for (cp, row) in self.table.rows.iter().zip(&self.test.expected) {
            write!(f, "{:<18}", cp)?;
            for e in row {
                write!(f, "{:>10.2}", e)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
