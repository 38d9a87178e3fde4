use std::fs;
use std::path::Path;

use heart_hypotheses::provider::read_parquet;
use heart_hypotheses::records::{HeartDisease, LABEL_COLUMN};
use heart_hypotheses::{analyze, AnalysisConfig, AnalysisError, LocalRepository, Outcome, ReportFormat};
use tempfile::tempdir;

/// Twenty diseased patients with high cholesterol and low max heart rate,
/// twenty healthy ones with the opposite profile.
fn cleveland_rows() -> String {
    let mut rows = String::new();
    for i in 0..20 {
        let cp = if i % 5 == 0 { 3 } else { 4 };
        let fbs = if i % 4 == 0 { 1 } else { 0 };
        rows.push_str(&format!(
            "{}.0,1.0,{}.0,140.0,{}.0,{}.0,2.0,{}.0,1.0,2.0,2.0,1.0,7.0,{}\n",
            50 + i % 15,
            cp,
            250 + (i * 7) % 40,
            fbs,
            125 + (i * 3) % 20,
            1 + i % 4,
        ));
    }
    for i in 0..20 {
        let cp = [1, 2, 3][i % 3];
        let ca = if i == 3 { "?".to_string() } else { "0.0".to_string() };
        rows.push_str(&format!(
            "{}.0,{}.0,{}.0,125.0,{}.0,0.0,0.0,{}.0,0.0,0.5,1.0,{},3.0,0\n",
            40 + i % 12,
            i % 2,
            cp,
            200 + (i * 5) % 35,
            160 + (i * 4) % 25,
            ca,
        ));
    }
    rows
}

fn write_dataset(root: &Path, id: u32, contents: &str) {
    let dir = root.join(id.to_string());
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("processed.cleveland.data"), contents).unwrap();
}

#[tokio::test]
async fn every_analysis_completes_on_a_cleveland_file() {
    let dir = tempdir().unwrap();
    write_dataset(dir.path(), 45, &cleveland_rows());
    let repo = LocalRepository::new(dir.path());

    let report = analyze(&repo, 45, &AnalysisConfig::default(), None)
        .await
        .unwrap();
    assert_eq!(report.dataset_id, 45);
    assert_eq!(report.patients, 40);
    assert_eq!(report.analyses.len(), 6);
    for analysis in &report.analyses {
        assert!(
            matches!(analysis.outcome, Outcome::Completed(_)),
            "{} did not complete: {:?}",
            analysis.analysis,
            analysis.outcome
        );
    }

    let labels: Vec<&str> = report
        .group_means
        .iter()
        .map(|g| g.heart_disease.as_str())
        .collect();
    assert_eq!(labels, vec!["Absence", "Presence"]);
    assert_eq!(report.group_means[0].patients, 20);
    let absence_chol = report.group_means[0].chol.unwrap();
    let presence_chol = report.group_means[1].chol.unwrap();
    assert!(presence_chol > absence_chol);

    assert_eq!(report.presence_preview.len(), 5);
    assert!(report
        .presence_preview
        .iter()
        .all(|r| r.heart_disease == HeartDisease::Presence));
    assert_eq!(report.presence_preview[0].chol, Some(250.0));
}

#[tokio::test]
async fn report_renders_in_every_format() {
    let dir = tempdir().unwrap();
    write_dataset(dir.path(), 45, &cleveland_rows());
    let repo = LocalRepository::new(dir.path());
    let report = analyze(&repo, 45, &AnalysisConfig::default(), None)
        .await
        .unwrap();

    let mut text = Vec::new();
    report.write(ReportFormat::Text, &mut text).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("Tukey HSD"));
    assert!(text.contains("First 5 patients with heart disease:"));

    let mut json = Vec::new();
    report.write(ReportFormat::Json, &mut json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    let analyses = value["analyses"].as_array().unwrap();
    assert_eq!(analyses.len(), 6);
    assert_eq!(analyses[0]["analysis"], "cholesterol_threshold");
    assert!(analyses
        .iter()
        .all(|a| a["outcome"]["status"] == "completed"));

    let mut csv = Vec::new();
    report.write(ReportFormat::Csv, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.lines().next().unwrap().starts_with("analysis,"));
}

#[tokio::test]
async fn labeled_table_is_exported() {
    let dir = tempdir().unwrap();
    write_dataset(dir.path(), 45, &cleveland_rows());
    let repo = LocalRepository::new(dir.path());
    let out = dir.path().join("labeled.parquet");

    analyze(&repo, 45, &AnalysisConfig::default(), Some(out.as_path()))
        .await
        .unwrap();
    let exported = read_parquet(&out).unwrap();
    assert_eq!(exported.height(), 40);
    assert!(exported.column(LABEL_COLUMN).is_ok());

    let err = analyze(
        &repo,
        45,
        &AnalysisConfig::default(),
        Some(dir.path().join("labeled.xlsx").as_path()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AnalysisError::ExportFormat { .. }));
}

#[tokio::test]
async fn unknown_dataset_is_fatal() {
    let dir = tempdir().unwrap();
    let repo = LocalRepository::new(dir.path());
    let err = analyze(&repo, 45, &AnalysisConfig::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Provider { id: 45, .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn missing_label_stops_the_run() {
    let dir = tempdir().unwrap();
    let mut rows = cleveland_rows();
    rows.push_str("55.0,1.0,4.0,130.0,260.0,0.0,2.0,140.0,1.0,1.0,2.0,1.0,7.0,?\n");
    write_dataset(dir.path(), 45, &rows);
    let repo = LocalRepository::new(dir.path());

    let err = analyze(&repo, 45, &AnalysisConfig::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::MissingLabel { count: 1 }));
}

#[tokio::test]
async fn truncated_rows_are_a_schema_error() {
    let dir = tempdir().unwrap();
    write_dataset(dir.path(), 45, "63.0,1.0,1.0,145.0,233.0\n67.0,1.0,4.0,160.0,286.0\n");
    let repo = LocalRepository::new(dir.path());

    let err = analyze(&repo, 45, &AnalysisConfig::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Schema { .. }));
}
