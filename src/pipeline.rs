use std::fs::File;
use std::path::Path;

use log::{debug, info, warn};
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::provider::DataProvider;
use crate::records::{Category, ChestPain, HeartDisease, Sex, LABEL_COLUMN, SILVER_SCHEMA};

pub async fn write_csv(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub async fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

/// Write the labeled table, choosing the format from the file extension.
pub async fn export(path: &Path, df: &mut DataFrame) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => write_csv(path, df).await?,
        Some("parquet") => write_parquet(path, df).await?,
        _ => {
            return Err(AnalysisError::ExportFormat {
                path: path.to_path_buf(),
            })
        }
    }
    info!("Exported {} rows to {:?}", df.height(), path);
    Ok(())
}

/// Fetch the dataset and join features with targets.
pub async fn process_raw<D: DataProvider + ?Sized>(provider: &D, id: u32) -> Result<DataFrame> {
    let df = provider.fetch(id)?.combined()?;
    info!("Raw table: {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

/// Keep the analysis columns, cast numerics and normalise categorical encodings.
pub async fn process_silver(raw: DataFrame) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(SILVER_SCHEMA.len());
    for field in SILVER_SCHEMA.iter_fields() {
        let name = field.name().as_str();
        let series = raw
            .column(name)
            .map_err(|_| AnalysisError::schema(name, "column missing"))?;
        let normalized = match name {
            "cp" => normalize_category::<ChestPain>(series)?,
            "sex" => normalize_category::<Sex>(series)?,
            _ => cast_numeric(series, field.data_type())?,
        };
        debug!("Column {}: {} -> {}", name, series.dtype(), normalized.dtype());
        columns.push(normalized);
    }

    Ok(DataFrame::new(columns)?)
}

/// Add the derived `heart_disease` label.
pub async fn process_gold(silver: DataFrame) -> Result<DataFrame> {
    let gold = derive_label(silver)?;
    info!("Gold table: {} labeled rows", gold.height());
    Ok(gold)
}

pub fn derive_label(df: DataFrame) -> Result<DataFrame> {
    {
        let num = df
            .column("num")
            .map_err(|_| AnalysisError::schema("num", "column missing"))?;
        if !num.dtype().is_numeric() {
            return Err(AnalysisError::schema(
                "num",
                format!("expected an integer column, found {}", num.dtype()),
            ));
        }
        if num.null_count() > 0 {
            return Err(AnalysisError::MissingLabel {
                count: num.null_count(),
            });
        }
    }

    Ok(df
        .lazy()
        .with_column(
            when(col("num").eq(lit(0)))
                .then(lit(HeartDisease::Absence.label()))
                .otherwise(lit(HeartDisease::Presence.label()))
                .alias(LABEL_COLUMN),
        )
        .collect()?)
}

fn cast_numeric(series: &Series, target: &DataType) -> Result<Series> {
    match series.dtype() {
        DataType::Boolean => {}
        dt if dt.is_numeric() => {}
        dt => {
            return Err(AnalysisError::schema(
                series.name(),
                format!("expected a numeric column, found {}", dt),
            ))
        }
    }
    Ok(series.cast(target)?)
}

/// Map numeric codes or label strings onto the category's labels. Values
/// outside the domain become null.
fn normalize_category<C: Category>(series: &Series) -> Result<Series> {
    let labels: Utf8Chunked = match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<C>().ok()).map(C::label))
            .collect(),
        dt if dt.is_numeric() => {
            let codes = series.cast(&DataType::Int64)?;
            let labels: Utf8Chunked = codes
                .i64()?
                .into_iter()
                .map(|v| v.and_then(C::from_code).map(C::label))
                .collect();
            labels
        }
        dt => {
            return Err(AnalysisError::schema(
                series.name(),
                format!("expected codes or labels, found {}", dt),
            ))
        }
    };

    let unknown = labels.null_count().saturating_sub(series.null_count());
    if unknown > 0 {
        warn!(
            "{} value(s) of {} outside the known categories, excluded from groups",
            unknown,
            series.name()
        );
    }

    let mut normalized = labels.into_series();
    normalized.rename(series.name());
    Ok(normalized)
}

/// Mean of each numeric column per diagnosis label.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMeans {
    pub heart_disease: String,
    pub patients: u32,
    pub age: Option<f64>,
    pub trestbps: Option<f64>,
    pub chol: Option<f64>,
    pub fbs: Option<f64>,
    pub exang: Option<f64>,
    pub thalach: Option<f64>,
    pub num: Option<f64>,
}

static MEAN_COLUMNS: [&str; 7] = ["age", "trestbps", "chol", "fbs", "exang", "thalach", "num"];

pub fn group_means(gold: &DataFrame) -> Result<Vec<GroupMeans>> {
    let mut aggs: Vec<Expr> = MEAN_COLUMNS
        .iter()
        .map(|c| col(c).cast(DataType::Float64).mean())
        .collect();
    aggs.push(col(LABEL_COLUMN).count().alias("patients"));

    let summary = gold
        .clone()
        .lazy()
        .groupby([col(LABEL_COLUMN)])
        .agg(aggs)
        .sort(LABEL_COLUMN, SortOptions::default())
        .collect()?;

    let labels = summary.column(LABEL_COLUMN)?.utf8()?;
    let counts = summary.column("patients")?.cast(&DataType::UInt32)?;
    let counts = counts.u32()?;
    let mut means = Vec::with_capacity(MEAN_COLUMNS.len());
    for name in MEAN_COLUMNS {
        let values: Vec<Option<f64>> = summary.column(name)?.f64()?.into_iter().collect();
        means.push(values);
    }

    Ok(labels
        .into_iter()
        .zip(counts.into_iter())
        .enumerate()
        .map(|(i, (label, count))| GroupMeans {
            heart_disease: label.unwrap_or_default().to_string(),
            patients: count.unwrap_or(0),
            age: means[0][i],
            trestbps: means[1][i],
            chol: means[2][i],
            fbs: means[3][i],
            exang: means[4][i],
            thalach: means[5][i],
            num: means[6][i],
        })
        .collect())
}

/// First rows of the Presence subset.
pub fn presence_preview(gold: &DataFrame, rows: usize) -> Result<DataFrame> {
    let mask = gold
        .column(LABEL_COLUMN)?
        .utf8()?
        .equal(HeartDisease::Presence.label());
    Ok(gold.filter(&mask)?.head(Some(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        df!(
            "age" => &[63.0f64, 67.0, 67.0, 37.0, 41.0],
            "sex" => &[1.0f64, 1.0, 1.0, 1.0, 0.0],
            "cp" => &[1.0f64, 4.0, 4.0, 3.0, 2.0],
            "trestbps" => &[145.0f64, 160.0, 120.0, 130.0, 130.0],
            "chol" => &[233.0f64, 286.0, 229.0, 250.0, 204.0],
            "fbs" => &[1.0f64, 0.0, 0.0, 0.0, 0.0],
            "restecg" => &[2.0f64, 2.0, 2.0, 0.0, 2.0],
            "thalach" => &[150.0f64, 108.0, 129.0, 187.0, 172.0],
            "exang" => &[0.0f64, 1.0, 1.0, 0.0, 0.0],
            "num" => &[0i64, 2, 1, 0, 0]
        )
        .unwrap()
    }

    #[tokio::test]
    async fn silver_normalises_codes() {
        let silver = process_silver(raw_frame()).await.unwrap();
        assert_eq!(silver.width(), SILVER_SCHEMA.len());
        assert!(silver.column("restecg").is_err());

        let cp: Vec<Option<&str>> = silver.column("cp").unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(
            cp,
            vec![
                Some("typical angina"),
                Some("asymptomatic"),
                Some("asymptomatic"),
                Some("non-anginal pain"),
                Some("atypical angina"),
            ]
        );
        let sex = silver.column("sex").unwrap();
        assert_eq!(sex.utf8().unwrap().get(4), Some("female"));
        assert_eq!(silver.column("fbs").unwrap().dtype(), &DataType::Int64);
        assert_eq!(silver.column("chol").unwrap().dtype(), &DataType::Float64);
    }

    #[tokio::test]
    async fn silver_accepts_label_strings_and_nulls_unknowns() {
        let mut raw = raw_frame();
        raw.with_column(Series::new(
            "cp",
            &["typical angina", "asymptomatic", "angina?", "non-anginal pain", "atypical angina"],
        ))
        .unwrap();
        let silver = process_silver(raw).await.unwrap();
        assert_eq!(silver.column("cp").unwrap().null_count(), 1);
    }

    #[tokio::test]
    async fn missing_column_is_a_schema_error() {
        let raw = raw_frame().drop("thalach").unwrap();
        match process_silver(raw).await {
            Err(AnalysisError::Schema { column, .. }) => assert_eq!(column, "thalach"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn text_in_numeric_column_is_a_schema_error() {
        let mut raw = raw_frame();
        raw.with_column(Series::new("chol", &["a", "b", "c", "d", "e"]))
            .unwrap();
        assert!(matches!(
            process_silver(raw).await,
            Err(AnalysisError::Schema { .. })
        ));
    }

    #[test]
    fn label_follows_num() {
        let df = df!("num" => &[0i64, 1, 2, 3, 4, 0]).unwrap();
        let labeled = derive_label(df).unwrap();
        let labels: Vec<Option<&str>> = labeled
            .column(LABEL_COLUMN)
            .unwrap()
            .utf8()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            labels,
            vec![
                Some("Absence"),
                Some("Presence"),
                Some("Presence"),
                Some("Presence"),
                Some("Presence"),
                Some("Absence"),
            ]
        );
    }

    #[test]
    fn null_num_cannot_be_labeled() {
        let df = df!("num" => &[Some(0i64), None, Some(2)]).unwrap();
        assert!(matches!(
            derive_label(df),
            Err(AnalysisError::MissingLabel { count: 1 })
        ));
    }

    #[tokio::test]
    async fn group_means_per_label() {
        let gold = process_gold(process_silver(raw_frame()).await.unwrap())
            .await
            .unwrap();
        let means = group_means(&gold).unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].heart_disease, "Absence");
        assert_eq!(means[0].patients, 3);
        assert_eq!(means[1].patients, 2);
        let absence_chol = means[0].chol.unwrap();
        assert!((absence_chol - (233.0 + 250.0 + 204.0) / 3.0).abs() < 1e-9);

        let preview = presence_preview(&gold, 5).unwrap();
        assert_eq!(preview.height(), 2);
    }

    #[tokio::test]
    async fn export_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut gold = derive_label(df!("num" => &[0i64, 1]).unwrap()).unwrap();
        let target = dir.path().join("labeled.xlsx");
        assert!(matches!(
            export(&target, &mut gold).await,
            Err(AnalysisError::ExportFormat { .. })
        ));

        let target = dir.path().join("labeled.csv");
        export(&target, &mut gold).await.unwrap();
        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("num,heart_disease"));
    }
}
