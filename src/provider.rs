//! Id-keyed access to the raw feature and target tables.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, info};
use polars::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::records::UCI_COLUMNS;

/// Raw tables as the repository publishes them.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: DataFrame,
    pub targets: DataFrame,
}

impl Dataset {
    /// Features and targets side by side, one row per patient.
    pub fn combined(&self) -> Result<DataFrame> {
        if self.features.height() != self.targets.height() {
            return Err(AnalysisError::schema(
                "num",
                format!(
                    "features have {} rows but targets have {}",
                    self.features.height(),
                    self.targets.height()
                ),
            ));
        }
        Ok(self.features.hstack(self.targets.get_columns())?)
    }
}

pub trait DataProvider {
    fn fetch(&self, id: u32) -> Result<Dataset>;
}

/// Datasets stored on disk as `<root>/<id>/`.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

static FEATURES_CSV: &str = "features.csv";
static TARGETS_CSV: &str = "targets.csv";
static FEATURES_PARQUET: &str = "features.parquet";
static TARGETS_PARQUET: &str = "targets.parquet";
static PROCESSED_FILE: &str = "processed.cleveland.data";

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalRepository { root: root.into() }
    }

    pub fn dataset_dir(&self, id: u32) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn unavailable(&self, id: u32, reason: impl Into<String>) -> AnalysisError {
        AnalysisError::Provider {
            id,
            root: self.root.clone(),
            reason: reason.into(),
        }
    }
}

impl DataProvider for LocalRepository {
    fn fetch(&self, id: u32) -> Result<Dataset> {
        let dir = self.dataset_dir(id);
        if !dir.is_dir() {
            return Err(self.unavailable(id, "no such dataset"));
        }

        let dataset = if dir.join(FEATURES_CSV).is_file() && dir.join(TARGETS_CSV).is_file() {
            info!("Reading dataset {} from csv", id);
            Dataset {
                features: read_csv(dir.join(FEATURES_CSV))?,
                targets: read_csv(dir.join(TARGETS_CSV))?,
            }
        } else if dir.join(FEATURES_PARQUET).is_file() && dir.join(TARGETS_PARQUET).is_file() {
            info!("Reading dataset {} from parquet", id);
            Dataset {
                features: read_parquet(dir.join(FEATURES_PARQUET))?,
                targets: read_parquet(dir.join(TARGETS_PARQUET))?,
            }
        } else if dir.join(PROCESSED_FILE).is_file() {
            info!("Reading dataset {} from {}", id, PROCESSED_FILE);
            split_processed(read_processed(dir.join(PROCESSED_FILE))?)?
        } else {
            return Err(self.unavailable(id, "no features/targets files found"));
        };

        debug!(
            "Dataset {}: {} feature columns, {} target columns, {} rows",
            id,
            dataset.features.width(),
            dataset.targets.width(),
            dataset.features.height()
        );
        Ok(dataset)
    }
}

fn missing_values() -> Option<NullValues> {
    Some(NullValues::AllColumnsSingle("?".to_string()))
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let file = File::open(path)?;

    Ok(CsvReader::new(file)
        .has_header(true)
        .with_null_values(missing_values())
        .finish()?)
}

pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let file = File::open(path)?;

    Ok(ParquetReader::new(file).finish()?)
}

/// Headerless comma separated file with the fourteen UCI columns.
pub fn read_processed<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let file = File::open(path)?;

    let mut df = CsvReader::new(file)
        .has_header(false)
        .with_null_values(missing_values())
        .finish()?;
    if df.width() != UCI_COLUMNS.len() {
        return Err(AnalysisError::schema(
            "*",
            format!("expected {} columns, found {}", UCI_COLUMNS.len(), df.width()),
        ));
    }
    df.set_column_names(&UCI_COLUMNS)?;
    Ok(df)
}

fn split_processed(df: DataFrame) -> Result<Dataset> {
    let (features, targets) = UCI_COLUMNS.split_at(UCI_COLUMNS.len() - 1);
    Ok(Dataset {
        features: df.select(features)?,
        targets: df.select(targets)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PROCESSED: &str = "63.0,1.0,1.0,145.0,233.0,1.0,2.0,150.0,0.0,2.3,3.0,0.0,6.0,0\n\
67.0,1.0,4.0,160.0,286.0,0.0,2.0,108.0,1.0,1.5,2.0,3.0,3.0,2\n\
67.0,1.0,4.0,120.0,229.0,0.0,2.0,129.0,1.0,2.6,2.0,2.0,7.0,1\n\
37.0,1.0,3.0,130.0,250.0,0.0,0.0,187.0,0.0,3.5,3.0,?,3.0,0\n";

    #[test]
    fn missing_dataset_is_a_provider_error() {
        let dir = tempdir().unwrap();
        let repo = LocalRepository::new(dir.path());
        match repo.fetch(45) {
            Err(AnalysisError::Provider { id, .. }) => assert_eq!(id, 45),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn empty_dataset_dir_is_a_provider_error() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("45")).unwrap();
        let repo = LocalRepository::new(dir.path());
        assert!(matches!(repo.fetch(45), Err(AnalysisError::Provider { .. })));
    }

    #[test]
    fn processed_file_is_split_into_features_and_targets() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("45")).unwrap();
        fs::write(dir.path().join("45").join(PROCESSED_FILE), PROCESSED).unwrap();

        let dataset = LocalRepository::new(dir.path()).fetch(45).unwrap();
        assert_eq!(dataset.features.width(), 13);
        assert_eq!(dataset.targets.get_column_names(), vec!["num"]);
        assert_eq!(dataset.features.height(), 4);
        assert_eq!(dataset.features.column("ca").unwrap().null_count(), 1);

        let combined = dataset.combined().unwrap();
        assert_eq!(combined.width(), 14);
    }

    #[test]
    fn csv_pair_is_preferred() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("7");
        fs::create_dir(&data).unwrap();
        fs::write(data.join(FEATURES_CSV), "age,chol\n50,200\n60,?\n").unwrap();
        fs::write(data.join(TARGETS_CSV), "num\n0\n3\n").unwrap();
        fs::write(data.join(PROCESSED_FILE), PROCESSED).unwrap();

        let dataset = LocalRepository::new(dir.path()).fetch(7).unwrap();
        assert_eq!(dataset.features.get_column_names(), vec!["age", "chol"]);
        assert_eq!(dataset.features.column("chol").unwrap().null_count(), 1);
    }

    #[test]
    fn mismatched_heights_are_rejected() {
        let dataset = Dataset {
            features: df!("age" => &[50i64, 60]).unwrap(),
            targets: df!("num" => &[0i64]).unwrap(),
        };
        assert!(matches!(
            dataset.combined(),
            Err(AnalysisError::Schema { .. })
        ));
    }
}
