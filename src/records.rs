use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use polars::prelude::{DataFrame, DataType, Field, Schema};
use serde::Serialize;
use thiserror::Error;

use crate::error::{AnalysisError, Result};

lazy_static! {
    /// Column types of the analysis table once the silver stage has run.
    pub static ref SILVER_SCHEMA: Schema = Schema::from_iter(vec![
        Field::new("age", DataType::Int64),
        Field::new("sex", DataType::Utf8),
        Field::new("cp", DataType::Utf8),
        Field::new("trestbps", DataType::Int64),
        Field::new("chol", DataType::Float64),
        Field::new("fbs", DataType::Int64),
        Field::new("exang", DataType::Int64),
        Field::new("thalach", DataType::Float64),
        Field::new("num", DataType::Int64),
    ]);
}

/// Column order of the headerless `processed.*.data` files.
pub const UCI_COLUMNS: [&str; 14] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal", "num",
];

pub const LABEL_COLUMN: &str = "heart_disease";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category {0:?}")]
pub struct UnknownCategory(pub String);

/// A categorical column with a fixed domain, stored as label strings and
/// coded numerically in the raw UCI files.
pub trait Category: Copy + FromStr {
    fn from_code(code: i64) -> Option<Self>;
    fn label(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ChestPain {
    #[serde(rename = "asymptomatic")]
    Asymptomatic,
    #[serde(rename = "atypical angina")]
    AtypicalAngina,
    #[serde(rename = "non-anginal pain")]
    NonAnginalPain,
    #[serde(rename = "typical angina")]
    TypicalAngina,
}

impl ChestPain {
    pub const ALL: [ChestPain; 4] = [
        ChestPain::Asymptomatic,
        ChestPain::AtypicalAngina,
        ChestPain::NonAnginalPain,
        ChestPain::TypicalAngina,
    ];
}

impl Category for ChestPain {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ChestPain::TypicalAngina),
            2 => Some(ChestPain::AtypicalAngina),
            3 => Some(ChestPain::NonAnginalPain),
            4 => Some(ChestPain::Asymptomatic),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ChestPain::Asymptomatic => "asymptomatic",
            ChestPain::AtypicalAngina => "atypical angina",
            ChestPain::NonAnginalPain => "non-anginal pain",
            ChestPain::TypicalAngina => "typical angina",
        }
    }
}

impl FromStr for ChestPain {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ChestPain::ALL
            .into_iter()
            .find(|cp| cp.label() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Sex {
    #[serde(rename = "female")]
    Female,
    #[serde(rename = "male")]
    Male,
}

impl Category for Sex {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Sex::Female),
            1 => Some(Sex::Male),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
        }
    }
}

impl FromStr for Sex {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "female" => Ok(Sex::Female),
            "male" => Ok(Sex::Male),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// Derived diagnosis label: `Absence` iff `num == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HeartDisease {
    Absence,
    Presence,
}

impl HeartDisease {
    pub const ALL: [HeartDisease; 2] = [HeartDisease::Absence, HeartDisease::Presence];

    pub fn from_num(num: i64) -> Self {
        if num == 0 {
            HeartDisease::Absence
        } else {
            HeartDisease::Presence
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HeartDisease::Absence => "Absence",
            HeartDisease::Presence => "Presence",
        }
    }
}

impl FromStr for HeartDisease {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Absence" => Ok(HeartDisease::Absence),
            "Presence" => Ok(HeartDisease::Presence),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for ChestPain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl fmt::Display for HeartDisease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Quantitative columns the tests run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Chol,
    Thalach,
}

impl Measure {
    pub fn column(self) -> &'static str {
        match self {
            Measure::Chol => "chol",
            Measure::Thalach => "thalach",
        }
    }

    pub fn value(self, record: &PatientRecord) -> Option<f64> {
        match self {
            Measure::Chol => record.chol,
            Measure::Thalach => record.thalach,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    pub age: Option<i64>,
    pub sex: Option<Sex>,
    pub trestbps: Option<i64>,
    pub chol: Option<f64>,
    pub cp: Option<ChestPain>,
    pub exang: Option<bool>,
    pub fbs: Option<bool>,
    pub thalach: Option<f64>,
    pub num: i64,
    pub heart_disease: HeartDisease,
}

impl PatientRecord {
    /// Record with only the label-relevant fields set; used to build synthetic tables.
    pub fn with_num(num: i64) -> Self {
        PatientRecord {
            age: None,
            sex: None,
            trestbps: None,
            chol: None,
            cp: None,
            exang: None,
            fbs: None,
            thalach: None,
            num,
            heart_disease: HeartDisease::from_num(num),
        }
    }
}

/// The labeled patient table. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct PatientTable {
    records: Vec<PatientRecord>,
}

impl PatientTable {
    pub fn new(records: Vec<PatientRecord>) -> Self {
        PatientTable { records }
    }

    /// Convert a gold frame (silver columns plus `heart_disease`) into typed records.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let age: Vec<Option<i64>> = df.column("age")?.i64()?.into_iter().collect();
        let trestbps: Vec<Option<i64>> = df.column("trestbps")?.i64()?.into_iter().collect();
        let chol: Vec<Option<f64>> = df.column("chol")?.f64()?.into_iter().collect();
        let thalach: Vec<Option<f64>> = df.column("thalach")?.f64()?.into_iter().collect();
        let fbs: Vec<Option<i64>> = df.column("fbs")?.i64()?.into_iter().collect();
        let exang: Vec<Option<i64>> = df.column("exang")?.i64()?.into_iter().collect();
        let num: Vec<Option<i64>> = df.column("num")?.i64()?.into_iter().collect();
        let sex: Vec<Option<Sex>> = df
            .column("sex")?
            .utf8()?
            .into_iter()
            .map(|v| v.and_then(|s| s.parse().ok()))
            .collect();
        let cp: Vec<Option<ChestPain>> = df
            .column("cp")?
            .utf8()?
            .into_iter()
            .map(|v| v.and_then(|s| s.parse().ok()))
            .collect();
        let labels = df.column(LABEL_COLUMN)?.utf8()?;

        let mut records = Vec::with_capacity(df.height());
        for (i, label) in labels.into_iter().enumerate() {
            let num = num[i].ok_or(AnalysisError::MissingLabel { count: 1 })?;
            let heart_disease = label
                .ok_or(AnalysisError::MissingLabel { count: 1 })?
                .parse::<HeartDisease>()
                .map_err(|e| AnalysisError::schema(LABEL_COLUMN, e.to_string()))?;
            records.push(PatientRecord {
                age: age[i],
                sex: sex[i],
                trestbps: trestbps[i],
                chol: chol[i],
                cp: cp[i],
                exang: exang[i].map(|v| v != 0),
                fbs: fbs[i].map(|v| v != 0),
                thalach: thalach[i],
                num,
                heart_disease,
            });
        }
        Ok(PatientTable { records })
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatientRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<PatientRecord> for PatientTable {
    fn from_iter<I: IntoIterator<Item = PatientRecord>>(iter: I) -> Self {
        PatientTable::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn label_is_absence_only_for_zero() {
        assert_eq!(HeartDisease::from_num(0), HeartDisease::Absence);
        for num in 1..=4 {
            assert_eq!(HeartDisease::from_num(num), HeartDisease::Presence);
        }
    }

    #[test]
    fn chest_pain_codes_and_labels() {
        assert_eq!(ChestPain::from_code(1), Some(ChestPain::TypicalAngina));
        assert_eq!(ChestPain::from_code(4), Some(ChestPain::Asymptomatic));
        assert_eq!(ChestPain::from_code(0), None);
        for cp in ChestPain::ALL {
            assert_eq!(cp.label().parse::<ChestPain>(), Ok(cp));
        }
        assert!("asymptomatic ".parse::<ChestPain>().is_err());
    }

    #[test]
    fn enum_order_follows_labels() {
        let mut labels: Vec<&str> = ChestPain::ALL.iter().map(|cp| cp.label()).collect();
        labels.sort();
        let ordered: Vec<&str> = ChestPain::ALL.iter().map(|cp| cp.label()).collect();
        assert_eq!(labels, ordered);
        assert!(HeartDisease::Absence < HeartDisease::Presence);
    }

    #[test]
    fn silver_schema_lists_required_columns() {
        let names: Vec<String> = SILVER_SCHEMA
            .iter_fields()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["age", "sex", "cp", "trestbps", "chol", "fbs", "exang", "thalach", "num"]
        );
    }

    #[test]
    fn table_from_gold_frame() {
        let df = df!(
            "age" => &[Some(63i64), Some(41)],
            "sex" => &[Some("male"), None],
            "cp" => &[Some("typical angina"), Some("bogus")],
            "trestbps" => &[Some(145i64), Some(130)],
            "chol" => &[Some(233.0f64), None],
            "fbs" => &[Some(1i64), Some(0)],
            "exang" => &[Some(0i64), Some(1)],
            "thalach" => &[Some(150.0f64), Some(172.0)],
            "num" => &[0i64, 2],
            "heart_disease" => &["Absence", "Presence"]
        )
        .unwrap();

        let table = PatientTable::from_frame(&df).unwrap();
        assert_eq!(table.len(), 2);
        let first = &table.records()[0];
        assert_eq!(first.cp, Some(ChestPain::TypicalAngina));
        assert_eq!(first.sex, Some(Sex::Male));
        assert_eq!(first.fbs, Some(true));
        assert_eq!(first.heart_disease, HeartDisease::Absence);
        let second = &table.records()[1];
        assert_eq!(second.cp, None);
        assert_eq!(second.chol, None);
        assert_eq!(second.exang, Some(true));
        assert_eq!(second.heart_disease, HeartDisease::Presence);
    }
}
