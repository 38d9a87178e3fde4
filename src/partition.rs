use std::fmt;

use serde::Serialize;

use crate::records::{ChestPain, HeartDisease, Measure, PatientRecord, PatientTable};

/// Which records a subset selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Selector {
    Diagnosis(HeartDisease),
    ChestPain(ChestPain),
}

impl Selector {
    pub fn matches(self, record: &PatientRecord) -> bool {
        match self {
            Selector::Diagnosis(label) => record.heart_disease == label,
            Selector::ChestPain(cp) => record.cp == Some(cp),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Diagnosis(label) => fmt::Display::fmt(label, f),
            Selector::ChestPain(cp) => fmt::Display::fmt(cp, f),
        }
    }
}

/// A filtered view over the patient table.
#[derive(Debug, Clone, Copy)]
pub struct Subset<'a> {
    table: &'a PatientTable,
    selector: Selector,
}

impl<'a> Subset<'a> {
    pub fn new(table: &'a PatientTable, selector: Selector) -> Self {
        Subset { table, selector }
    }

    pub fn name(&self) -> String {
        self.selector.to_string()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PatientRecord> + 'a {
        let selector = self.selector;
        self.table.iter().filter(move |r| selector.matches(r))
    }

    /// Non-null values of `measure` within the subset.
    pub fn values(&self, measure: Measure) -> Vec<f64> {
        self.iter().filter_map(|r| measure.value(r)).collect()
    }
}

pub fn by_diagnosis(table: &PatientTable) -> [Subset<'_>; 2] {
    HeartDisease::ALL.map(|label| Subset::new(table, Selector::Diagnosis(label)))
}

pub fn by_chest_pain(table: &PatientTable) -> [Subset<'_>; 4] {
    ChestPain::ALL.map(|cp| Subset::new(table, Selector::ChestPain(cp)))
}

/// Record counts of chest pain type against diagnosis, restricted to the
/// categories observed in the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyTable {
    pub rows: Vec<ChestPain>,
    pub columns: Vec<HeartDisease>,
    pub counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    pub fn crosstab(table: &PatientTable) -> Self {
        let mut full = [[0u64; 2]; 4];
        for record in table.iter() {
            if let Some(cp) = record.cp {
                full[cp as usize][record.heart_disease as usize] += 1;
            }
        }

        let columns: Vec<HeartDisease> = HeartDisease::ALL
            .into_iter()
            .filter(|&label| full.iter().any(|row| row[label as usize] > 0))
            .collect();
        let rows: Vec<ChestPain> = ChestPain::ALL
            .into_iter()
            .filter(|&cp| full[cp as usize].iter().any(|&n| n > 0))
            .collect();
        let counts = rows
            .iter()
            .map(|&cp| {
                columns
                    .iter()
                    .map(|&label| full[cp as usize][label as usize])
                    .collect()
            })
            .collect();

        ContingencyTable {
            rows,
            columns,
            counts,
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<18}", "cp")?;
        for label in &self.columns {
            write!(f, "{:>10}", label)?;
        }
        writeln!(f)?;
        for (cp, row) in self.rows.iter().zip(&self.counts) {
            write!(f, "{:<18}", cp)?;
            for n in row {
                write!(f, "{:>10}", n)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
