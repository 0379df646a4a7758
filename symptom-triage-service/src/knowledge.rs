//! The specialist lookup table and the class index derived from it.
//!
//! The table is loaded once at startup and never mutated. Row order is preserved exactly as
//! in the source file: symptom matching is first-match-wins, so reordering rows changes
//! answers.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, TriageError};

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Specialist")]
    specialist: String,
    #[serde(rename = "Symptoms")]
    symptoms: String,
    #[serde(rename = "Treatments")]
    treatments: String,
}

/// One row of the lookup table. Symptoms are trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRow {
    pub specialist: String,
    pub symptoms: Vec<String>,
    pub treatments: String,
}

impl LookupRow {
    pub fn new(specialist: &str, symptoms: &[&str], treatments: &str) -> Self {
        Self {
            specialist: specialist.to_string(),
            symptoms: normalize_symptoms(symptoms.iter().copied()),
            treatments: treatments.to_string(),
        }
    }

    /// Case-insensitive exact match of a single symptom against this row.
    pub fn has_symptom(&self, symptom: &str) -> bool {
        let symptom = symptom.to_lowercase();
        self.symptoms.iter().any(|s| *s == symptom)
    }
}

fn normalize_symptoms<'a>(symptoms: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for symptom in symptoms.map(|s| s.trim().to_lowercase()) {
        if !symptom.is_empty() && !normalized.contains(&symptom) {
            normalized.push(symptom);
        }
    }
    normalized
}

#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    rows: Vec<LookupRow>,
}

impl LookupTable {
    pub fn new(rows: Vec<LookupRow>) -> Self {
        Self { rows }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            TriageError::LookupTable(format!("cannot open {}: {}", path.display(), e))
        })?;
        let table = Self::from_reader(file)?;
        info!(
            "Loaded {} lookup rows ({} specialists) from {}",
            table.rows.len(),
            table.specialists().len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse a CSV with `Specialist`, `Symptoms` (comma separated) and `Treatments` columns.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<RawRow>() {
            let raw = record?;
            rows.push(LookupRow {
                specialist: raw.specialist,
                symptoms: normalize_symptoms(raw.symptoms.split(',')),
                treatments: raw.treatments,
            });
        }
        if rows.is_empty() {
            return Err(TriageError::LookupTable("table has no rows".to_string()));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[LookupRow] {
        &self.rows
    }

    /// First row (in table order) containing any of the given symptoms.
    pub fn first_match<S: AsRef<str>>(&self, symptoms: &[S]) -> Option<&LookupRow> {
        self.rows
            .iter()
            .find(|row| symptoms.iter().any(|s| row.has_symptom(s.as_ref())))
    }

    /// Treatments of the first row recommending the given specialist.
    pub fn treatment_for(&self, specialist: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.specialist == specialist)
            .map(|row| row.treatments.as_str())
    }

    /// Distinct specialist names in first-seen order.
    pub fn specialists(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.specialist.as_str()) {
                seen.push(&row.specialist);
            }
        }
        seen
    }

    /// Every symptom phrase in the table, in row order, without duplicates.
    pub fn symptom_vocabulary(&self) -> Vec<&str> {
        let mut vocabulary: Vec<&str> = Vec::new();
        for symptom in self.rows.iter().flat_map(|row| row.symptoms.iter()) {
            if !vocabulary.contains(&symptom.as_str()) {
                vocabulary.push(symptom);
            }
        }
        vocabulary
    }
}

/// Maps classifier class indices to specialist names.
#[derive(Debug, Clone)]
pub struct SpecialistIndex {
    names: Vec<String>,
}

impl SpecialistIndex {
    pub fn from_table(table: &LookupTable) -> Self {
        Self {
            names: table.specialists().into_iter().map(String::from).collect(),
        }
    }

    pub fn name(&self, index: usize) -> Result<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(TriageError::UnknownClassIndex {
                index,
                known: self.names.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Specialist,Symptoms,Treatments\n\
        Cardiologist,\"Chest Pain, palpitations\",ECG and consult\n\
        Neurologist,\"headache, dizziness, chest pain\",MRI scan\n\
        Cardiologist,\"shortness of breath\",Stress test\n\
        ENT,\"ear pain, sore throat\",Ear drops\n";

    #[test]
    fn test_from_reader_preserves_order_and_normalizes() {
        let table = LookupTable::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.rows().len(), 4);
        assert_eq!(table.rows()[0].symptoms, vec!["chest pain", "palpitations"]);
        assert_eq!(table.rows()[1].specialist, "Neurologist");
        assert_eq!(
            table.specialists(),
            vec!["Cardiologist", "Neurologist", "ENT"]
        );
    }

    #[test]
    fn test_first_match_wins_in_table_order() {
        let table = LookupTable::from_reader(CSV.as_bytes()).unwrap();

        let row = table.first_match(&["Chest Pain"]).unwrap();
        assert_eq!(row.specialist, "Cardiologist");
        assert_eq!(row.treatments, "ECG and consult");

        let row = table.first_match(&["dizziness", "palpitations"]).unwrap();
        assert_eq!(row.treatments, "ECG and consult");

        assert!(table.first_match(&["chest"]).is_none());
        assert!(table.first_match::<&str>(&[]).is_none());
    }

    #[test]
    fn test_treatment_for_uses_first_row_of_specialist() {
        let table = LookupTable::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.treatment_for("Cardiologist"), Some("ECG and consult"));
        assert_eq!(table.treatment_for("Dermatologist"), None);
    }

    #[test]
    fn test_specialist_index() {
        let table = LookupTable::from_reader(CSV.as_bytes()).unwrap();
        let index = SpecialistIndex::from_table(&table);
        assert_eq!(index.len(), 3);
        assert_eq!(index.name(2).unwrap(), "ENT");
        assert!(matches!(
            index.name(3),
            Err(TriageError::UnknownClassIndex { index: 3, known: 3 })
        ));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let err = LookupTable::from_reader("Specialist,Symptoms,Treatments\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, TriageError::LookupTable(_)));
    }

    #[test]
    fn test_bundled_table_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/symptoms_specialists.csv");
        let table = LookupTable::from_path(path).unwrap();
        assert!(!table.specialists().is_empty());
        assert!(!table.symptom_vocabulary().is_empty());
    }
}
