//! Exposure dictionary: the catalog of candidate screening variables.

use crate::error::{Result, XwasError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One catalogued exposure variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureVariable {
    /// Column name in the dataset.
    pub name: String,
    /// Exposure category, e.g. "heavy_metals" or "phenols".
    pub category: String,
    /// Human-readable description for reporting.
    #[serde(default)]
    pub description: String,
}

/// Catalog of exposure variables with their categories and descriptions.
///
/// Drives exposure selection for a screen and supplies descriptions for
/// the corrected results.
#[derive(Debug, Clone, Default)]
pub struct DataDictionary {
    variables: Vec<ExposureVariable>,
}

impl DataDictionary {
    /// Create a dictionary from a list of variables.
    pub fn new(variables: Vec<ExposureVariable>) -> Self {
        Self { variables }
    }

    /// Load a dictionary from a tab-delimited file.
    ///
    /// Expected header: `name`, `category`, `description` (description
    /// optional; extra columns are ignored).
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let mut variables = Vec::new();
        for record in reader.deserialize() {
            let var: ExposureVariable = record?;
            variables.push(var);
        }

        if variables.is_empty() {
            return Err(XwasError::EmptyData(
                "No variables in dictionary".to_string(),
            ));
        }
        Ok(Self { variables })
    }

    /// Number of catalogued variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True if no variables are catalogued.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// All catalogued variables in file order.
    pub fn variables(&self) -> &[ExposureVariable] {
        &self.variables
    }

    /// Sorted unique categories.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .variables
            .iter()
            .map(|v| v.category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        cats.sort();
        cats
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&ExposureVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Description for a variable, if catalogued.
    pub fn description(&self, name: &str) -> Option<&str> {
        self.get(name).map(|v| v.description.as_str())
    }

    /// Select exposure names for a screen: variables in the allowed
    /// categories (all categories when the list is empty), minus the
    /// explicit exclusions. Returns sorted unique names.
    pub fn select_exposures(&self, categories: &[String], exclude: &[String]) -> Vec<String> {
        let excluded: HashSet<&str> = exclude.iter().map(|s| s.as_str()).collect();
        let mut names: Vec<String> = self
            .variables
            .iter()
            .filter(|v| categories.is_empty() || categories.contains(&v.category))
            .filter(|v| !excluded.contains(v.name.as_str()))
            .map(|v| v.name.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_dictionary() -> DataDictionary {
        DataDictionary::new(vec![
            ExposureVariable {
                name: "cadmium".to_string(),
                category: "heavy_metals".to_string(),
                description: "Urinary cadmium (ug/L)".to_string(),
            },
            ExposureVariable {
                name: "lead".to_string(),
                category: "heavy_metals".to_string(),
                description: "Blood lead (ug/dL)".to_string(),
            },
            ExposureVariable {
                name: "bisphenol_a".to_string(),
                category: "phenols".to_string(),
                description: "Urinary BPA (ng/mL)".to_string(),
            },
        ])
    }

    #[test]
    fn test_from_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name\tcategory\tdescription").unwrap();
        writeln!(file, "cadmium\theavy_metals\tUrinary cadmium (ug/L)").unwrap();
        writeln!(file, "lead\theavy_metals\tBlood lead (ug/dL)").unwrap();
        file.flush().unwrap();

        let dict = DataDictionary::from_tsv(file.path()).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.description("lead"), Some("Blood lead (ug/dL)"));
    }

    #[test]
    fn test_empty_dictionary_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name\tcategory\tdescription").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            DataDictionary::from_tsv(file.path()),
            Err(XwasError::EmptyData(_))
        ));
    }

    #[test]
    fn test_categories() {
        let dict = create_test_dictionary();
        assert_eq!(dict.categories(), vec!["heavy_metals", "phenols"]);
    }

    #[test]
    fn test_select_all_categories() {
        let dict = create_test_dictionary();
        let names = dict.select_exposures(&[], &[]);
        assert_eq!(names, vec!["bisphenol_a", "cadmium", "lead"]);
    }

    #[test]
    fn test_select_by_category() {
        let dict = create_test_dictionary();
        let names = dict.select_exposures(&["heavy_metals".to_string()], &[]);
        assert_eq!(names, vec!["cadmium", "lead"]);
    }

    #[test]
    fn test_select_with_exclusions() {
        let dict = create_test_dictionary();
        let names = dict.select_exposures(&["heavy_metals".to_string()], &["lead".to_string()]);
        assert_eq!(names, vec!["cadmium"]);
    }
}
