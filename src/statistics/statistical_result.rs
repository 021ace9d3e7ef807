// std imports
use std::{fs::File, io::Write, path::Path};

// 3rd party imports
use csv::{Writer, WriterBuilder};

// local imports
use crate::{constants::RESULTS_SEPARATOR, errors::statistical_test_error::StatisticalTestError};

/// Header of the long-format results file
///
const RESULTS_HEADER: [&str; 6] = [
    "database_name",
    "test_name",
    "metric_name",
    "p_value",
    "q_value",
    "significant",
];

/// Header of the test summary file
///
const SUMMARY_HEADER: [&str; 4] = [
    "test_name",
    "description",
    "metric_name",
    "databases_evaluated",
];

/// Result of one test for one database
///
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalResult {
    pub database_name: String,
    pub test_name: String,
    pub metric_name: String,
    /// Raw p-value, NaN if the database was skipped
    pub p_value: f64,
    /// Corrected p-value, NaN if the database was skipped
    pub q_value: f64,
}

impl StatisticalResult {
    /// True if the corrected p-value is at most alpha. Never true for NaN.
    ///
    /// # Arguments
    /// * `alpha` - Significance level
    ///
    pub fn is_significant(&self, alpha: f64) -> bool {
        !self.q_value.is_nan() && self.q_value <= alpha
    }
}

/// Summary of one test
///
#[derive(Debug, Clone, PartialEq)]
pub struct TestSummary {
    pub test_name: String,
    pub description: String,
    pub metric_name: String,
    /// Number of databases with a non-NaN p-value
    pub databases_evaluated: usize,
}

/// Results of all tests including the combined pseudo-test
///
#[derive(Debug, Clone, Default)]
pub struct StatisticalResults {
    results: Vec<StatisticalResult>,
    summaries: Vec<TestSummary>,
    alpha: f64,
}

impl StatisticalResults {
    /// Creates new results
    ///
    /// # Arguments
    /// * `results` - Results in long format
    /// * `summaries` - One summary per test
    /// * `alpha` - Significance level reported in the results file
    ///
    pub fn new(results: Vec<StatisticalResult>, summaries: Vec<TestSummary>, alpha: f64) -> Self {
        Self {
            results,
            summaries,
            alpha,
        }
    }

    /// Results without any test, e.g. when there are no cached databases
    ///
    pub fn empty(alpha: f64) -> Self {
        Self::new(Vec::new(), Vec::new(), alpha)
    }

    pub fn results(&self) -> &[StatisticalResult] {
        &self.results
    }

    pub fn summaries(&self) -> &[TestSummary] {
        &self.summaries
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of tests in the results, the combined pseudo-test included
    ///
    pub fn test_count(&self) -> usize {
        self.summaries.len()
    }

    /// Results of one test
    ///
    pub fn for_test<'a>(&'a self, test_name: &'a str) -> impl Iterator<Item = &'a StatisticalResult> + 'a {
        self.results
            .iter()
            .filter(move |result| result.test_name == test_name)
    }

    /// Results of one database
    ///
    pub fn for_database<'a>(
        &'a self,
        database_name: &'a str,
    ) -> impl Iterator<Item = &'a StatisticalResult> + 'a {
        self.results
            .iter()
            .filter(move |result| result.database_name == database_name)
    }

    /// Returns the result of the given database and test
    ///
    pub fn get(&self, database_name: &str, test_name: &str) -> Option<&StatisticalResult> {
        self.results
            .iter()
            .find(|result| result.database_name == database_name && result.test_name == test_name)
    }

    /// Results significant at the configured alpha
    ///
    pub fn significant(&self) -> impl Iterator<Item = &StatisticalResult> {
        self.results
            .iter()
            .filter(|result| result.is_significant(self.alpha))
    }

    /// Writes the long-format results, one row per database and test
    ///
    /// # Arguments
    /// * `file_path` - Target file
    ///
    pub fn write_results(&self, file_path: &Path) -> Result<(), StatisticalTestError> {
        let path_str = file_path.display().to_string();
        let mut writer = create_writer(file_path)?;
        writer
            .write_record(RESULTS_HEADER)
            .map_err(|err| StatisticalTestError::WriteError(path_str.clone(), err))?;
        for result in self.results.iter() {
            writer
                .write_record([
                    result.database_name.as_str(),
                    result.test_name.as_str(),
                    result.metric_name.as_str(),
                    format_p_value(result.p_value).as_str(),
                    format_p_value(result.q_value).as_str(),
                    if result.is_significant(self.alpha) {
                        "true"
                    } else {
                        "false"
                    },
                ])
                .map_err(|err| StatisticalTestError::WriteError(path_str.clone(), err))?;
        }
        finish_writer(writer, path_str)
    }

    /// Writes the test summary, one row per test
    ///
    /// # Arguments
    /// * `file_path` - Target file
    ///
    pub fn write_summary(&self, file_path: &Path) -> Result<(), StatisticalTestError> {
        let path_str = file_path.display().to_string();
        let mut writer = create_writer(file_path)?;
        writer
            .write_record(SUMMARY_HEADER)
            .map_err(|err| StatisticalTestError::WriteError(path_str.clone(), err))?;
        for summary in self.summaries.iter() {
            writer
                .write_record([
                    summary.test_name.as_str(),
                    summary.description.as_str(),
                    summary.metric_name.as_str(),
                    summary.databases_evaluated.to_string().as_str(),
                ])
                .map_err(|err| StatisticalTestError::WriteError(path_str.clone(), err))?;
        }
        finish_writer(writer, path_str)
    }
}

fn format_p_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

fn create_writer(file_path: &Path) -> Result<Writer<File>, StatisticalTestError> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                StatisticalTestError::FileOpenError(file_path.display().to_string(), err)
            })?;
        }
    }
    let file = File::create(file_path)
        .map_err(|err| StatisticalTestError::FileOpenError(file_path.display().to_string(), err))?;
    Ok(WriterBuilder::new()
        .delimiter(RESULTS_SEPARATOR)
        .has_headers(false)
        .from_writer(file))
}

fn finish_writer(writer: Writer<File>, path_str: String) -> Result<(), StatisticalTestError> {
    let mut file = writer
        .into_inner()
        .map_err(|err| StatisticalTestError::FlushError(path_str.clone(), err.into_error()))?;
    file.flush()
        .map_err(|err| StatisticalTestError::FlushError(path_str, err))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn result(database_name: &str, test_name: &str, p_value: f64, q_value: f64) -> StatisticalResult {
        StatisticalResult {
            database_name: database_name.to_string(),
            test_name: test_name.to_string(),
            metric_name: "unambiguous_psm_count".to_string(),
            p_value,
            q_value,
        }
    }

    fn results() -> StatisticalResults {
        StatisticalResults::new(
            vec![
                result("db_a", "Gaussian", 0.001, 0.002),
                result("db_b", "Gaussian", 0.5, 0.5),
                result("db_c", "Gaussian", f64::NAN, f64::NAN),
            ],
            vec![TestSummary {
                test_name: "Gaussian".to_string(),
                description: "Normal distribution".to_string(),
                metric_name: "unambiguous_psm_count".to_string(),
                databases_evaluated: 2,
            }],
            0.05,
        )
    }

    #[test]
    fn test_significance() {
        assert!(result("db", "t", 0.01, 0.04).is_significant(0.05));
        assert!(!result("db", "t", 0.01, 0.06).is_significant(0.05));
        assert!(!result("db", "t", f64::NAN, f64::NAN).is_significant(1.0));

        let results = results();
        assert_eq!(results.significant().count(), 1);
        assert_eq!(results.for_test("Gaussian").count(), 3);
        assert_eq!(results.for_database("db_b").count(), 1);
        assert_eq!(results.get("db_a", "Gaussian").map(|r| r.p_value), Some(0.001));
        assert_eq!(results.test_count(), 1);
    }

    #[test]
    fn test_writers() {
        let dir = tempdir().unwrap();
        let results_path = dir.path().join("results.tsv");
        let summary_path = dir.path().join("summary.tsv");
        let results = results();
        results.write_results(&results_path).unwrap();
        results.write_summary(&summary_path).unwrap();

        let content = fs::read_to_string(&results_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "database_name\ttest_name\tmetric_name\tp_value\tq_value\tsignificant");
        assert_eq!(lines[1], "db_a\tGaussian\tunambiguous_psm_count\t0.001\t0.002\ttrue");
        assert_eq!(lines[3], "db_c\tGaussian\tunambiguous_psm_count\tNaN\tNaN\tfalse");

        let content = fs::read_to_string(&summary_path).unwrap();
        assert_eq!(
            content.lines().nth(1),
            Some("Gaussian\tNormal distribution\tunambiguous_psm_count\t2")
        );
    }
}
