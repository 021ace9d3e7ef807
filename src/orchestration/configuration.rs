// std imports
use std::path::{Path, PathBuf};

// local imports
use crate::{
    constants::{
        DEFAULT_CACHE_FILE_NAME, DEFAULT_FINAL_CACHE_FILE_NAME, DEFAULT_RESULTS_FILE_NAME,
        DEFAULT_SUMMARY_FILE_NAME,
    },
    errors::configuration_error::ConfigurationError,
    results::results_manager::OutputFiles,
    statistics::{
        multiple_testing::CorrectionMethod, p_value_combination::CombinationMethod,
        test_configuration::TestConfiguration, test_runner::{StatisticalTestRunner, DEFAULT_ALPHA},
    },
};

/// Cache configuration
///
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CacheConfiguration {
    /// Cache file, relative paths are resolved against the result directory
    pub file_path: PathBuf,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from(DEFAULT_CACHE_FILE_NAME),
        }
    }
}

/// Files written by the final analysis, relative paths are resolved against the result directory
///
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfiguration {
    pub results_file: PathBuf,
    pub summary_file: PathBuf,
    pub final_cache_file: PathBuf,
}

impl Default for OutputConfiguration {
    fn default() -> Self {
        Self {
            results_file: PathBuf::from(DEFAULT_RESULTS_FILE_NAME),
            summary_file: PathBuf::from(DEFAULT_SUMMARY_FILE_NAME),
            final_cache_file: PathBuf::from(DEFAULT_FINAL_CACHE_FILE_NAME),
        }
    }
}

/// Worker pool configuration
///
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OrchestrationConfiguration {
    /// Number of databases searched concurrently
    pub workers: usize,
    /// Threads shared by all workers, 0 uses all available cores
    pub total_threads: usize,
    /// Recompute databases which are already cached
    pub overwrite: bool,
}

impl OrchestrationConfiguration {
    /// Number of threads shared by all workers
    ///
    pub fn resolved_total_threads(&self) -> usize {
        if self.total_threads > 0 {
            return self.total_threads;
        }
        std::thread::available_parallelism()
            .map(|cores| cores.get())
            .unwrap_or(1)
    }

    /// Threads available to each concurrently running search, at least one
    ///
    pub fn threads_per_job(&self) -> usize {
        (self.resolved_total_threads() / self.workers.max(1)).max(1)
    }
}

impl Default for OrchestrationConfiguration {
    fn default() -> Self {
        Self {
            workers: 2,
            total_threads: 0,
            overwrite: false,
        }
    }
}

/// Metric collection configuration
///
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AnalysisConfiguration {
    /// Maximum q-value of counted identifications
    pub fdr_threshold: f64,
}

impl Default for AnalysisConfiguration {
    fn default() -> Self {
        Self {
            fdr_threshold: 0.01,
        }
    }
}

/// Statistical analysis configuration
///
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StatisticsConfiguration {
    pub correction: CorrectionMethod,
    /// Adds the combined pseudo-test
    pub combine_p_values: bool,
    pub combination_method: CombinationMethod,
    /// Significance level for the corrected p-values
    pub alpha: f64,
    /// Tests, executed in the given order
    pub tests: Vec<TestConfiguration>,
}

impl StatisticsConfiguration {
    /// Creates the test runner
    ///
    pub fn build_runner(&self) -> StatisticalTestRunner {
        StatisticalTestRunner::new(TestConfiguration::build_all(&self.tests))
            .with_correction(self.correction)
            .with_combination(if self.combine_p_values {
                Some(self.combination_method)
            } else {
                None
            })
            .with_alpha(self.alpha)
    }
}

impl Default for StatisticsConfiguration {
    fn default() -> Self {
        Self {
            correction: CorrectionMethod::default(),
            combine_p_values: true,
            combination_method: CombinationMethod::default(),
            alpha: DEFAULT_ALPHA,
            tests: TestConfiguration::default_roster(),
        }
    }
}

/// Configuration of a screening run
///
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScreeningConfiguration {
    pub cache: CacheConfiguration,
    pub output: OutputConfiguration,
    pub orchestration: OrchestrationConfiguration,
    pub analysis: AnalysisConfiguration,
    pub statistics: StatisticsConfiguration,
}

impl ScreeningConfiguration {
    /// Reads and validates the configuration from a TOML file
    ///
    /// # Arguments
    /// * `file_path` - Path of the configuration file
    ///
    pub fn from_file(file_path: &Path) -> Result<Self, ConfigurationError> {
        let path_str = file_path.display().to_string();
        let content = std::fs::read_to_string(file_path)
            .map_err(|err| ConfigurationError::FileReadError(path_str.clone(), err))?;
        let configuration: Self = toml::from_str(&content)
            .map_err(|err| ConfigurationError::DeserializationError(path_str, err))?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Serializes the configuration to TOML
    ///
    pub fn to_toml(&self) -> Result<String, ConfigurationError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the value ranges
    ///
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.orchestration.workers == 0 {
            return Err(ConfigurationError::InvalidValue(
                "orchestration.workers",
                "must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.analysis.fdr_threshold) {
            return Err(ConfigurationError::InvalidValue(
                "analysis.fdr_threshold",
                self.analysis.fdr_threshold.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.statistics.alpha) {
            return Err(ConfigurationError::InvalidValue(
                "statistics.alpha",
                self.statistics.alpha.to_string(),
            ));
        }
        let mut names: Vec<&str> = self.statistics.tests.iter().map(|test| test.name()).collect();
        names.sort_unstable();
        if let Some(duplicate) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigurationError::InvalidValue(
                "statistics.tests",
                format!("duplicate test name `{}`", duplicate[0]),
            ));
        }
        Ok(())
    }

    /// Resolves the cache file against the result directory
    ///
    pub fn cache_file_path(&self, result_dir: &Path) -> PathBuf {
        result_dir.join(&self.cache.file_path)
    }

    /// Resolves the output files against the result directory
    ///
    pub fn output_files(&self, result_dir: &Path) -> OutputFiles {
        OutputFiles {
            results_file: result_dir.join(&self.output.results_file),
            summary_file: result_dir.join(&self.output.summary_file),
            final_cache_file: result_dir.join(&self.output.final_cache_file),
        }
    }
}
