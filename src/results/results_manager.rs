// std imports
use std::{
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

// 3rd party imports
use metrics::counter;
use tracing::{debug, info, warn};

// local imports
use crate::{
    cache::result_cache::ResultCache,
    constants::{
        COUNTER_PREFIX, DEFAULT_FINAL_CACHE_FILE_NAME, DEFAULT_RESULTS_FILE_NAME,
        DEFAULT_SUMMARY_FILE_NAME,
    },
    errors::results_error::ResultsError,
    metrics::{
        analysis_context::AnalysisContext, metric_aggregator::MetricAggregator,
        metrics_record::MetricsRecord,
    },
    statistics::{statistical_result::StatisticalResults, test_runner::StatisticalTestRunner},
};

use super::cache_summary::CacheSummary;

/// Files written by the final statistical analysis
///
#[derive(Debug, Clone)]
pub struct OutputFiles {
    /// Long-format results, one row per database and test
    pub results_file: PathBuf,
    /// One row per test
    pub summary_file: PathBuf,
    /// Dump of all records including metrics derived by the tests
    pub final_cache_file: PathBuf,
}

impl OutputFiles {
    /// Default file names within the given directory
    ///
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            results_file: directory.join(DEFAULT_RESULTS_FILE_NAME),
            summary_file: directory.join(DEFAULT_SUMMARY_FILE_NAME),
            final_cache_file: directory.join(DEFAULT_FINAL_CACHE_FILE_NAME),
        }
    }
}

/// Owns the cache, computes the metrics of each database at most once and runs
/// the statistical analysis once all databases are processed.
///
/// [ResultsManager::process_database] can be called concurrently from several workers,
/// [ResultsManager::finalize_statistical_analysis] needs exclusive access, which is the barrier
/// between the per-database phase and the analysis.
///
pub struct ResultsManager {
    cache: ResultCache,
    aggregator: MetricAggregator,
    runner: StatisticalTestRunner,
    output_files: OutputFiles,
    is_finalized: bool,
}

impl ResultsManager {
    /// Creates a new results manager
    ///
    /// # Arguments
    /// * `cache` - Cache of already processed databases
    /// * `aggregator` - Computes the metrics of a database
    /// * `runner` - Statistical tests
    /// * `output_files` - Files written by the final analysis
    ///
    pub fn new(
        cache: ResultCache,
        aggregator: MetricAggregator,
        runner: StatisticalTestRunner,
        output_files: OutputFiles,
    ) -> Self {
        Self {
            cache,
            aggregator,
            runner,
            output_files,
            is_finalized: false,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn output_files(&self) -> &OutputFiles {
        &self.output_files
    }

    pub fn is_finalized(&self) -> bool {
        self.is_finalized
    }

    /// Returns the metrics record of the database. A cached record is returned unchanged
    /// unless `force_recompute` is set, otherwise the metrics are computed and persisted immediately.
    /// Failed databases are not cached, a previously cached record is only replaced on success.
    ///
    /// # Arguments
    /// * `context` - Analysis context of the database
    /// * `force_recompute` - Discards a cached record and recomputes it
    ///
    pub fn process_database(
        &self,
        context: &AnalysisContext,
        force_recompute: bool,
    ) -> Result<MetricsRecord, ResultsError> {
        let database_name = context.database_name();
        if !force_recompute {
            if let Some(record) = self.cache.try_get(database_name)? {
                debug!("[{}] Already cached", database_name);
                return Ok(record);
            }
        }

        let record = match self.aggregator.run_analysis(context) {
            Ok(record) => record,
            Err(err) => {
                counter!(format!("{}_failed_databases", COUNTER_PREFIX)).increment(1);
                return Err(err.into());
            }
        };
        self.cache.add_and_persist(record.clone())?;
        counter!(format!("{}_processed_databases", COUNTER_PREFIX)).increment(1);
        info!(
            "[{}] Processed, {} collector errors",
            database_name,
            record.errors().len()
        );
        Ok(record)
    }

    /// Splits the requested databases into cached ones and ones which need processing
    ///
    /// # Arguments
    /// * `database_names` - Requested databases
    ///
    pub fn get_cache_summary(&self, database_names: &[String]) -> Result<CacheSummary, ResultsError> {
        let mut cached = Vec::new();
        let mut needs_processing = Vec::new();
        for name in database_names {
            if self.cache.contains(name)? {
                cached.push(name.clone());
            } else {
                needs_processing.push(name.clone());
            }
        }
        Ok(CacheSummary {
            cached,
            needs_processing,
        })
    }

    /// Runs the statistical tests once over the given records, by default all cached records.
    /// Writes the results, the test summary and a dump of all records including derived metrics.
    ///
    /// # Arguments
    /// * `records` - Records to analyze, all cached records if None
    /// * `stop_flag` - Cooperative cancellation flag
    ///
    pub fn finalize_statistical_analysis(
        &mut self,
        records: Option<Vec<MetricsRecord>>,
        stop_flag: &AtomicBool,
    ) -> Result<StatisticalResults, ResultsError> {
        if self.is_finalized {
            return Err(ResultsError::AlreadyFinalized);
        }
        let mut records = match records {
            Some(records) => records,
            None => self.cache.records()?,
        };
        if records.is_empty() {
            warn!("No database records available, skipping statistical analysis");
            self.is_finalized = true;
            return Ok(StatisticalResults::empty(self.runner.alpha()));
        }

        info!(
            "Running {} statistical tests on {} databases",
            self.runner.test_count(),
            records.len()
        );
        let results = self.runner.run(&mut records, stop_flag)?;

        self.cache.update_records(&records)?;
        results.write_results(&self.output_files.results_file)?;
        results.write_summary(&self.output_files.summary_file)?;
        self.cache
            .write_all_to_file(&self.output_files.final_cache_file)?;
        self.is_finalized = true;

        info!(
            "{} significant results at alpha {}, results written to {}",
            results.significant().count(),
            results.alpha(),
            self.output_files.results_file.display()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::{
        constants::COMBINED_TEST_NAME,
        errors::{metric_error::MetricError, statistical_test_error::StatisticalTestError},
        metrics::analysis_context::{
            ContextValue, Identification, DATABASE_SIZE_FIELD, PEPTIDES_FIELD, PROTEIN_GROUPS_FIELD,
            PSMS_FIELD,
        },
        statistics::test_configuration::TestConfiguration,
        statistics::{
            gaussian_test::GaussianTest,
            negative_binomial_test::NegativeBinomialTest,
            statistical_test::{StatisticalTest, TailDirection, TestDescriptor, ValueExtractor},
        },
    };

    /// Context with `total` confident target PSMs of which `candidates` are unambiguous
    fn context(name: &str, candidates: usize, total: usize) -> AnalysisContext {
        let psms = (0..total)
            .map(|idx| Identification {
                id: format!("psm_{}", idx),
                score: 10.0 + (idx % 7) as f64,
                q_value: 0.001,
                is_decoy: false,
                is_ambiguous: idx >= candidates,
                ..Default::default()
            })
            .chain((0..20).map(|idx| Identification {
                id: format!("decoy_{}", idx),
                score: (idx % 5) as f64,
                q_value: 0.5,
                is_decoy: true,
                ..Default::default()
            }))
            .collect();
        AnalysisContext::new(name.to_string())
            .with_field(PSMS_FIELD, ContextValue::Identifications(psms))
            .with_field(PEPTIDES_FIELD, ContextValue::Identifications(Vec::new()))
            .with_field(PROTEIN_GROUPS_FIELD, ContextValue::Identifications(Vec::new()))
            .with_field(DATABASE_SIZE_FIELD, ContextValue::Scalar(1000.0))
    }

    fn tests() -> Vec<Box<dyn StatisticalTest>> {
        vec![
            Box::new(GaussianTest::new(
                TestDescriptor::new(
                    "Gaussian",
                    "Fraction of unambiguous PSMs",
                    ValueExtractor::ratio("unambiguous_psm_count", "target_psm_count"),
                ),
                TailDirection::Upper,
            )),
            Box::new(NegativeBinomialTest::new(
                TestDescriptor::new(
                    "NegativeBinomial",
                    "Unambiguous PSMs",
                    ValueExtractor::metric("unambiguous_psm_count"),
                ),
                TailDirection::Upper,
                Some("database_size".to_string()),
            )),
        ]
    }

    fn manager(dir: &TempDir) -> ResultsManager {
        ResultsManager::new(
            ResultCache::new(&dir.path().join("cache.tsv")).unwrap(),
            MetricAggregator::with_default_collectors(0.01),
            StatisticalTestRunner::new(tests()),
            OutputFiles::in_directory(&dir.path().join("out")),
        )
    }

    #[test]
    fn test_process_database_is_idempotent() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let context = context("db_a", 50, 1000);

        let first = manager.process_database(&context, false).unwrap();
        assert_eq!(manager.cache().write_count(), 1);
        let second = manager.process_database(&context, false).unwrap();
        assert_eq!(manager.cache().write_count(), 1);
        assert_eq!(first.to_metrics(), second.to_metrics());
        assert_eq!(first.unambiguous_psm_count(), 50.0);
        assert_eq!(first.target_psm_count(), 1000.0);

        // forcing recomputes and replaces the record with one rewrite
        manager.process_database(&context, true).unwrap();
        assert_eq!(manager.cache().write_count(), 2);
        assert_eq!(manager.cache().len().unwrap(), 1);
    }

    #[test]
    fn test_failed_recompute_keeps_cached_record() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        manager
            .process_database(&context("db_a", 50, 1000), false)
            .unwrap();

        let broken = AnalysisContext::new("db_a".to_string());
        assert!(manager.process_database(&broken, true).is_err());
        assert_eq!(manager.cache().write_count(), 1);

        let reloaded = ResultCache::new(&dir.path().join("cache.tsv")).unwrap();
        assert_eq!(
            reloaded.try_get("db_a").unwrap().unwrap().unambiguous_psm_count(),
            50.0
        );
    }

    #[test]
    fn test_failed_database_is_not_cached() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        let empty = AnalysisContext::new("db_empty".to_string());
        assert!(matches!(
            manager.process_database(&empty, false),
            Err(ResultsError::MetricError(MetricError::NoMetricsCollected(_, _)))
        ));
        assert!(!manager.cache().contains("db_empty").unwrap());
        assert_eq!(manager.cache().write_count(), 0);
    }

    #[test]
    fn test_cache_summary() {
        let dir = tempdir().unwrap();
        let manager = manager(&dir);
        manager.process_database(&context("db_a", 5, 100), false).unwrap();
        let summary = manager
            .get_cache_summary(&["db_a".to_string(), "db_b".to_string()])
            .unwrap();
        assert_eq!(summary.cached, vec!["db_a".to_string()]);
        assert_eq!(summary.needs_processing_count(), 1);
        manager.process_database(&context("db_b", 5, 100), false).unwrap();
        assert!(manager
            .get_cache_summary(&["db_a".to_string(), "db_b".to_string()])
            .unwrap()
            .is_fully_cached());
    }

    #[test]
    fn test_empty_finalize() {
        let dir = tempdir().unwrap();
        let mut manager = manager(&dir);
        let results = manager
            .finalize_statistical_analysis(None, &AtomicBool::new(false))
            .unwrap();
        assert!(results.is_empty());
        assert!(!manager.output_files().results_file.exists());
        assert!(matches!(
            manager.finalize_statistical_analysis(None, &AtomicBool::new(false)),
            Err(ResultsError::AlreadyFinalized)
        ));
    }

    #[test]
    fn test_cancelled_finalize_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut manager = manager(&dir);
        manager.process_database(&context("db_a", 5, 100), false).unwrap();
        manager.process_database(&context("db_b", 50, 100), false).unwrap();
        assert!(matches!(
            manager.finalize_statistical_analysis(None, &AtomicBool::new(true)),
            Err(ResultsError::StatisticalTestError(StatisticalTestError::Cancelled))
        ));
        assert!(!manager.output_files().results_file.exists());
        assert!(!manager.is_finalized());
    }

    #[test]
    fn test_end_to_end_ranking() {
        let dir = tempdir().unwrap();
        let databases = [("db_1", 50, 1000), ("db_2", 5, 1000), ("db_3", 500, 1000)];

        let mut rankings = Vec::new();
        for run in 0..2 {
            let mut manager = manager(&dir);
            for (name, candidates, total) in databases {
                manager
                    .process_database(&context(name, candidates, total), false)
                    .unwrap();
            }
            // second run is completely served from the cache file
            if run == 1 {
                assert_eq!(manager.cache().write_count(), 0);
            }
            let results = manager
                .finalize_statistical_analysis(None, &AtomicBool::new(false))
                .unwrap();
            assert_eq!(results.test_count(), 3);

            let mut combined: Vec<(String, f64)> = results
                .for_test(COMBINED_TEST_NAME)
                .map(|result| (result.database_name.clone(), result.p_value))
                .collect();
            assert!(combined.iter().all(|(_, p)| p.is_finite()));
            combined.sort_by(|a, b| a.1.total_cmp(&b.1));
            let ranking: Vec<String> = combined.into_iter().map(|(name, _)| name).collect();
            assert_eq!(ranking.first().map(String::as_str), Some("db_3"));
            assert_eq!(ranking.last().map(String::as_str), Some("db_2"));
            rankings.push(ranking);

            let output_files = manager.output_files();
            let content = fs::read_to_string(&output_files.results_file).unwrap();
            // header + 3 databases * (2 tests + combined)
            assert_eq!(content.lines().count(), 10);
            assert_eq!(
                fs::read_to_string(&output_files.summary_file).unwrap().lines().count(),
                4
            );
            assert!(output_files.final_cache_file.exists());
        }
        assert_eq!(rankings[0], rankings[1]);
    }

    #[test]
    fn test_ks_statistic_in_final_dump() {
        let dir = tempdir().unwrap();
        let mut manager = ResultsManager::new(
            ResultCache::new(&dir.path().join("cache.tsv")).unwrap(),
            MetricAggregator::with_default_collectors(0.01),
            StatisticalTestRunner::new(TestConfiguration::build_all(
                &TestConfiguration::default_roster(),
            )),
            OutputFiles::in_directory(dir.path()),
        );
        for (name, candidates) in [("db_1", 50), ("db_2", 5), ("db_3", 500)] {
            manager
                .process_database(&context(name, candidates, 1000), false)
                .unwrap();
        }
        manager
            .finalize_statistical_analysis(None, &AtomicBool::new(false))
            .unwrap();
        let final_dump =
            ResultCache::new(&manager.output_files().final_cache_file).unwrap();
        let record = final_dump.try_get("db_3").unwrap().unwrap();
        assert!(record
            .get_scalar("ks_statistic_UnambiguousScoreDistribution")
            .is_finite());
        // the working cache file is not touched by the analysis
        let cache = ResultCache::new(&dir.path().join("cache.tsv")).unwrap();
        assert!(cache
            .try_get("db_3")
            .unwrap()
            .unwrap()
            .additional_metrics()
            .is_empty());
    }
}
