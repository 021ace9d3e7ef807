// std imports
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

// 3rd party imports
use anyhow::{bail, Context, Result};
use deadqueue::limited::Queue;
use tracing::{debug, error, info, warn};

// local imports
use crate::{
    cache::result_cache::ResultCache,
    errors::{results_error::ResultsError, statistical_test_error::StatisticalTestError},
    metrics::metric_aggregator::MetricAggregator,
    results::{cache_summary::CacheSummary, results_manager::ResultsManager},
    statistics::statistical_result::StatisticalResults,
};

use super::{
    configuration::ScreeningConfiguration,
    database_search::{DatabaseSearch, TransientDatabase},
    progress::ProgressCounter,
};

/// Screens a set of transient databases: searches all databases which are not cached yet
/// on a bounded worker pool, then runs the statistical analysis over all records.
///
pub struct Orchestrator<S>
where
    S: DatabaseSearch + 'static,
{
    search: Arc<S>,
    configuration: ScreeningConfiguration,
    result_dir: PathBuf,
    progress: Arc<ProgressCounter>,
}

impl<S> Orchestrator<S>
where
    S: DatabaseSearch + 'static,
{
    /// Creates a new orchestrator
    ///
    /// # Arguments
    /// * `search` - Search producing the analysis context of a database
    /// * `configuration` - Screening configuration
    /// * `result_dir` - Directory for cache and result files
    /// * `progress` - Progress of the per-database phase
    ///
    pub fn new(
        search: S,
        configuration: ScreeningConfiguration,
        result_dir: PathBuf,
        progress: Arc<ProgressCounter>,
    ) -> Self {
        Self {
            search: Arc::new(search),
            configuration,
            result_dir,
            progress,
        }
    }

    /// Runs the screening. Returns None if the run was cancelled.
    ///
    /// # Arguments
    /// * `databases` - Databases to screen
    /// * `stop_flag` - Cooperative cancellation flag, e.g. set on SIGINT
    ///
    pub async fn run(
        &self,
        databases: Vec<TransientDatabase>,
        stop_flag: Arc<AtomicBool>,
    ) -> Result<Option<StatisticalResults>> {
        let results_manager = build_results_manager(&self.configuration, &self.result_dir)?;
        let overwrite = self.configuration.orchestration.overwrite;

        let database_names: Vec<String> = databases.iter().map(|db| db.name.clone()).collect();
        let cache_summary = results_manager.get_cache_summary(&database_names)?;
        info!(
            "{} databases requested, {} cached, {} need processing",
            cache_summary.total(),
            cache_summary.cached_count(),
            cache_summary.needs_processing_count()
        );

        let mut results_manager = if cache_summary.is_fully_cached() && !overwrite {
            info!("All databases are cached, skipping search");
            self.progress.reset(0);
            results_manager
        } else {
            let jobs = select_jobs(databases, &cache_summary, overwrite);
            self.process_databases(jobs, results_manager, stop_flag.clone())
                .await?
        };

        if stop_flag.load(Ordering::Relaxed) {
            warn!("Screening cancelled, skipping statistical analysis");
            return Ok(None);
        }

        match results_manager.finalize_statistical_analysis(None, &stop_flag) {
            Ok(results) => Ok(Some(results)),
            Err(ResultsError::StatisticalTestError(StatisticalTestError::Cancelled)) => {
                warn!("Statistical analysis cancelled");
                Ok(None)
            }
            Err(err) => Err(err).context("Statistical analysis failed"),
        }
    }

    /// Searches and processes the given databases on the worker pool.
    /// Returns the results manager after all workers are joined.
    ///
    async fn process_databases(
        &self,
        jobs: Vec<TransientDatabase>,
        results_manager: ResultsManager,
        stop_flag: Arc<AtomicBool>,
    ) -> Result<ResultsManager> {
        let orchestration = &self.configuration.orchestration;
        let threads_per_job = orchestration.threads_per_job();
        let workers = orchestration.workers.max(1).min(jobs.len().max(1));
        info!(
            "Processing {} databases with {} workers, {} threads each",
            jobs.len(),
            workers,
            threads_per_job
        );
        self.progress.reset(jobs.len());

        let queue = Arc::new(Queue::new(jobs.len().max(1)));
        for job in jobs {
            if let Err(job) = queue.try_push(job) {
                bail!("[{}] Could not enqueue database", job.name);
            }
        }

        let results_manager = Arc::new(results_manager);
        let worker_handles: Vec<tokio::task::JoinHandle<()>> = (0..workers)
            .map(|_| {
                tokio::spawn(Self::work(
                    queue.clone(),
                    self.search.clone(),
                    results_manager.clone(),
                    self.progress.clone(),
                    threads_per_job,
                    orchestration.overwrite,
                    stop_flag.clone(),
                ))
            })
            .collect();

        for worker_handle in worker_handles {
            match worker_handle.await {
                Ok(_) => (),
                Err(e) => {
                    error!("Error joining worker: {:?}", e);
                }
            }
        }

        info!(
            "{} databases processed, {} failed",
            self.progress.processed(),
            self.progress.failed()
        );

        match Arc::try_unwrap(results_manager) {
            Ok(results_manager) => Ok(results_manager),
            Err(_) => bail!("Error unwrapping results manager"),
        }
    }

    /// Worker loop, takes databases from the queue until it is empty or the stop flag is set
    ///
    async fn work(
        queue: Arc<Queue<TransientDatabase>>,
        search: Arc<S>,
        results_manager: Arc<ResultsManager>,
        progress: Arc<ProgressCounter>,
        threads: usize,
        overwrite: bool,
        stop_flag: Arc<AtomicBool>,
    ) {
        loop {
            if stop_flag.load(Ordering::Relaxed) {
                debug!("Worker stopped");
                break;
            }
            let database = match queue.try_pop() {
                Some(database) => database,
                None => break,
            };

            debug!("[{}] Searching", database.name);
            let context = match search.search(&database, threads).await {
                Ok(context) => context,
                Err(err) => {
                    error!("[{}] Search failed: {:?}", database.name, err);
                    progress.increment_failed();
                    continue;
                }
            };
            if context.database_name() != database.name {
                error!(
                    "[{}] Search returned context of `{}`",
                    database.name,
                    context.database_name()
                );
                progress.increment_failed();
                continue;
            }

            match results_manager.process_database(&context, overwrite) {
                Ok(_) => progress.increment_processed(),
                Err(err) => {
                    error!("[{}] Processing failed: {}", database.name, err);
                    progress.increment_failed();
                }
            }
        }
    }
}

/// Databases to search: all if overwrite is requested, otherwise only uncached ones
///
fn select_jobs(
    databases: Vec<TransientDatabase>,
    cache_summary: &CacheSummary,
    overwrite: bool,
) -> Vec<TransientDatabase> {
    if overwrite {
        return databases;
    }
    databases
        .into_iter()
        .filter(|database| cache_summary.needs_processing.contains(&database.name))
        .collect()
}

/// Creates the results manager of a result directory
///
/// # Arguments
/// * `configuration` - Screening configuration
/// * `result_dir` - Directory for cache and result files
///
pub fn build_results_manager(
    configuration: &ScreeningConfiguration,
    result_dir: &Path,
) -> Result<ResultsManager> {
    std::fs::create_dir_all(result_dir).context("Could not create result directory")?;
    let cache = ResultCache::new(&configuration.cache_file_path(result_dir))
        .context("Could not open cache")?;
    Ok(ResultsManager::new(
        cache,
        MetricAggregator::with_default_collectors(configuration.analysis.fdr_threshold),
        configuration.statistics.build_runner(),
        configuration.output_files(result_dir),
    ))
}

/// Runs only the statistical analysis over all cached records of a result directory.
/// Returns None if cancelled.
///
/// # Arguments
/// * `configuration` - Screening configuration
/// * `result_dir` - Directory for cache and result files
/// * `stop_flag` - Cooperative cancellation flag
///
pub fn finalize(
    configuration: &ScreeningConfiguration,
    result_dir: &Path,
    stop_flag: &AtomicBool,
) -> Result<Option<StatisticalResults>> {
    let mut results_manager = build_results_manager(configuration, result_dir)?;
    match results_manager.finalize_statistical_analysis(None, stop_flag) {
        Ok(results) => Ok(Some(results)),
        Err(ResultsError::StatisticalTestError(StatisticalTestError::Cancelled)) => {
            warn!("Statistical analysis cancelled");
            Ok(None)
        }
        Err(err) => Err(err).context("Statistical analysis failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::atomic::AtomicUsize,
    };

    use super::*;
    use crate::{
        constants::COMBINED_TEST_NAME,
        metrics::analysis_context::{
            AnalysisContext, ContextValue, Identification, DATABASE_SIZE_FIELD, PEPTIDES_FIELD,
            PROTEIN_GROUPS_FIELD, PSMS_FIELD,
        },
        orchestration::configuration::OrchestrationConfiguration,
    };

    /// Search creating synthetic contexts, the number of unambiguous PSMs is taken
    /// from the database path's file name
    struct SyntheticSearch {
        calls: Arc<AtomicUsize>,
    }

    impl DatabaseSearch for SyntheticSearch {
        fn search(
            &self,
            database: &TransientDatabase,
            _threads: usize,
        ) -> impl Future<Output = Result<AnalysisContext>> + Send {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let name = database.name.clone();
            let candidates = database
                .path
                .to_str()
                .and_then(|path| path.parse::<usize>().ok());
            async move {
                let candidates = match candidates {
                    Some(candidates) => candidates,
                    None => bail!("[{}] unreadable database", name),
                };
                let psms = (0..1000)
                    .map(|idx| Identification {
                        id: format!("psm_{}", idx),
                        score: 5.0 + (idx % 11) as f64,
                        q_value: 0.001,
                        is_ambiguous: idx >= candidates,
                        ..Default::default()
                    })
                    .chain((0..30).map(|idx| Identification {
                        id: format!("decoy_{}", idx),
                        score: (idx % 6) as f64,
                        q_value: 0.5,
                        is_decoy: true,
                        ..Default::default()
                    }))
                    .collect();
                Ok(AnalysisContext::new(name)
                    .with_field(PSMS_FIELD, ContextValue::Identifications(psms))
                    .with_field(PEPTIDES_FIELD, ContextValue::Identifications(Vec::new()))
                    .with_field(PROTEIN_GROUPS_FIELD, ContextValue::Identifications(Vec::new()))
                    .with_field(DATABASE_SIZE_FIELD, ContextValue::Scalar(1000.0)))
            }
        }
    }

    fn databases() -> Vec<TransientDatabase> {
        [("db_1", "50"), ("db_2", "5"), ("db_3", "500")]
            .into_iter()
            .map(|(name, path)| TransientDatabase::new(name.to_string(), PathBuf::from(path)))
            .collect()
    }

    fn configuration(overwrite: bool) -> ScreeningConfiguration {
        ScreeningConfiguration {
            orchestration: OrchestrationConfiguration {
                workers: 2,
                total_threads: 4,
                overwrite,
            },
            ..Default::default()
        }
    }

    fn screening(
        result_dir: &Path,
        overwrite: bool,
    ) -> (Orchestrator<SyntheticSearch>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Orchestrator::new(
                SyntheticSearch {
                    calls: calls.clone(),
                },
                configuration(overwrite),
                result_dir.to_path_buf(),
                Arc::new(ProgressCounter::new()),
            ),
            calls,
        )
    }

    #[tokio::test]
    async fn test_screening_and_fast_path() {
        let dir = tempfile::tempdir().unwrap();

        let (orchestrator, calls) = screening(dir.path(), false);
        let results = orchestrator
            .run(databases(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(orchestrator.progress.processed(), 3);
        assert_eq!(results.for_test(COMBINED_TEST_NAME).count(), 3);
        assert!(dir.path().join("statistical_results.tsv").exists());

        // everything cached, search is never called
        let (orchestrator, calls) = screening(dir.path(), false);
        let cached_results = orchestrator
            .run(databases(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(cached_results.results().len(), results.results().len());
        for (cached, fresh) in cached_results.results().iter().zip(results.results()) {
            assert_eq!(cached.database_name, fresh.database_name);
            assert_eq!(cached.test_name, fresh.test_name);
            assert!(
                (cached.p_value.is_nan() && fresh.p_value.is_nan())
                    || (cached.p_value - fresh.p_value).abs() < 1e-12
            );
        }

        // overwrite searches everything again
        let (orchestrator, calls) = screening(dir.path(), true);
        orchestrator
            .run(databases(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_partial_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = screening(dir.path(), false);
        orchestrator
            .run(databases()[..2].to_vec(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        let (orchestrator, calls) = screening(dir.path(), false);
        orchestrator
            .run(databases(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failed_search_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut databases = databases();
        databases.push(TransientDatabase::new(
            "db_broken".to_string(),
            PathBuf::from("not-a-number"),
        ));
        let (orchestrator, _) = screening(dir.path(), false);
        let results = orchestrator
            .run(databases.clone(), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(orchestrator.progress.failed(), 1);
        assert_eq!(results.for_database("db_broken").count(), 0);

        let manager = build_results_manager(&configuration(false), dir.path()).unwrap();
        let names: Vec<String> = databases.iter().map(|db| db.name.clone()).collect();
        let summary = manager.get_cache_summary(&names).unwrap();
        assert_eq!(summary.needs_processing, vec!["db_broken".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, calls) = screening(dir.path(), false);
        let results = orchestrator
            .run(databases(), Arc::new(AtomicBool::new(true)))
            .await
            .unwrap();
        assert!(results.is_none());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(!dir.path().join("statistical_results.tsv").exists());
    }

    #[test]
    fn test_finalize_only() {
        let dir = tempfile::tempdir().unwrap();
        let results = finalize(&configuration(false), dir.path(), &AtomicBool::new(false))
            .unwrap()
            .unwrap();
        assert!(results.is_empty());
    }
}
