// std imports
use std::{
    future::Future,
    path::{Path, PathBuf},
};

// 3rd party imports
use anyhow::{bail, Context, Result};
use glob::glob;
use tracing::debug;

// local imports
use crate::metrics::analysis_context::AnalysisContext;

/// File extension of exported analysis contexts
///
const CONTEXT_FILE_EXTENSION: &str = "json";

/// One transient database to screen
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientDatabase {
    /// Unique name
    pub name: String,
    /// Location of the database, interpreted by the search
    pub path: PathBuf,
}

impl TransientDatabase {
    pub fn new(name: String, path: PathBuf) -> Self {
        Self { name, path }
    }
}

/// Searches the spectra against one transient database and post-processes the identifications
/// into the analysis context the metric collectors work on.
///
pub trait DatabaseSearch: Send + Sync {
    /// Runs the search for the given database
    ///
    /// # Arguments
    /// * `database` - Database to search
    /// * `threads` - Number of threads the search may use
    ///
    fn search(
        &self,
        database: &TransientDatabase,
        threads: usize,
    ) -> impl Future<Output = Result<AnalysisContext>> + Send;
}

/// Search backed by analysis contexts exported by an external search engine,
/// one JSON file `<database name>.json` per database.
///
pub struct ContextFileSearch {
    context_dir: PathBuf,
}

impl ContextFileSearch {
    /// Creates a new file backed search
    ///
    /// # Arguments
    /// * `context_dir` - Directory containing the context files
    ///
    pub fn new(context_dir: PathBuf) -> Self {
        Self { context_dir }
    }

    /// Path of the context file of the given database
    ///
    pub fn context_file_path(&self, database_name: &str) -> PathBuf {
        self.context_dir
            .join(format!("{}.{}", database_name, CONTEXT_FILE_EXTENSION))
    }

    /// Database backed by its context file in the context directory
    ///
    /// # Arguments
    /// * `database_name` - Name of the database
    ///
    pub fn database(&self, database_name: &str) -> TransientDatabase {
        TransientDatabase::new(
            database_name.to_string(),
            self.context_file_path(database_name),
        )
    }

    /// Lists all databases with a context file in the given directory, sorted by name
    ///
    /// # Arguments
    /// * `context_dir` - Directory containing the context files
    ///
    pub fn discover(context_dir: &Path) -> Result<Vec<TransientDatabase>> {
        let pattern = context_dir.join(format!("*.{}", CONTEXT_FILE_EXTENSION));
        let pattern = pattern
            .to_str()
            .context("Context directory is not valid UTF-8")?;
        let mut databases = Vec::new();
        for path in glob(pattern).context("Invalid context file pattern")? {
            let path = path.context("Unable to read context directory entry")?;
            let name = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };
            databases.push(TransientDatabase::new(name, path));
        }
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(databases)
    }

    fn read_context(path: &Path, database_name: &str) -> Result<AnalysisContext> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("[{}] Unable to read {}", database_name, path.display()))?;
        let context: AnalysisContext = serde_json::from_str(&content)
            .with_context(|| format!("[{}] Unable to parse {}", database_name, path.display()))?;
        if context.database_name() != database_name {
            bail!(
                "[{}] Context file {} belongs to `{}`",
                database_name,
                path.display(),
                context.database_name()
            );
        }
        Ok(context)
    }
}

impl DatabaseSearch for ContextFileSearch {
    fn search(
        &self,
        database: &TransientDatabase,
        _threads: usize,
    ) -> impl Future<Output = Result<AnalysisContext>> + Send {
        let path = database.path.clone();
        let database_name = database.name.clone();
        async move {
            debug!("[{}] Reading context from {}", database_name, path.display());
            tokio::task::spawn_blocking(move || Self::read_context(&path, &database_name))
                .await
                .context("Context reader panicked")?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::analysis_context::{ContextValue, PSMS_FIELD};

    #[tokio::test]
    async fn test_context_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["db_b", "db_a"] {
            let context = AnalysisContext::new(name.to_string())
                .with_field(PSMS_FIELD, ContextValue::Scores(vec![1.0, 2.0]));
            std::fs::write(
                dir.path().join(format!("{}.json", name)),
                serde_json::to_string(&context).unwrap(),
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("ignored.txt"), "").unwrap();

        let databases = ContextFileSearch::discover(dir.path()).unwrap();
        let names: Vec<&str> = databases.iter().map(|db| db.name.as_str()).collect();
        assert_eq!(names, vec!["db_a", "db_b"]);

        let search = ContextFileSearch::new(dir.path().to_path_buf());
        let context = search.search(&databases[0], 1).await.unwrap();
        assert_eq!(context.database_name(), "db_a");
        assert!(context.has_field(PSMS_FIELD));

        let db_a = search.database("db_a");
        assert_eq!(db_a.name, databases[0].name);
        assert_eq!(db_a.path.file_name(), databases[0].path.file_name());
        assert!(search.search(&search.database("db_c"), 1).await.is_err());

        // the database's path is read, not one derived from its name
        let moved = TransientDatabase::new("db_b".to_string(), dir.path().join("db_b.json"));
        let renamed = dir.path().join("renamed.json.bak");
        std::fs::rename(&moved.path, &renamed).unwrap();
        assert!(search.search(&moved, 1).await.is_err());
        let relocated = TransientDatabase::new("db_b".to_string(), renamed);
        assert_eq!(
            search.search(&relocated, 1).await.unwrap().database_name(),
            "db_b"
        );
    }

    #[tokio::test]
    async fn test_mismatching_database_name() {
        let dir = tempfile::tempdir().unwrap();
        let context = AnalysisContext::new("other".to_string());
        std::fs::write(
            dir.path().join("db_a.json"),
            serde_json::to_string(&context).unwrap(),
        )
        .unwrap();
        let search = ContextFileSearch::new(dir.path().to_path_buf());
        assert!(search.search(&search.database("db_a"), 1).await.is_err());
    }
}
