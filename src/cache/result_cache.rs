// std imports
use std::{
    fs::{create_dir_all, rename, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

// 3rd party imports
use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use metrics::counter;
use tracing::{debug, info, warn};

// local imports
use crate::{
    constants::{CACHE_SEPARATOR, COUNTER_PREFIX},
    errors::cache_error::CacheError,
    metrics::metrics_record::MetricsRecord,
};

use super::cache_entry::{CacheColumns, CacheEntry};

/// State guarded by the cache's exclusive section
///
struct CacheState {
    /// Records in insertion order
    records: IndexMap<String, MetricsRecord>,
    /// True if the file holds exactly the records in the current layout,
    /// so new rows can be appended instead of rewriting the file
    file_is_consistent: bool,
}

/// Durable mapping database name -> metrics record backed by a delimited file.
/// One exclusive section guards the in-memory index and the file, so the cache
/// can be shared between concurrently processing workers.
///
pub struct ResultCache {
    file_path: PathBuf,
    state: Mutex<CacheState>,
    write_count: AtomicU64,
}

impl ResultCache {
    /// Opens the cache, loading all records of an existing cache file.
    /// Malformed rows are skipped with a warning.
    ///
    /// # Arguments
    /// * `file_path` - Path of the cache file
    ///
    pub fn new(file_path: &Path) -> Result<Self, CacheError> {
        let (records, file_is_consistent) = if file_path.exists() {
            Self::load(file_path)?
        } else {
            debug!("No cache file at {}", file_path.display());
            (IndexMap::new(), false)
        };

        info!(
            "Loaded {} cached database records from {}",
            records.len(),
            file_path.display()
        );

        Ok(Self {
            file_path: file_path.to_path_buf(),
            state: Mutex::new(CacheState {
                records,
                file_is_consistent,
            }),
            write_count: AtomicU64::new(0),
        })
    }

    /// Reads the cache file.
    /// Returns the records and whether the file can be appended to as it is.
    ///
    fn load(file_path: &Path) -> Result<(IndexMap<String, MetricsRecord>, bool), CacheError> {
        let path_str = file_path.display().to_string();
        let mut reader = ReaderBuilder::new()
            .delimiter(CACHE_SEPARATOR)
            .has_headers(true)
            .flexible(true)
            .from_path(file_path)
            .map_err(|err| CacheError::HeaderReadError(path_str.clone(), err))?;

        let header = reader
            .headers()
            .map_err(|err| CacheError::HeaderReadError(path_str.clone(), err))?
            .clone();
        if header.is_empty() {
            return Ok((IndexMap::new(), false));
        }
        let columns = CacheColumns::from_header(&header)?;
        // a file not ending with a line break was cut while appending
        let mut is_consistent =
            columns.matches_current_header() && Self::ends_with_line_break(file_path)?;
        let mut records = IndexMap::new();

        for (row_idx, row) in reader.records().enumerate() {
            // header is line 1
            let line = row_idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!("Skipping unreadable cache row at line {}: {}", line, err);
                    is_consistent = false;
                    continue;
                }
            };
            match CacheEntry::from_row(&columns, &row) {
                Ok(record) => {
                    if records
                        .insert(record.database_name().to_string(), record)
                        .is_some()
                    {
                        // duplicated row, last one wins, rewrite on next persist
                        is_consistent = false;
                    }
                }
                Err(err) => {
                    warn!("Skipping malformed cache row at line {}: {}", line, err);
                    is_consistent = false;
                }
            }
        }
        Ok((records, is_consistent))
    }

    fn ends_with_line_break(file_path: &Path) -> Result<bool, CacheError> {
        let mut file = File::open(file_path)
            .map_err(|err| CacheError::FileOpenError(file_path.display().to_string(), err))?;
        let mut last_byte = [0u8; 1];
        let is_terminated = file
            .seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last_byte))
            .map(|_| last_byte[0] == b'\n')
            .map_err(|err| CacheError::FileOpenError(file_path.display().to_string(), err))?;
        Ok(is_terminated)
    }

    fn lock(&self, hint: &'static str) -> Result<MutexGuard<'_, CacheState>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::PoisonedLock(hint))
    }

    /// Returns the path of the backing file
    ///
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Number of writes to the backing file since the cache was opened
    ///
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Checks if a record for the database exists
    ///
    pub fn contains(&self, database_name: &str) -> Result<bool, CacheError> {
        Ok(self
            .lock("checking for database")?
            .records
            .contains_key(database_name))
    }

    /// Returns a copy of the record for the database if cached
    ///
    pub fn try_get(&self, database_name: &str) -> Result<Option<MetricsRecord>, CacheError> {
        Ok(self
            .lock("getting record")?
            .records
            .get(database_name)
            .cloned())
    }

    /// Number of cached records
    ///
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.lock("counting records")?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Names of all cached databases in insertion order
    ///
    pub fn database_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .lock("listing database names")?
            .records
            .keys()
            .cloned()
            .collect())
    }

    /// Copies of all cached records in insertion order
    ///
    pub fn records(&self) -> Result<Vec<MetricsRecord>, CacheError> {
        Ok(self
            .lock("listing records")?
            .records
            .values()
            .cloned()
            .collect())
    }

    /// Inserts the record and persists it immediately.
    /// New records are appended, replacing an existing record rewrites the whole file.
    /// If writing fails the in-memory index is restored.
    ///
    /// # Arguments
    /// * `record` - Record to add
    ///
    pub fn add_and_persist(&self, record: MetricsRecord) -> Result<(), CacheError> {
        let row = CacheEntry::to_row(&record)?;
        let database_name = record.database_name().to_string();

        let mut state = self.lock("adding record")?;
        let previous = state.records.insert(database_name.clone(), record);

        let write_result = if previous.is_some() || !state.file_is_consistent {
            Self::write_file(&self.file_path, state.records.values())
        } else {
            self.append_row(&row)
        };

        match write_result {
            Ok(_) => {
                state.file_is_consistent = true;
                self.count_write();
                debug!("[{}] Persisted to cache", database_name);
                Ok(())
            }
            Err(err) => {
                match previous {
                    Some(previous) => {
                        state.records.insert(database_name, previous);
                    }
                    None => {
                        state.records.shift_remove(&database_name);
                    }
                }
                state.file_is_consistent = false;
                Err(err)
            }
        }
    }

    /// Removes the record of the given database and rewrites the file.
    /// Returns false if the database was not cached.
    ///
    /// # Arguments
    /// * `database_name` - Name of the database
    ///
    pub fn remove(&self, database_name: &str) -> Result<bool, CacheError> {
        let mut state = self.lock("removing record")?;
        if state.records.shift_remove(database_name).is_none() {
            return Ok(false);
        }
        match Self::write_file(&self.file_path, state.records.values()) {
            Ok(_) => {
                state.file_is_consistent = true;
                self.count_write();
                debug!("[{}] Removed from cache", database_name);
                Ok(true)
            }
            Err(err) => {
                state.file_is_consistent = false;
                Err(err)
            }
        }
    }

    /// Replaces the in-memory records of already cached databases, e.g. to attach
    /// values derived by the statistical tests before [ResultCache::write_all_to_file].
    /// The backing file is not touched. Records of unknown databases are ignored.
    ///
    /// # Arguments
    /// * `records` - Updated records
    ///
    pub fn update_records(&self, records: &[MetricsRecord]) -> Result<(), CacheError> {
        let mut state = self.lock("updating records")?;
        for record in records {
            if let Some(cached) = state.records.get_mut(record.database_name()) {
                *cached = record.clone();
                state.file_is_consistent = false;
            }
        }
        Ok(())
    }

    /// Writes all cached records to the given file
    ///
    /// # Arguments
    /// * `file_path` - Target file
    ///
    pub fn write_all_to_file(&self, file_path: &Path) -> Result<(), CacheError> {
        let mut state = self.lock("writing all records")?;
        Self::write_file(file_path, state.records.values())?;
        if file_path == self.file_path {
            state.file_is_consistent = true;
            self.count_write();
        }
        Ok(())
    }

    fn count_write(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        counter!(format!("{}_cache_writes", COUNTER_PREFIX)).increment(1);
    }

    fn append_row(&self, row: &[String]) -> Result<(), CacheError> {
        let path_str = self.file_path.display().to_string();
        let file = OpenOptions::new()
            .append(true)
            .open(&self.file_path)
            .map_err(|err| CacheError::FileOpenError(path_str.clone(), err))?;
        let mut writer = WriterBuilder::new()
            .delimiter(CACHE_SEPARATOR)
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(row)
            .map_err(|err| CacheError::WriteError(path_str.clone(), err))?;
        writer
            .flush()
            .map_err(|err| CacheError::FlushError(path_str, err))
    }

    /// Writes header and records into a temporary file next to the target and moves it in place
    ///
    fn write_file<'a>(
        file_path: &Path,
        records: impl Iterator<Item = &'a MetricsRecord>,
    ) -> Result<(), CacheError> {
        let path_str = file_path.display().to_string();
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)
                    .map_err(|err| CacheError::DirectoryCreationError(path_str.clone(), err))?;
            }
        }

        let mut tmp_file_name = file_path.file_name().unwrap_or_default().to_os_string();
        tmp_file_name.push(".tmp");
        let tmp_path = file_path.with_file_name(tmp_file_name);

        let file = File::create(&tmp_path)
            .map_err(|err| CacheError::FileOpenError(tmp_path.display().to_string(), err))?;
        let mut writer = WriterBuilder::new()
            .delimiter(CACHE_SEPARATOR)
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(CacheEntry::header())
            .map_err(|err| CacheError::WriteError(path_str.clone(), err))?;
        for record in records {
            writer
                .write_record(CacheEntry::to_row(record)?)
                .map_err(|err| CacheError::WriteError(path_str.clone(), err))?;
        }
        let mut file = writer
            .into_inner()
            .map_err(|err| CacheError::FlushError(path_str.clone(), err.into_error()))?;
        file.flush()
            .map_err(|err| CacheError::FlushError(path_str.clone(), err))?;
        rename(&tmp_path, file_path).map_err(|err| CacheError::FileOpenError(path_str, err))
    }
}
