use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Error when the lock is poisoned. String is a hint to the operation being done when it happend
    #[error("[ResultCache] Poisened cache lock while `{0}`")]
    PoisonedLock(&'static str),
    #[error("[ResultCache] Unable to open `{0}`:\n\t{1}")]
    FileOpenError(String, std::io::Error),
    #[error("[ResultCache] Unable to create directory for `{0}`:\n\t{1}")]
    DirectoryCreationError(String, std::io::Error),
    #[error("[ResultCache] Unable to write `{0}`:\n\t{1}")]
    WriteError(String, csv::Error),
    #[error("[ResultCache] Unable to flush `{0}`:\n\t{1}")]
    FlushError(String, std::io::Error),
    #[error("[ResultCache] Unable to read header of `{0}`:\n\t{1}")]
    HeaderReadError(String, csv::Error),
    #[error("[ResultCache] Missing column `{0}` in cache header")]
    MissingColumn(&'static str),
    /// Row with a different number of columns than the header, e.g. a truncated last line
    #[error("[ResultCache] Row has {1} columns, header has {0}")]
    ColumnCountMismatch(usize, usize),
    #[error("[ResultCache] Record without database name")]
    EmptyDatabaseName,
    /// Malformed row, contains the column and the offending value
    #[error("[ResultCache] Malformed value `{1}` in column `{0}`")]
    MalformedValue(String, String),
    #[error("[ResultCache] Unable to parse errors column:\n\t{0}")]
    ErrorsColumnError(serde_json::Error),
}
