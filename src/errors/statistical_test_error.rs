use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatisticalTestError {
    #[error("Statistical analysis was cancelled")]
    Cancelled,
    #[error("[{0}] Invalid parameter: {1}")]
    InvalidParameter(String, String),
    #[error("Unable to open `{0}` for writing:\n\t{1}")]
    FileOpenError(String, std::io::Error),
    #[error("Unable to write `{0}`:\n\t{1}")]
    WriteError(String, csv::Error),
    #[error("Unable to flush `{0}`:\n\t{1}")]
    FlushError(String, std::io::Error),
}
