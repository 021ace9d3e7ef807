use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricError {
    #[error("Missing context field `{0}`")]
    MissingContextField(String),
    #[error("Context field `{0}` is not a {1}")]
    ContextFieldTypeMismatch(String, &'static str),
    #[error("Invalid value in `{0}`: {1}")]
    InvalidValue(String, String),
    /// None of the collectors produced metrics. Contains the database name and the collected errors.
    #[error("[{0}] No metrics collected:\n\t{1}")]
    NoMetricsCollected(String, String),
}
