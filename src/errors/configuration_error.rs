use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unable to read configuration file `{0}`:\n\t{1}")]
    FileReadError(String, std::io::Error),
    #[error("Unable to deserialize configuration `{0}`:\n\t{1}")]
    DeserializationError(String, toml::de::Error),
    #[error("Unable to serialize configuration:\n\t{0}")]
    SerializationError(#[from] toml::ser::Error),
    #[error("Invalid value for `{0}`: {1}")]
    InvalidValue(&'static str, String),
}
