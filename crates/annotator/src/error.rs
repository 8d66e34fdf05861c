use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnnotatorError>;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("DOM error: {0}")]
    DomError(#[from] topic_helper_dom::DomError),

    #[error("Lookup error: {0}")]
    LookupError(#[from] topic_helper_lookup::LookupError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Annotator service is not running")]
    ServiceStopped,

    #[error("{0}")]
    Other(String),
}
