use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("root container `{0}` not found on page")]
    MissingContainer(String),

    #[error("no table with header row {0:?}")]
    TableNotFound(Vec<String>),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Decoded document does not map back onto a tagged tree.
    #[error("document shape: {0}")]
    Shape(String),

    #[error("config: {0}")]
    Config(String),
}

impl From<quick_xml::events::attributes::AttrError> for FeedError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        FeedError::Xml(e.into())
    }
}

impl From<config::ConfigError> for FeedError {
    fn from(e: config::ConfigError) -> Self {
        FeedError::Config(e.to_string())
    }
}
