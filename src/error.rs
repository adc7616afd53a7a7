use thiserror::Error;

#[derive(Error, Debug)]
pub enum AckError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid filter pattern '{pattern}': {source}")]
    MalformedFilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AckError>;
