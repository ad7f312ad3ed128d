use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not specified")]
    MissingCredential(&'static str),

    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("no download-directory configured for site {0:?} and no default")]
    NoDownloadDirectory(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("bad selector {0:?}")]
    Selector(String),

    #[error("page {url} has no {what}")]
    MissingElement { url: String, what: String },

    #[error("response from {url} has no {header} header")]
    MissingHeader { url: String, header: &'static str },

    #[error("unexpected row in resource listing: {0}")]
    Row(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("portal: {0}")]
    Portal(String),
}

impl Error {
    pub fn missing(url: impl ToString, what: impl Into<String>) -> Self {
        Error::MissingElement {
            url: url.to_string(),
            what: what.into(),
        }
    }
}
