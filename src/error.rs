use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(
        "no reachable download endpoint; likely CORS, mixed content (http on an https page), \
         or the server is down"
    )]
    NoReachableEndpoint,

    #[error("download failed: {0}")]
    Download(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("test cancelled")]
    Cancelled,

    #[error("http client setup: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
