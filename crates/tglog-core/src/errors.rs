/// Core error type for the log forwarder.
///
/// Adapter crates map their transport errors into this type so callers of
/// `export` / `send_message` / `send_document` see one taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("telegram api error: {0}")]
    Api(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
