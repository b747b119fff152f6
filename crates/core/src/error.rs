use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameQueueError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config error: {0}")]
    Config(String),
}
