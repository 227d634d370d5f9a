use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sysfs read failed: {path}: {source}")]
    SysfsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse error for {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("i2c transfer failed on {device}: {source}")]
    I2c {
        device: PathBuf,
        source: std::io::Error,
    },

    #[error("calibration misconfigured: {0}")]
    Calibration(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("history file error: {0}")]
    State(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
