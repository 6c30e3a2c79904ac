//! 错误类型

/// Result type alias
pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encode/decode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    #[error("Camera not found: {0}")]
    CameraNotFound(usize),

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    /// Notification transport failure
    #[error("Notify error ({channel}): {reason}")]
    Notify { channel: String, reason: String },
}
