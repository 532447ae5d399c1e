use thiserror::Error;

/// Errors raised while loading pages, extracting features or talking to the classifier
#[derive(Debug, Error)]
pub enum PageError {
    /// The browser could not be launched
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Navigation could not be started
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// The page did not reach the requested load state in time
    #[error("Navigation timeout: {0}")]
    NavigationTimeout(String),

    /// A script evaluated inside the page failed
    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The snapshot returned by the page could not be decoded
    #[error("Failed to parse DOM snapshot: {0}")]
    DomParseFailed(String),

    /// A selector path matched no element
    #[error("Selector '{path}' matched no element")]
    SelectorMiss { path: String },

    /// A dataset row could not be formatted
    #[error("Cannot serialize element {id}: {reason}")]
    SerializationFailure { id: u32, reason: String },

    /// The classifier process exited abnormally or reported on stderr
    #[error("Classifier process failed: {0}")]
    SubprocessFailure(String),

    /// The classifier response did not contain the expected id lists
    #[error("Cannot parse classifier response: {0}")]
    ResponseParseFailure(String),

    /// The run configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Capturing or writing a screenshot failed
    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    /// The page backend does not support the operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Result type alias for page operations
pub type Result<T> = std::result::Result<T, PageError>;
