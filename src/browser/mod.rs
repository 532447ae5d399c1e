//! Headless Chrome page session
//!
//! One tab is launched (or attached to) for a whole batch and reused for
//! every target. Extraction, labeling and outline collection run inside the
//! page through an injected runtime script.

pub mod config;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions, LoadSignal};
pub use session::{BrowserSession, TabScope};
