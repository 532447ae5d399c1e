use std::path::PathBuf;
use std::time::Duration;

/// Page load signal to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LoadSignal {
    /// Navigation committed and the DOM is ready
    DomContentLoaded,
    /// `document.readyState` reached `complete`
    Load,
    /// No new network resources for a quiet period
    NetworkIdle,
}

/// Options for launching a new browser instance
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run browser in headless mode
    pub headless: bool,

    /// Custom Chrome/Chromium binary path
    pub chrome_path: Option<PathBuf>,

    /// Browser window width (also the layout viewport width)
    pub window_width: u32,

    /// Browser window height
    pub window_height: u32,

    /// User data directory for browser profile
    pub user_data_dir: Option<PathBuf>,

    /// Enable sandbox mode
    pub sandbox: bool,

    /// Upper bound for loading one page, across all load signals
    pub navigation_timeout: Duration,

    /// Signals that must be observed before a page counts as loaded
    pub load_signals: Vec<LoadSignal>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_width: 1920,
            window_height: 1080,
            user_data_dir: None,
            sandbox: true,
            navigation_timeout: Duration::from_secs(60),
            load_signals: vec![LoadSignal::DomContentLoaded, LoadSignal::Load],
        }
    }
}

impl LaunchOptions {
    /// Create new launch options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Builder method: set Chrome binary path
    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Builder method: set window size
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Builder method: set user data directory
    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    /// Builder method: set sandbox mode
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Builder method: set the per-page load timeout
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Builder method: set the load signals to wait for
    pub fn load_signals(mut self, signals: Vec<LoadSignal>) -> Self {
        self.load_signals = signals;
        self
    }
}

/// Options for connecting to an existing browser instance
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// WebSocket URL for Chrome DevTools Protocol
    pub ws_url: String,

    /// Upper bound for loading one page
    pub navigation_timeout: Duration,

    /// Signals that must be observed before a page counts as loaded
    pub load_signals: Vec<LoadSignal>,
}

impl ConnectionOptions {
    /// Create connection options for a DevTools WebSocket URL
    pub fn new(ws_url: impl Into<String>) -> Self {
        let defaults = LaunchOptions::default();
        Self {
            ws_url: ws_url.into(),
            navigation_timeout: defaults.navigation_timeout,
            load_signals: defaults.load_signals,
        }
    }

    /// Builder method: set the per-page load timeout
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }
}
