use crate::{browser::config::{ConnectionOptions, LaunchOptions, LoadSignal},
            dom::{DomScope, ElementFeatures, LABEL_ATTRIBUTE, Label, LabelReport, PageDriver, PageSnapshot, SelectorPath,
                  resolve_labels},
            error::{PageError, Result},
            screenshot::{self, OutlineSet}};
use headless_chrome::{Browser, Element, Tab, protocol::cdp::Page::CaptureScreenshotFormatOption, types::Bounds};
use std::{ffi::OsStr,
          path::Path,
          sync::Arc,
          time::{Duration, Instant}};

/// Script defining `window.__pageFeatures` inside the page
const PAGE_RUNTIME: &str = include_str!("page_runtime.js");

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_QUIET_PERIOD: Duration = Duration::from_millis(500);

// Chrome refuses to allocate capture surfaces much taller than this
const MAX_CAPTURE_HEIGHT: f64 = 16_384.0;

/// Selector scope over the live DOM of a tab
pub struct TabScope<'a> {
    tab: &'a Tab,
}

impl<'a> TabScope<'a> {
    pub fn new(tab: &'a Tab) -> Self {
        Self { tab }
    }
}

impl<'a> DomScope for TabScope<'a> {
    type Node = Element<'a>;

    fn body(&self) -> Option<Element<'a>> {
        self.tab.find_element("body").ok()
    }

    fn query_all(&self, scope: &Element<'a>, css: &str) -> Result<Vec<Element<'a>>> {
        // headless_chrome reports an empty match as an error
        match scope.find_elements(css) {
            Ok(elements) => Ok(elements),
            Err(e) => {
                log::debug!("No match for '{}': {}", css, e);
                Ok(Vec::new())
            }
        }
    }
}

/// Browser session owning the single tab a batch runs in
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,

    /// Tab reused for every page
    tab: Arc<Tab>,

    navigation_timeout: Duration,
    load_signals: Vec<LoadSignal>,
    window_size: (u32, u32),
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Ignore default arguments to prevent detection by anti-bot services
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // Keep the browser alive across long batches (default idle timeout is 30 seconds)
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));

        if let Some(path) = options.chrome_path.clone() {
            launch_opts.path = Some(path);
        }

        if let Some(dir) = options.user_data_dir.clone() {
            launch_opts.user_data_dir = Some(dir);
        }

        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| PageError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| PageError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        Ok(Self {
            browser,
            tab,
            navigation_timeout: options.navigation_timeout,
            load_signals: options.load_signals,
            window_size: (options.window_width, options.window_height),
        })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect(options.ws_url).map_err(|e| PageError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| PageError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        let defaults = LaunchOptions::default();
        Ok(Self {
            browser,
            tab,
            navigation_timeout: options.navigation_timeout,
            load_signals: options.load_signals,
            window_size: (defaults.window_width, defaults.window_height),
        })
    }

    /// Get the tab pages are loaded in
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Navigate to a URL and wait for the configured load signals
    pub fn navigate(&self, url: &str) -> Result<()> {
        let deadline = Instant::now() + self.navigation_timeout;
        self.tab.set_default_timeout(self.navigation_timeout);

        self.tab
            .navigate_to(url)
            .map_err(|e| PageError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| PageError::NavigationTimeout(format!("{}: {}", url, e)))?;

        for signal in &self.load_signals {
            match signal {
                LoadSignal::DomContentLoaded => {}
                LoadSignal::Load => self.wait_for_ready_state(url, deadline)?,
                LoadSignal::NetworkIdle => self.wait_for_network_idle(url, deadline)?,
            }
        }

        Ok(())
    }

    fn wait_for_ready_state(&self, url: &str, deadline: Instant) -> Result<()> {
        loop {
            let complete = self
                .evaluate("document.readyState === 'complete'")?
                .and_then(|value| value.as_bool())
                .unwrap_or(false);
            if complete {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PageError::NavigationTimeout(format!("{}: load event not reached", url)));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn wait_for_network_idle(&self, url: &str, deadline: Instant) -> Result<()> {
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let count = self
                .evaluate("performance.getEntriesByType('resource').length")?
                .and_then(|value| value.as_u64());

            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= NETWORK_QUIET_PERIOD {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(PageError::NavigationTimeout(format!("{}: network never went idle", url)));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Evaluate an expression in the page and return its value
    pub fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| PageError::EvaluationFailed(e.to_string()))?;

        Ok(result.value)
    }

    /// Make the extraction runtime available in the current document
    pub fn inject_runtime(&self) -> Result<()> {
        let injected = self.evaluate(PAGE_RUNTIME)?.and_then(|value| value.as_bool()).unwrap_or(false);
        if !injected {
            return Err(PageError::EvaluationFailed("Page runtime did not initialise".to_string()));
        }
        Ok(())
    }

    // Scripts on the page may have replaced the document since injection
    fn ensure_runtime(&self) -> Result<()> {
        let present = self
            .evaluate("typeof window.__pageFeatures === 'object'")?
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if present { Ok(()) } else { self.inject_runtime() }
    }

    /// Read the labeled element boxes from the page
    pub fn outlines(&self) -> Result<OutlineSet> {
        self.ensure_runtime()?;
        let value = self
            .evaluate("window.__pageFeatures.outlines()")?
            .ok_or_else(|| PageError::EvaluationFailed("No value returned from outline collection".to_string()))?;
        let json_str: String = serde_json::from_value(value)?;
        Ok(serde_json::from_str(&json_str)?)
    }

    /// Capture the whole document as PNG by widening the window to the scroll size
    fn capture_full_page(&self, scroll_width: f64, scroll_height: f64) -> Result<Vec<u8>> {
        let (width, height) = self.window_size;
        let full_width = scroll_width.max(width as f64);
        let full_height = scroll_height.clamp(height as f64, MAX_CAPTURE_HEIGHT);

        let resized = self
            .tab
            .set_bounds(Bounds::Normal { left: Some(0), top: Some(0), width: Some(full_width), height: Some(full_height) })
            .is_ok();
        if !resized {
            log::warn!("Could not resize window; capturing the viewport only");
        }

        let capture = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| PageError::ScreenshotFailed(e.to_string()));

        if resized {
            let restore = Bounds::Normal { left: Some(0), top: Some(0), width: Some(width as f64), height: Some(height as f64) };
            if let Err(e) = self.tab.set_bounds(restore) {
                log::debug!("Failed to restore window size: {}", e);
            }
        }

        capture
    }
}

impl PageDriver for BrowserSession {
    fn open(&mut self, url: &str) -> Result<()> {
        self.navigate(url)?;
        self.inject_runtime()
    }

    fn label_all(&mut self, labels: &[(SelectorPath, Label)]) -> Result<LabelReport> {
        let scope = TabScope::new(&self.tab);
        let (resolved, mut report) = resolve_labels(&scope, labels);

        for (element, label) in resolved {
            let stamp = element.call_js_fn(
                "function(name, value) { this.setAttribute(name, value); }",
                vec![serde_json::json!(LABEL_ATTRIBUTE), serde_json::json!(label.marker())],
                false,
            );
            if let Err(e) = stamp {
                log::warn!("Failed to stamp {} marker: {}", label, e);
                report.stamped -= 1;
            }
        }

        Ok(report)
    }

    fn clear_labels(&mut self) -> Result<()> {
        self.ensure_runtime()?;
        self.evaluate("window.__pageFeatures.clearLabels()")?;
        Ok(())
    }

    fn extract_all(&mut self) -> Result<Vec<ElementFeatures>> {
        self.ensure_runtime()?;
        let value = self.evaluate("window.__pageFeatures.extract()")?;
        let snapshot = PageSnapshot::from_remote_value(value)?;
        log::debug!("Captured {} elements", snapshot.len());
        Ok(snapshot.into_features())
    }

    fn screenshot(&mut self, path: &Path) -> Result<()> {
        let outline_set = self.outlines()?;
        let png = self.capture_full_page(outline_set.scroll_width, outline_set.scroll_height)?;
        screenshot::save_annotated(&png, &outline_set.outlines, path)?;
        log::info!("Saved screenshot {} ({} outlines)", path.display(), outline_set.outlines.len());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // The browser process itself ends when `Browser` is dropped
        self.tab
            .close(false)
            .map_err(|e| PageError::EvaluationFailed(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }
}
