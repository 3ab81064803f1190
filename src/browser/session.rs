use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::browser::driver::{BrowserDriver, Capture};
use crate::browser::normalize_url;
use crate::browser::screenshot::Screenshot;
use crate::dom::{CapturedSnapshot, LayoutTable, Point, ScreenBounds};
use crate::error::{BrowserError, Result};
use crate::protocol::ScrollDirection;
use headless_chrome::browser::tab::point::Point as ChromePoint;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::types::Method;
use headless_chrome::{Browser, Tab};
use serde::Serialize;
use std::{ffi::OsStr, sync::Arc, time::Duration};

/// Pixels moved by one scroll action
pub const SCROLL_DISTANCE: i32 = 900;

const VIEWPORT_JS: &str = "JSON.stringify([window.scrollX, window.scrollY, window.innerWidth, window.innerHeight])";

/// Keeps link clicks in the current tab
const STRIP_LINK_TARGETS_JS: &str = r#"
    (function() {
        for (const link of document.getElementsByTagName("a")) {
            link.removeAttribute("target");
        }
        return true;
    })()
"#;

/// Select existing text in the focused field so typing replaces it
const SELECT_FOCUSED_JS: &str = r#"
    (function() {
        const el = document.activeElement;
        if (el && typeof el.select === "function") {
            el.select();
        }
        return true;
    })()
"#;

/// `DOMSnapshot.captureSnapshot`, decoded straight into [`CapturedSnapshot`].
///
/// The generated protocol types read `parentIndex` as unsigned and reject the root's `-1`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureSnapshot {
    computed_styles: Vec<String>,
    include_paint_order: bool,
    #[serde(rename = "includeDOMRects")]
    include_dom_rects: bool,
}

impl Method for CaptureSnapshot {
    const NAME: &'static str = "DOMSnapshot.captureSnapshot";
    type ReturnObject = CapturedSnapshot;
}

/// Browser session that manages a Chrome/Chromium instance
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,

    /// Attach a screenshot to every capture
    screenshots: bool,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Ignore default arguments to prevent detection by anti-bot services
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // Default idle timeout is 30 seconds, shorter than a slow proposer round trip
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));
        launch_opts.path = options.chrome_path;
        launch_opts.user_data_dir = options.user_data_dir;
        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        browser
            .new_tab()
            .map_err(|e| BrowserError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        log::info!("Launched browser (headless: {})", options.headless);
        Ok(Self {
            browser,
            screenshots: options.screenshots,
        })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect_with_timeout(options.ws_url, Duration::from_millis(options.timeout))
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            browser,
            screenshots: options.screenshots,
        })
    }

    /// Launch a browser with default options
    pub fn new() -> Result<Self> {
        Self::launch(LaunchOptions::default())
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Get all tabs
    pub fn get_tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to get tabs: {}", e)))?
            .clone();

        Ok(tabs)
    }

    /// Get the currently active tab.
    ///
    /// Prefers a visible, focused tab, then any visible tab, then the most recently opened one.
    pub fn tab(&self) -> Result<Arc<Tab>> {
        let tabs = self.get_tabs()?;

        for probe in [
            "document.visibilityState === 'visible' && document.hasFocus()",
            "document.visibilityState === 'visible'",
        ] {
            for tab in &tabs {
                match tab.evaluate(probe, false) {
                    Ok(remote_object) => {
                        if remote_object.value.and_then(|v| v.as_bool()).unwrap_or(false) {
                            return Ok(tab.clone());
                        }
                    }
                    Err(e) => log::debug!("Failed to check tab status: {}", e),
                }
            }
        }

        tabs.last()
            .cloned()
            .ok_or_else(|| BrowserError::TabOperationFailed("No active tab found".to_string()))
    }

    /// Wait for navigation to complete
    pub fn wait_for_navigation(&self) -> Result<()> {
        self.tab()?
            .wait_until_navigated()
            .map_err(|e| BrowserError::NavigationFailed(format!("Navigation timeout: {}", e)))?;

        Ok(())
    }

    fn evaluate(&self, tab: &Tab, js: &str, action: &'static str) -> Result<Option<serde_json::Value>> {
        let remote_object = tab.evaluate(js, false).map_err(action_failed(action))?;
        Ok(remote_object.value)
    }

    fn screen_bounds(&self, tab: &Tab) -> Result<ScreenBounds> {
        let value = self.evaluate(tab, VIEWPORT_JS, "read viewport")?;
        let [x, y, width, height] = value
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(|s| serde_json::from_str::<[f64; 4]>(s).ok())
            .ok_or_else(|| BrowserError::TabOperationFailed(format!("Unexpected viewport value: {:?}", value)))?;
        Ok(ScreenBounds::new(x, y, width, height))
    }

    /// Ratio of the layout's device pixels to the screen's CSS pixels.
    ///
    /// `window.devicePixelRatio` is unreliable under emulation, so it is derived from the
    /// document's layout width instead.
    fn device_pixel_ratio(&self, tab: &Tab, layout: &LayoutTable) -> Result<f64> {
        let screen_width = self
            .evaluate(tab, "window.screen.width", "read screen width")?
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        match layout.document_width() {
            Some(width) if width > 0.0 && screen_width > 0.0 => Ok(width / screen_width),
            _ => Ok(1.0),
        }
    }

    fn screenshot(&self, tab: &Tab) -> Result<Screenshot> {
        let png = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;
        Screenshot::from_png(&png)
    }

    /// Close the browser
    pub fn close(&self) -> Result<()> {
        // headless_chrome closes the browser on drop; closing the tabs ends the session early
        for tab in self.get_tabs()? {
            let _ = tab.close(false);
        }
        Ok(())
    }
}

impl BrowserDriver for BrowserSession {
    fn capture_snapshot(&self) -> Result<Capture> {
        let tab = self.tab()?;
        if let Err(e) = tab.wait_until_navigated() {
            log::debug!("Page still loading before capture: {}", e);
        }

        let snapshot = tab
            .call_method(CaptureSnapshot {
                computed_styles: Vec::new(),
                include_paint_order: true,
                include_dom_rects: true,
            })
            .map_err(|e| BrowserError::MalformedSnapshot(format!("Failed to capture snapshot: {}", e)))?;

        let layout = LayoutTable::from_snapshot(&snapshot)?;
        let device_pixel_ratio = self.device_pixel_ratio(&tab, &layout)?;
        let screen = self.screen_bounds(&tab)?;
        let screenshot = if self.screenshots {
            Some(self.screenshot(&tab)?)
        } else {
            None
        };

        log::debug!(
            "Captured {} strings, viewport {}x{} at ({}, {}), dpr {}",
            snapshot.strings.len(),
            screen.width,
            screen.height,
            screen.x,
            screen.y,
            device_pixel_ratio
        );

        Ok(Capture {
            snapshot,
            screen,
            device_pixel_ratio,
            screenshot,
        })
    }

    fn click(&self, point: Point) -> Result<()> {
        let tab = self.tab()?;
        self.evaluate(&tab, STRIP_LINK_TARGETS_JS, "click")?;
        tab.click_point(ChromePoint { x: point.x, y: point.y })
            .map_err(action_failed("click"))?;
        Ok(())
    }

    fn type_text(&self, point: Point, text: &str, submit: bool) -> Result<()> {
        let tab = self.tab()?;
        tab.click_point(ChromePoint { x: point.x, y: point.y })
            .map_err(action_failed("type"))?;
        self.evaluate(&tab, SELECT_FOCUSED_JS, "type")?;
        tab.type_str(text).map_err(action_failed("type"))?;
        if submit {
            tab.press_key("Enter").map_err(action_failed("type"))?;
        }
        Ok(())
    }

    fn scroll(&self, direction: ScrollDirection) -> Result<()> {
        let delta = match direction {
            ScrollDirection::Up => -SCROLL_DISTANCE,
            ScrollDirection::Down => SCROLL_DISTANCE,
        };
        let tab = self.tab()?;
        self.evaluate(&tab, &format!("window.scrollBy(0, {})", delta), "scroll")?;
        Ok(())
    }

    fn go_back(&self) -> Result<()> {
        let go_back_js = r#"
            (function() {
                window.history.back();
                return true;
            })()
        "#;

        self.tab()?
            .evaluate(go_back_js, false)
            .map_err(|e| BrowserError::NavigationFailed(format!("Failed to go back: {}", e)))?;

        // history.back() returns before the navigation starts
        std::thread::sleep(Duration::from_millis(300));

        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<()> {
        let url = normalize_url(url);
        self.tab()?
            .navigate_to(&url)
            .map_err(|e| BrowserError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?
            .wait_until_navigated()
            .map_err(|e| BrowserError::NavigationFailed(format!("Navigation timeout: {}", e)))?;

        Ok(())
    }
}

fn action_failed<E: std::fmt::Display>(action: &'static str) -> impl Fn(E) -> BrowserError {
    move |e| BrowserError::ActionFailed {
        action: action.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests (require Chrome to be installed)
    #[test]
    #[ignore] // Ignore by default, run with: cargo test -- --ignored
    fn test_launch_browser() {
        let result = BrowserSession::launch(LaunchOptions::new().headless(true));
        assert!(result.is_ok());
    }

    #[test]
    #[ignore]
    fn test_active_tab() {
        let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
        assert!(session.tab().is_ok());
    }

    #[test]
    #[ignore]
    fn test_capture_blank_page() {
        let session = BrowserSession::launch(LaunchOptions::new().headless(true).screenshots(true))
            .expect("Failed to launch browser");
        session.navigate("about:blank").expect("Failed to navigate");

        let capture = session.capture_snapshot().expect("Failed to capture");
        assert!(capture.device_pixel_ratio > 0.0);
        assert!(capture.screenshot.is_some());
        assert!(!capture.snapshot.documents.is_empty());
    }
}
