//! Browser driving
//!
//! - config: launch and connection options
//! - driver: the [`BrowserDriver`] trait and [`execute_action`]
//! - screenshot: decoding and downscaling page screenshots
//! - session: [`BrowserSession`], the `headless_chrome` implementation

pub mod config;
pub mod driver;
pub mod screenshot;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use driver::{BrowserDriver, Capture, Outcome, execute_action};
pub use screenshot::{DEFAULT_IMAGE_WIDTH, Screenshot};
pub use session::BrowserSession;

/// Complete a user-supplied URL with a scheme.
///
/// Anything without `://` (and not one of the scheme-only forms like `about:`) gets `https://`,
/// except local hosts which get `http://`.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    if trimmed.contains("://")
        || trimmed.starts_with("about:")
        || trimmed.starts_with("data:")
        || trimmed.starts_with("javascript:")
    {
        return trimmed.to_string();
    }

    if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        return format!("http://{}", trimmed);
    }

    format!("https://{}", trimmed)
}
