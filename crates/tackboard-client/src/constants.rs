//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default authority address for local development.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5000";

/// Longest inbound frame accepted by the TCP transport. A full `all-memos`
/// snapshot for a busy board fits comfortably.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Timeout for opening a channel (TCP connect + handshake frame).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnect attempts before the manager gives up and reports exhaustion.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 6;

/// First reconnect delay; doubles per attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Reconnect delay ceiling.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Viewport width assumed before the host reports one.
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1280.0;

/// Height of the toolbar above the board surface.
pub const HEADER_OFFSET: f64 = 80.0;

/// Gap between grid cells, as a multiple of the configured padding.
pub const SPACING_MULTIPLIER: f64 = 2.0;

/// Viewports narrower than this are phones.
pub const PHONE_MAX_WIDTH: f64 = 768.0;

/// Viewports narrower than this (and not phones) are tablets.
pub const TABLET_MAX_WIDTH: f64 = 1024.0;
