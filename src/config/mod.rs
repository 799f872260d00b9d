//! Resolved server configuration.
//!
//! The command line and `SW_*` environment variables are parsed in `main`;
//! this module holds the resulting settings and their defaults.

mod settings;

pub use settings::{ServerConfig, SseConfig};

use std::time::Duration;

/// OAP URL used when neither a header nor the configuration supplies one.
pub const DEFAULT_SW_URL: &str = "http://localhost:12800";

/// Default listen address for the SSE transport.
pub const DEFAULT_SSE_ADDRESS: &str = "localhost:8000";

/// Drain window for in-flight SSE connections on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period after the SSE server has shut down.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Delay that lets the SSE listener bind before signals are watched.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(100);
