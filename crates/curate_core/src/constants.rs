//! Shared constants used across Curate crates.

/// Default API port for the reference Remote Item Service.
pub const DEFAULT_PORT: u16 = 38511;

/// Default maximum request body accepted by the API layer.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default per-request timeout for HTTP clients, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default base URL for CLI/API clients.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:38511";
