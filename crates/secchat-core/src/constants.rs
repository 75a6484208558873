//! Client identification.

/// Client version, from the workspace manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Product name shown in logs and `--version`.
pub const NAME: &str = "secchat";

/// `User-Agent` sent on the WebSocket upgrade request: `secchat/<version>`.
pub const CLIENT_TAG: &str = concat!("secchat/", env!("CARGO_PKG_VERSION"));
