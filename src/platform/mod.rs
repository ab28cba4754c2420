//! Remote IoT platform integration
//!
//! Session-token management, telemetry fetching, RPC command dispatch, and
//! the background poll cycle that feeds the state cache and broadcast.

pub mod auth;
pub mod client;
pub mod sync;

pub use self::auth::SessionTokenManager;
pub use self::client::PlatformClient;
pub use self::sync::TelemetrySyncer;
