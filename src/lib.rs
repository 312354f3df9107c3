// Error taxonomy
pub mod error;

// Time source
pub mod clock;

// Key-value storage seam
pub mod storage;

// Encrypted credentials and token refresh
pub mod credentials;

// OAuth authorization-code flow
pub mod oauth;

// Search Console client
pub mod gsc;

// Configuration
pub mod config;

// HTTP API
pub mod api;
