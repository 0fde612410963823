pub mod config;
pub mod errors;
pub mod logging;
pub mod rate_limit;
pub mod security;
