pub mod config;
pub mod logging;
pub mod random;
pub mod reqwest_http;
