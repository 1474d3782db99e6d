// zimgx - image proxy and on-the-fly transformation server

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod metrics;
pub mod origin;
pub mod router;
pub mod s3;
pub mod server;
