pub mod host;
pub mod services;
