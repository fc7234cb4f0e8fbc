pub mod capture_backend;
pub mod classifier;
pub mod device_query;
