// Infrastructure layer: process-wide concerns such as logging

pub mod logging;

pub use logging::LoggingConfig;
