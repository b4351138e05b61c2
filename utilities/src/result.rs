use std::error::Error;

/// Result used by glue code (mains, bootstrapping) where any error is fatal.
pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;
