// Logging setup and retry helpers

pub mod logger;
pub mod retry;

pub use logger::*;
pub use retry::*;
