//! CLI command implementations

pub mod init;
pub mod library;
pub mod serve;
pub mod status;
pub mod tasks;

pub use init::*;
pub use library::*;
pub use serve::*;
pub use status::*;
pub use tasks::*;
