//! One module per subcommand, plus the shared composition root.

pub mod clear;
pub mod context;
pub mod decide;
pub mod init;
pub mod prompt;
pub mod start;
pub mod status;
pub mod sync;
