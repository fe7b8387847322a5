//! CLI subcommands

pub mod cleanup;
pub mod import;
pub mod init;
pub mod list;
pub mod manifest;
pub mod new;
