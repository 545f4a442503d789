//! branchbook core library: domain types, output layout, settings, errors.
//!
//! Public API surface:
//! - [`types`]: branch newtypes and the per-cycle branch snapshot
//! - [`layout`]: where everything lives under the output root
//! - [`settings`]: validated runtime settings shared by every crate
//! - [`tool`]: the external-tool capability used for git and the build tool
//! - [`files`]: atomic writes and tolerant removal
//! - [`error`]: [`CoreError`]

pub mod error;
pub mod files;
pub mod layout;
pub mod settings;
pub mod tool;
pub mod types;

pub use error::CoreError;
pub use layout::OutputLayout;
pub use settings::{BranchFilter, Settings};
pub use tool::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use types::{BranchHead, BranchName, BranchSet, HeadId};
