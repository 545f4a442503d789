//! # branchbook-build
//!
//! Head-gated Storybook builds.
//!
//! Call [`Pipeline::process`] once per checked-out branch: it consults the
//! [`gate`] and, when the branch's head moved, runs the [`SiteBuilder`].

pub mod builder;
pub mod error;
pub mod gate;
pub mod pipeline;

pub use builder::{BuildOutcome, SiteBuilder};
pub use error::BuildError;
pub use gate::Gate;
pub use pipeline::{BranchPipeline, BranchStatus, Pipeline};
