//! # branchbook-nav
//!
//! Navigation state for built Storybooks. Every regex rewrite of generated
//! HTML lives here.
//!
//! - [`NavRenderer`] renders the injected `<script>` snippet and the
//!   default-branch redirect page from embedded Tera templates.
//! - [`inject`] holds the pure text operations: first injection and re-fix of
//!   the branch list.
//! - [`NavInjector`] applies them to files under the output layout.

pub mod engine;
pub mod error;
pub mod inject;
mod injector;

pub use engine::{js_string_literal, NavRenderer};
pub use error::NavError;
pub use injector::{NavInjector, RefixOutcome, RefixSummary};
