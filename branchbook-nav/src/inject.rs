//! Text-level rewrites of a Storybook entry page.
//!
//! Two operations, both pure:
//! - [`PagePatterns::inject_snippet`] places a rendered snippet before
//!   `</body>`, replacing any snippet injected earlier.
//! - [`PagePatterns::refix_branch_list`] swaps the literal in the injected
//!   `window.BRANCHBOOK_BRANCHES = [...]` assignment.

use regex::{NoExpand, Regex};

use branchbook_core::BranchName;

use crate::engine::js_list_items;
use crate::error::NavError;

pub const SNIPPET_OPEN: &str = r#"<script id="branchbook-nav">"#;
pub const BRANCH_LIST_VAR: &str = "window.BRANCHBOOK_BRANCHES";

/// Compiled patterns for locating injected state.
#[derive(Debug, Clone)]
pub struct PagePatterns {
    snippet: Regex,
    branch_list: Regex,
}

impl PagePatterns {
    pub fn new() -> Result<Self, NavError> {
        let snippet = Regex::new(&format!(
            r"(?s){}.*?</script>\n?",
            regex::escape(SNIPPET_OPEN)
        ))?;
        // Injected literals never contain a raw `]`, so `[^\]]*` spans the list.
        let branch_list = Regex::new(&format!(r"{}\s*=\s*\[[^\]]*\];", regex::escape(BRANCH_LIST_VAR)))?;
        Ok(Self {
            snippet,
            branch_list,
        })
    }

    /// Insert `snippet` before the closing body tag of `html`.
    ///
    /// Pages without `</body>` get the snippet appended.
    pub fn inject_snippet(&self, html: &str, snippet: &str) -> String {
        let stripped = self.snippet.replace_all(html, NoExpand(""));
        let lower = stripped.to_ascii_lowercase();
        match lower.rfind("</body>") {
            Some(at) => {
                let mut out = String::with_capacity(stripped.len() + snippet.len());
                out.push_str(&stripped[..at]);
                out.push_str(snippet);
                out.push_str(&stripped[at..]);
                out
            }
            None => {
                let mut out = stripped.into_owned();
                out.push_str(snippet);
                out
            }
        }
    }

    /// Replace the injected branch list with `branches`.
    ///
    /// Returns `Ok(None)` when `html` carries no injected assignment.
    pub fn refix_branch_list(
        &self,
        html: &str,
        branches: &[BranchName],
    ) -> Result<Option<String>, NavError> {
        if !self.branch_list.is_match(html) {
            return Ok(None);
        }
        let replacement = format!("{BRANCH_LIST_VAR} = [{}];", js_list_items(branches)?);
        Ok(Some(
            self.branch_list
                .replace_all(html, NoExpand(&replacement))
                .into_owned(),
        ))
    }

    /// Branch names currently embedded in `html`, decoded from the injected
    /// list. `None` when there is no injected list.
    pub fn embedded_branches(&self, html: &str) -> Option<Vec<String>> {
        let found = self.branch_list.find(html)?.as_str();
        let open = found.find('[')?;
        let close = found.rfind(']')?;
        serde_json::from_str(&found[open..=close]).ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
