//! Tera rendering for navigation snippets and the redirect page.
//!
//! | Template               | Output                                             |
//! |------------------------|----------------------------------------------------|
//! | `nav.html.tera`        | `<script>` block injected before `</body>`         |
//! | `redirect.html.tera`   | `<output>/storybooks/index.html`                   |

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tera::{Context, Tera};

use branchbook_core::BranchName;

use crate::error::NavError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

pub const NAV_TEMPLATE: &str = "nav.html.tera";
pub const REDIRECT_TEMPLATE: &str = "redirect.html.tera";

const TPLS: &[(&str, &str)] = &[
    (NAV_TEMPLATE, include_str!("templates/nav.html.tera")),
    (REDIRECT_TEMPLATE, include_str!("templates/redirect.html.tera")),
];

/// Characters escaped in a branch href. `/` stays literal so nested branch
/// names map onto nested directories; the result needs no further HTML
/// escaping.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn build_tera() -> Result<Tera, NavError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![".html.tera"]);
    tera.add_raw_templates(TPLS.iter().map(|(name, body)| (*name, *body)))?;
    Ok(tera)
}

/// Encode `value` as a JavaScript string literal that is safe inside an HTML
/// `<script>` element and inside the injected `[...]` list.
///
/// `<`, `>` and `]` are written as unicode escapes, so no branch name can close
/// the script element or end the list early.
pub fn js_string_literal(value: &str) -> Result<String, NavError> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace(']', "\\u005d"))
}

/// Comma-separated list of [`js_string_literal`]s, without brackets.
pub fn js_list_items(branches: &[BranchName]) -> Result<String, NavError> {
    let items = branches
        .iter()
        .map(|b| js_string_literal(b.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items.join(","))
}

/// Tera-based renderer for navigation HTML.
pub struct NavRenderer {
    tera: Tera,
}

impl NavRenderer {
    pub fn new() -> Result<Self, NavError> {
        Ok(NavRenderer { tera: build_tera()? })
    }

    /// Render the `<script>` snippet for `branch` listing `branches`.
    pub fn snippet(&self, branch: &BranchName, branches: &[BranchName]) -> Result<String, NavError> {
        let mut ctx = Context::new();
        ctx.insert("branch", &js_string_literal(branch.as_str())?);
        ctx.insert("branches", &js_list_items(branches)?);
        Ok(self.tera.render(NAV_TEMPLATE, &ctx)?)
    }

    /// Render the root page that redirects to `default`'s directory.
    pub fn redirect_page(&self, default: &BranchName) -> Result<String, NavError> {
        let href = utf8_percent_encode(default.as_str(), PATH_SEGMENT).to_string();
        let mut ctx = Context::new();
        ctx.insert("branch", default.as_str());
        ctx.insert("href", &href);
        Ok(self.tera.render(REDIRECT_TEMPLATE, &ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
