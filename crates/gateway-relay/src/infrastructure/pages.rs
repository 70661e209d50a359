//! HTML pages served by the relay.
//!
//! Three pages exist: the landing page with the password form, the page shown
//! after a grant, and an error page template.  Each can be replaced by a file
//! named in the `[pages]` config section; otherwise a built-in page is used.
//!
//! # Error page placeholders
//!
//! | Placeholder   | Replaced with                                         |
//! |---------------|-------------------------------------------------------|
//! | `{remaining}` | attempts left before lockout                          |
//! | `{total}`     | configured attempt limit                              |
//! | `{timeout}`   | lockout notice when locked out, empty otherwise       |
//!
//! `{{` and `}}` render as literal braces so that templates containing CSS
//! can be shared with other tools that use the same convention.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::domain::PageSources;

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Gateway</title></head>
<body>
  <h1>Gateway access</h1>
  <form method="post" action="/authenticate/">
    <label>Password <input type="password" name="password" autofocus></label><br>
    <label>Expires after (seconds, 0 = never) <input type="number" name="expiration" min="0" value="0"></label><br>
    <button type="submit">Authenticate</button>
  </form>
</body>
</html>
"#;

const DEFAULT_OK: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Gateway</title></head>
<body>
  <h1>Access granted</h1>
  <p>Your address has been authorized.</p>
</body>
</html>
"#;

const DEFAULT_ERROR: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Gateway</title></head>
<body>
  <h1>Access denied</h1>
  <p>{remaining} of {total} attempt(s) remaining.</p>
  <p>{timeout}</p>
  <p><a href="/">Try again</a></p>
</body>
</html>
"#;

/// Failure to read a configured page file.
#[derive(Debug, Error)]
#[error("cannot read page {path}: {source}")]
pub struct PageError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The three pages, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    pub index: String,
    pub ok: String,
    /// Template for [`PageSet::render_error`].
    pub error: String,
}

impl Default for PageSet {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            ok: DEFAULT_OK.to_string(),
            error: DEFAULT_ERROR.to_string(),
        }
    }
}

impl PageSet {
    /// Reads every configured page file, falling back to the built-in page
    /// for each one that is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`PageError`] if a configured file cannot be read.  A missing
    /// configured file is an error, not a silent fallback.
    pub fn load(sources: &PageSources) -> Result<Self, PageError> {
        Ok(Self {
            index: read_or(sources.index.as_deref(), DEFAULT_INDEX)?,
            ok: read_or(sources.ok.as_deref(), DEFAULT_OK)?,
            error: read_or(sources.error.as_deref(), DEFAULT_ERROR)?,
        })
    }

    /// Renders the error page.
    pub fn render_error(&self, remaining: u32, total: u32, timeout: &str) -> String {
        let remaining = remaining.to_string();
        let total = total.to_string();
        render(
            &self.error,
            &[
                ("remaining", remaining.as_str()),
                ("total", total.as_str()),
                ("timeout", timeout),
            ],
        )
    }
}

/// The `{timeout}` text shown to a locked-out client.
pub fn lockout_notice(timeout_secs: u64) -> String {
    format!("You are timed out, your time out is: {timeout_secs} seconds from the last attempt.")
}

fn read_or(path: Option<&Path>, fallback: &str) -> Result<String, PageError> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading page");
            fs::read_to_string(path).map_err(|source| PageError {
                path: path.to_path_buf(),
                source,
            })
        }
        None => Ok(fallback.to_string()),
    }
}

/// Single-pass placeholder substitution.  Unknown `{names}` are left as-is.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '}'][..]) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if let Some((value, consumed)) = placeholder(tail, values) {
            out.push_str(value);
            rest = &tail[consumed..];
        } else {
            out.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn placeholder<'v>(tail: &str, values: &[(&str, &'v str)]) -> Option<(&'v str, usize)> {
    let close = tail.strip_prefix('{')?.find('}')?;
    let name = &tail[1..=close];
    values
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| (*value, close + 2))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
