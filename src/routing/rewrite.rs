//! Path rewriting applied to forwarded requests.

use regex::Regex;

use crate::config::RewriteConfig;

/// A pure transform from the incoming path to the upstream path.
#[derive(Debug, Clone)]
pub enum PathRewrite {
    /// Remove a literal leading segment.
    StripPrefix(String),
    /// Replace the first match of a pattern (`$1` style captures allowed).
    Replace { pattern: Regex, with: String },
}

impl PathRewrite {
    pub fn compile(config: &RewriteConfig) -> Result<Self, String> {
        match config {
            RewriteConfig::StripPrefix(prefix) => {
                if !prefix.starts_with('/') {
                    return Err(format!("strip_prefix `{prefix}` must start with `/`"));
                }
                Ok(Self::StripPrefix(prefix.clone()))
            }
            RewriteConfig::Replace { pattern, with } => Ok(Self::Replace {
                pattern: Regex::new(pattern).map_err(|e| e.to_string())?,
                with: with.clone(),
            }),
        }
    }

    /// Rewrite `path`. The result always starts with `/`.
    pub fn apply(&self, path: &str) -> String {
        let rewritten = match self {
            Self::StripPrefix(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path).to_string(),
            Self::Replace { pattern, with } => pattern.replace(path, with.as_str()).into_owned(),
        };
        normalize(rewritten)
    }
}

/// `""` → `/`, `?q` → `/?q`, `users` → `/users`.
fn normalize(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
