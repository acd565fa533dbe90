//! Route pattern compilation.
//!
//! Syntax: literal segments, `:name` captures (one or more non-`/` chars),
//! `:name?` optional segments, `*` wildcards, and `.:ext?` optional
//! extensions. A pattern is rewritten into a regular expression by a fixed
//! sequence of textual rules, so tie-breaking between wildcards and named
//! captures follows regex leftmost-first priority.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use routable_core::error::{Result, RoutableError};

/// `/*` or `*` becomes an optional catch-all group.
static WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(/?)\*").expect("valid wildcard rule"));

static TRAILING_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/$").expect("valid trailing slash rule"));

/// `:name`, optional `?`, optional `.` right after.
static NAMED_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z0-9_]+)(\?)?(\.)?").expect("valid named param rule")
});

/// First literal dot followed by a word char or a group.
static LITERAL_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9_(])").expect("valid dot rule"));

/// `<param>.?(?P<ext>[^/]+)?` as produced for `:param.:ext?`.
static OPTIONAL_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\)\.\?\((\?P<[A-Za-z0-9_]+>)\[\^/\]\+\)\?").expect("valid extension rule")
});

/// Rewrite a route pattern into an anchored regular expression.
pub fn compile_expr(pattern: &str) -> String {
    let s = WILDCARD.replace_all(pattern, "(${1}.*)?");
    let s = TRAILING_SLASH.replace(&s, "");
    let s = NAMED_PARAM.replace_all(&s, "${2}(?P<${1}>[^/]+)${2}${3}");
    let s = LITERAL_DOT.replacen(&s, 1, r"\.${1}");
    // The preceding capture turns lazy and the extension only matches after a
    // literal dot, which the dot itself may satisfy alone.
    let s = OPTIONAL_EXT.replacen(&s, 1, r"?)(?:\.(${1}[^\./]+)|\.)?");
    format!("^{s}/*$")
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        let expr = compile_expr(pattern);
        let regex = Regex::new(&expr).map_err(|e| {
            RoutableError::BadRequest(format!("invalid route pattern {pattern:?}: {e}"))
        })?;
        let names = regex.capture_names().flatten().map(str::to_owned).collect();
        Ok(Self {
            source: pattern.to_owned(),
            regex,
            names,
        })
    }

    /// Pattern as registered.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiled expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Named captures for `path`; groups that did not participate are left out.
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .filter_map(|n| caps.name(n).map(|m| (n.clone(), m.as_str().to_owned())))
                .collect(),
        )
    }
}
