//! Pluggable function translation.
//!
//! A [`FunctionMap`] overrides how a named function call is rendered. Each
//! entry is a template whose `{0}`, `{1}`, ... placeholders are replaced by the
//! rendered arguments:
//!
//! ```ignore
//! let mut functions = FunctionMap::new();
//! functions.insert("group_concat", "STRING_AGG({0}, ',')");
//! ```
//!
//! Function calls are resolved in order: this map, then the dialect's
//! built-in remapping, then the upper-cased name as written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use super::render::RenderContext;
use super::token::{Token, TokenStream};

/// Function name to template overrides. Names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct FunctionMap {
    templates: BTreeMap<String, String>,
}

impl FunctionMap {
    pub const fn new() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Register a template for `name`, replacing any previous entry.
    pub fn insert(&mut self, name: &str, template: impl Into<String>) -> &mut Self {
        self.templates.insert(name.to_uppercase(), template.into());
        self
    }

    pub fn with(mut self, name: &str, template: impl Into<String>) -> Self {
        self.insert(name, template);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl From<BTreeMap<String, String>> for FunctionMap {
    fn from(templates: BTreeMap<String, String>) -> Self {
        templates.into_iter().collect()
    }
}

impl From<FunctionMap> for BTreeMap<String, String> {
    fn from(map: FunctionMap) -> Self {
        map.templates
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for FunctionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FunctionMap::new();
        for (name, template) in iter {
            map.insert(name.as_ref(), template);
        }
        map
    }
}

// =============================================================================
// Templates
// =============================================================================

/// A piece of a parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Text(&'a str),
    Arg(usize),
}

/// Split a template into literal text and `{n}` argument references.
///
/// Braces that do not enclose a plain index are kept as text.
pub(crate) fn parse_template(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let index = after
            .find('}')
            .filter(|&end| end > 0 && after[..end].bytes().all(|b| b.is_ascii_digit()))
            .and_then(|end| after[..end].parse::<usize>().ok().map(|n| (n, end)));

        match index {
            Some((n, end)) => {
                if start > 0 {
                    segments.push(Segment::Text(&rest[..start]));
                }
                segments.push(Segment::Arg(n));
                rest = &after[end + 1..];
            }
            None => {
                segments.push(Segment::Text(&rest[..=start]));
                rest = after;
            }
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// Highest argument index a template references, if any.
pub(crate) fn max_placeholder(template: &str) -> Option<usize> {
    parse_template(template)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Arg(n) => Some(n),
            Segment::Text(_) => None,
        })
        .max()
}

/// Render a template, substituting rendered arguments.
///
/// References past the end of `args` are emitted as written.
pub(crate) fn render_template(template: &str, args: &[Expr], ctx: &RenderContext) -> TokenStream {
    let mut ts = TokenStream::new();
    for segment in parse_template(template) {
        match segment {
            Segment::Text(text) => {
                ts.push(Token::Raw(text.to_string()));
            }
            Segment::Arg(n) => match args.get(n) {
                Some(arg) => {
                    ts.append(&arg.to_tokens(ctx));
                }
                None => {
                    ts.push(Token::Raw(format!("{{{}}}", n)));
                }
            },
        }
    }
    ts
}
