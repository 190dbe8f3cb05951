//! Rendering context shared by every `to_tokens` call.

use super::dialect::Dialect;
use super::functions::FunctionMap;

static NO_FUNCTIONS: FunctionMap = FunctionMap::new();

/// Everything an expression needs to know to render itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub dialect: Dialect,
    pub functions: &'a FunctionMap,
    /// Columns of this source render unqualified (single-table DML).
    pub bare_source: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    pub fn new(dialect: Dialect, functions: &'a FunctionMap) -> Self {
        Self {
            dialect,
            functions,
            bare_source: None,
        }
    }

    pub fn with_bare_source(self, source: &'a str) -> Self {
        Self {
            bare_source: Some(source),
            ..self
        }
    }

    /// Context for a nested query; qualification always applies inside it.
    pub(crate) fn nested(self) -> Self {
        Self {
            bare_source: None,
            ..self
        }
    }
}

impl RenderContext<'static> {
    /// Render with no function overrides.
    pub fn plain(dialect: Dialect) -> Self {
        Self::new(dialect, &NO_FUNCTIONS)
    }
}
