use colored::Colorize;
use thiserror::Error;

use crate::{
    intern::Symbol,
    source::{SourceMap, Span},
};

/// A fatal condition raised by a pass. Fatal means fatal: the engine aborts
/// the whole run on the first one, no pass is retried, and no partial tree is
/// handed downstream.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unresolved reference to `{name}`")]
    UnresolvedReference { name: Symbol, span: Span },

    #[error("duplicate declaration of `{name}`")]
    DuplicateDeclaration { name: Symbol, span: Span },

    #[error("`{name}` is not callable")]
    NotCallable { name: Symbol, span: Span },

    #[error("expected {expected} argument(s) but found {actual}")]
    ArgumentCountMismatch {
        expected: usize,
        actual: usize,
        span: Span,
    },

    #[error("type mismatch: expected {expected} but found {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        span: Span,
    },

    #[error("operator `{operator}` cannot be applied to these operand types")]
    InvalidOperation { operator: String, span: Span },

    #[error(
        "bits<{width}> is wider than the supported maximum bits<{}>",
        crate::passes::type_check::MAX_BITS_WIDTH
    )]
    UnsupportedWidth { width: u16, span: Span },

    #[error("slice bounds [{high}:{low}] are invalid for width {width}")]
    InvalidSlice {
        high: u16,
        low: u16,
        width: u16,
        span: Span,
    },

    #[error("`{name}` is not an enum member of `{base}`")]
    UnknownEnumMember {
        base: Symbol,
        name: Symbol,
        span: Span,
    },

    #[error("`{name}` cannot be instantiated")]
    NotInstantiable { name: Symbol, span: Span },
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::UnresolvedReference { span, .. }
            | CompileError::DuplicateDeclaration { span, .. }
            | CompileError::NotCallable { span, .. }
            | CompileError::ArgumentCountMismatch { span, .. }
            | CompileError::TypeMismatch { span, .. }
            | CompileError::InvalidOperation { span, .. }
            | CompileError::UnsupportedWidth { span, .. }
            | CompileError::InvalidSlice { span, .. }
            | CompileError::UnknownEnumMember { span, .. }
            | CompileError::NotInstantiable { span, .. } => *span,
        }
    }
}

/// A [`CompileError`] tagged with the pipeline step that raised it. This is
/// what the engine surfaces to the caller.
#[derive(Debug, Error)]
#[error("in pass `{pass}`: {error}")]
pub struct PipelineError {
    pub pass: &'static str,
    #[source]
    pub error: CompileError,
}

impl PipelineError {
    /// Renders the diagnostic with its source location and the offending
    /// line, for a driver that wants to print it directly.
    pub fn render(&self, sources: &SourceMap) -> String {
        let span = self.error.span();
        let file = sources.get(span.source);

        let mut out = format!(
            "{}: {} {}\n",
            "error".red(),
            self.error,
            format!(
                "(at {}:{}:{})",
                file.origin,
                file.row_for_position(span.start),
                file.column_for_position(span.start)
            )
            .white()
        );

        let row = file.row_for_position(span.start);
        if let Some(line) = file.contents.lines().nth(row - 1) {
            let column = file.column_for_position(span.start);
            out.push_str(&format!("    {line}\n"));
            out.push_str(&format!("    {}{}\n", " ".repeat(column - 1), "^".red()));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMap;

    #[test]
    fn render_points_at_the_offending_line() {
        colored::control::set_override(false);

        let mut sources = SourceMap::new();
        let source = sources.add_file("pipe.creek", "control c() {\n  frob();\n}\n");

        let error = PipelineError {
            pass: "ResolveReferences",
            error: CompileError::UnresolvedReference {
                name: Symbol::new("frob"),
                span: Span::new(source, 16, 20),
            },
        };

        let rendered = error.render(&sources);
        assert!(rendered.contains("unresolved reference to `frob`"));
        assert!(rendered.contains("pipe.creek:2:3"));
        assert!(rendered.contains("frob();"));
    }
}
