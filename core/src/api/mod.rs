//! Compilation entry points.
//!
//! Each entry parses one expression from a token cursor (or source text,
//! via the built-in scanner), type-checks the result against what the
//! caller needs, optimizes, and flattens.  On failure the details have
//! already gone to the diagnostic sink and the caller gets no program.

use thiserror::Error;

use crate::catalog::Opcode;
use crate::data::{Dictionary, ValueType};
use crate::diagnostics::DiagnosticSink;
use crate::flatten::{self, Expression};
use crate::optimize;
use crate::parser::{ExprArena, NodeId, Parser, atom_type_name};
use crate::settings::Settings;
use crate::syntax::{Scanner, TokenCursor};

/// Everything compilation needs from its surroundings.
pub struct CompileContext<'a> {
    /// Variables and vectors the expression may reference; `None` for
    /// record-free expressions.
    pub dict: Option<&'a Dictionary>,
    pub settings: &'a Settings,
    pub sink: &'a dyn DiagnosticSink,
}

impl<'a> CompileContext<'a> {
    pub fn new(settings: &'a Settings, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            dict: None,
            settings,
            sink,
        }
    }

    pub fn with_dict(mut self, dict: &'a Dictionary) -> Self {
        self.dict = Some(dict);
        self
    }
}

/// Compilation failed; the particulars went to the diagnostic sink.
#[derive(Debug, Error)]
#[error("expression compilation failed")]
pub struct CompileError;

fn parse_root<C: TokenCursor>(
    cursor: &mut C,
    ctx: &CompileContext<'_>,
) -> Result<(ExprArena, NodeId), CompileError> {
    let mut arena = ExprArena::new();
    let root = Parser::new(cursor, &mut arena, ctx.dict, ctx.settings, ctx.sink)
        .parse_expression()
        .ok_or(CompileError)?;
    Ok((arena, root))
}

fn finish(
    mut arena: ExprArena,
    root: NodeId,
    ctx: &CompileContext<'_>,
    do_optimize: bool,
) -> Expression {
    let root = if do_optimize {
        optimize::optimize(&mut arena, root, ctx.settings, ctx.sink)
    } else {
        root
    };
    let expr = flatten::flatten(&mut arena, root, ctx.dict.is_some());
    tracing::debug!(
        result_type = ?expr.result_type(),
        operations = expr.n_operations(),
        "compiled expression"
    );
    expr
}

/// Parses an expression that must produce the given value type.
pub fn parse_expression<C: TokenCursor>(
    cursor: &mut C,
    ctx: &CompileContext<'_>,
    required: ValueType,
) -> Result<Expression, CompileError> {
    let (mut arena, root) = parse_root(cursor, ctx)?;
    let actual = arena.returns(root);
    match required {
        ValueType::Numeric => {
            if !matches!(actual, Opcode::Number | Opcode::Boolean) {
                ctx.sink.error(
                    arena.span_of(root),
                    format!(
                        "Type mismatch: expression has type '{}', but a numeric value is \
                         required.",
                        atom_type_name(actual)
                    ),
                );
                return Err(CompileError);
            }
        }
        ValueType::String => {
            if actual != Opcode::String {
                ctx.sink.error(
                    arena.span_of(root),
                    format!(
                        "Type mismatch: expression has type '{}', but a string value is \
                         required.",
                        atom_type_name(actual)
                    ),
                );
                return Err(CompileError);
            }
        }
    }
    Ok(finish(arena, root, ctx, true))
}

/// Parses an expression that must produce a boolean, wrapping a plain
/// numeric result in a runtime boolean check.
pub fn parse_boolean<C: TokenCursor>(
    cursor: &mut C,
    ctx: &CompileContext<'_>,
) -> Result<Expression, CompileError> {
    let (mut arena, root) = parse_root(cursor, ctx)?;
    let actual = arena.returns(root);
    let root = if actual == Opcode::Number {
        arena.alloc_unary(Opcode::ExprToBoolean, root)
    } else if actual != Opcode::Boolean {
        ctx.sink.error(
            arena.span_of(root),
            format!(
                "Type mismatch: expression has type '{}', but a boolean value is required \
                 here.",
                atom_type_name(actual)
            ),
        );
        return Err(CompileError);
    } else {
        root
    };
    Ok(finish(arena, root, ctx, true))
}

/// Parses an expression of any result type, optionally without
/// optimization (the debugging entry point).
pub fn parse_any<C: TokenCursor>(
    cursor: &mut C,
    ctx: &CompileContext<'_>,
    do_optimize: bool,
) -> Result<Expression, CompileError> {
    let (arena, root) = parse_root(cursor, ctx)?;
    Ok(finish(arena, root, ctx, do_optimize))
}

impl Expression {
    /// Compiles source text with the built-in scanner, requiring the given
    /// result value type.
    pub fn compile(
        source: &str,
        ctx: &CompileContext<'_>,
        required: ValueType,
    ) -> Result<Expression, CompileError> {
        let mut cursor = Scanner::new(source).scan(ctx.sink).ok_or(CompileError)?;
        parse_expression(&mut cursor, ctx, required)
    }

    /// Compiles source text that must produce a boolean.
    pub fn compile_boolean(
        source: &str,
        ctx: &CompileContext<'_>,
    ) -> Result<Expression, CompileError> {
        let mut cursor = Scanner::new(source).scan(ctx.sink).ok_or(CompileError)?;
        parse_boolean(&mut cursor, ctx)
    }

    /// Compiles source text of any result type, optionally skipping
    /// optimization.
    pub fn compile_any(
        source: &str,
        ctx: &CompileContext<'_>,
        do_optimize: bool,
    ) -> Result<Expression, CompileError> {
        let mut cursor = Scanner::new(source).scan(ctx.sink).ok_or(CompileError)?;
        parse_any(&mut cursor, ctx, do_optimize)
    }
}
