//! Tree flattening: from the optimized expression tree to a linear postfix
//! program.
//!
//! One post-order walk emits, per composite, its children's code, the
//! opcode, inline auxiliary operands (variables, vectors, formats,
//! positive-integer constants, diagnostic spans), and any trailing
//! array-count / minimum-valid / span operands the operation's flags call
//! for.  A static walk over the same tree fixes the two evaluation stacks'
//! depths, so the interpreter never bounds-checks.

use core::fmt;

use ecow::EcoString;

use crate::catalog::{OpFlags, Opcode, StackUse};
use crate::data::{SYSMIS, VarId, VectorId};
use crate::format::FmtSpec;
use crate::parser::{ExprArena, NodeId, Payload};
use crate::syntax::Span;

/// One element of the postfix stream: an operation, a literal push, or an
/// inline operand consumed by the preceding operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Op(Opcode),
    Number(f64),
    Str(EcoString),
    Var(VarId),
    Vector(VectorId),
    Format(FmtSpec),
    Integer(i64),
    Span(Option<Span>),
}

/// Result type of a whole compiled expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultType {
    Number,
    Boolean,
    String,
}

/// A compiled, immutable expression program.
///
/// Created by the parser, optimized in place, finalized here; after that it
/// only ever executes.  The op-code stream is read-only and may be shared
/// across threads; each evaluation brings its own stacks and scratch arena.
pub struct Expression {
    pub(crate) result_type: ResultType,
    pub(crate) code: Vec<Instr>,
    pub(crate) number_stack_size: usize,
    pub(crate) string_stack_size: usize,
    pub(crate) needs_case: bool,
    pub(crate) max_lag: usize,
}

impl Expression {
    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    /// True when evaluation requires a data record.
    pub fn needs_case(&self) -> bool {
        self.needs_case
    }

    /// Deepest `LAG` lookback the expression performs.
    pub fn max_lag(&self) -> usize {
        self.max_lag
    }

    pub(crate) fn code(&self) -> &[Instr] {
        &self.code
    }
}

/// Running and maximum heights of the two evaluation stacks.
#[derive(Clone, Copy, Default)]
struct StackHeights {
    number: usize,
    string: usize,
}

fn measure_stack(arena: &ExprArena, id: NodeId, height: &mut StackHeights, max: &mut StackHeights) {
    let node = arena.node(id);
    let return_type = if node.op.is_composite() {
        let mut inner = *height;
        for &arg in node.args() {
            measure_stack(arena, arg, &mut inner, max);
        }
        node.op.info().returns
    } else {
        node.op
    };

    match return_type.stack_use() {
        StackUse::Number => height.number += 1,
        StackUse::String => height.string += 1,
        StackUse::None => {}
    }
    max.number = max.number.max(height.number);
    max.string = max.string.max(height.string);
}

fn flatten_atom(arena: &ExprArena, id: NodeId, code: &mut Vec<Instr>) {
    let node = arena.node(id);
    match node.op {
        Opcode::Number | Opcode::Boolean => code.push(Instr::Number(node.as_number())),
        Opcode::String => {
            let Payload::Str(s) = &node.payload else {
                unreachable!();
            };
            code.push(Instr::Str(s.clone()));
        }
        // Leaf-only atoms ride along as operand data after their
        // operation; they emit nothing of their own.
        Opcode::NumVarRef
        | Opcode::StrVarRef
        | Opcode::VectorRef
        | Opcode::NiFormat
        | Opcode::NoFormat
        | Opcode::PosInt
        | Opcode::NodeSpan => {}
        _ => unreachable!("unexpected atom {:?} in flattening", node.op),
    }
}

fn flatten_composite(arena: &mut ExprArena, id: NodeId, code: &mut Vec<Instr>) {
    let args: Vec<NodeId> = arena.node(id).args().to_vec();
    let op = arena.node(id).op;
    let info = op.info();

    for &arg in &args {
        flatten_node(arena, arg, code);
    }

    // The Boolean-to-number marker is a no-op; it never becomes an opcode.
    if op != Opcode::BooleanToNum {
        code.push(Instr::Op(op));
    }

    for &arg in &args {
        let arg_node = arena.node(arg);
        match arg_node.op {
            Opcode::NumVarRef | Opcode::StrVarRef => {
                let Payload::Variable(var) = arg_node.payload else {
                    unreachable!();
                };
                code.push(Instr::Var(var));
            }
            Opcode::VectorRef => {
                let Payload::Vector(vector) = arg_node.payload else {
                    unreachable!();
                };
                code.push(Instr::Vector(vector));
            }
            Opcode::NiFormat | Opcode::NoFormat => {
                let Payload::Format(spec) = arg_node.payload else {
                    unreachable!();
                };
                code.push(Instr::Format(spec));
            }
            Opcode::PosInt => {
                let Payload::Integer(value) = arg_node.payload else {
                    unreachable!();
                };
                code.push(Instr::Integer(value));
            }
            Opcode::NodeSpan => {
                let Payload::NodeRef(target) = arg_node.payload else {
                    unreachable!();
                };
                let span = arena.span_of(target);
                code.push(Instr::Span(span));
            }
            _ => {}
        }
    }

    if info.has_array() {
        code.push(Instr::Integer((args.len() + 1 - info.n_args()) as i64));
    }
    if info.flags.contains(OpFlags::MIN_VALID) {
        code.push(Instr::Integer(arena.node(id).min_valid() as i64));
    }
    if info.flags.contains(OpFlags::NEEDS_SPAN) {
        let span = arena.span_of(id);
        code.push(Instr::Span(span));
    }
}

fn flatten_node(arena: &mut ExprArena, id: NodeId, code: &mut Vec<Instr>) {
    if arena.node(id).op.is_atom() {
        flatten_atom(arena, id, code);
    } else {
        flatten_composite(arena, id, code);
    }
}

/// Flattens the tree rooted at `id` into a finished [`Expression`].
pub fn flatten(arena: &mut ExprArena, id: NodeId, needs_case: bool) -> Expression {
    let mut height = StackHeights::default();
    let mut max = StackHeights::default();
    measure_stack(arena, id, &mut height, &mut max);

    let mut code = Vec::new();
    flatten_node(arena, id, &mut code);

    let result_type = match arena.returns(id) {
        Opcode::Boolean => ResultType::Boolean,
        Opcode::String => ResultType::String,
        _ => ResultType::Number,
    };
    code.push(Instr::Op(match result_type {
        ResultType::String => Opcode::ReturnString,
        _ => Opcode::ReturnNumber,
    }));

    Expression {
        result_type,
        code,
        number_stack_size: max.number,
        string_stack_size: max.string,
        needs_case,
        max_lag: arena.max_lag,
    }
}

/// Postfix debug rendering, one element per instruction.
pub struct Postfix<'a>(pub &'a Expression);

impl fmt::Display for Postfix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, instr) in self.0.code.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            match instr {
                Instr::Op(Opcode::ReturnNumber) => write!(f, "return_number")?,
                Instr::Op(Opcode::ReturnString) => write!(f, "return_string")?,
                Instr::Op(op) if op.is_function() => write!(f, "{}", op.info().prototype)?,
                Instr::Op(op) => write!(f, "{}", op.info().name)?,
                Instr::Number(x) if *x == SYSMIS => write!(f, "n<SYSMIS>")?,
                Instr::Number(x) => write!(f, "n<{x}>")?,
                Instr::Str(s) => write!(f, "s<{s}>")?,
                Instr::Var(var) => write!(f, "v<#{}>", var.0)?,
                Instr::Vector(vector) => write!(f, "vec<#{}>", vector.0)?,
                Instr::Format(spec) => write!(f, "f<{spec}>")?,
                Instr::Integer(value) => write!(f, "i<{value}>")?,
                Instr::Span(_) => write!(f, "loc")?,
            }
        }
        Ok(())
    }
}

impl Expression {
    /// Number of operation op-codes in the program (excluding the return
    /// sentinel); a cheap size measure for optimizer tests.
    pub fn n_operations(&self) -> usize {
        self.code
            .iter()
            .filter(|i| {
                matches!(i, Instr::Op(op)
                    if !matches!(op, Opcode::ReturnNumber | Opcode::ReturnString))
            })
            .count()
    }

    /// Postfix rendering of the program, for debugging.
    pub fn postfix(&self) -> String {
        Postfix(self).to_string()
    }
}
