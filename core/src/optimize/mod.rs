//! Tree-to-tree optimization.
//!
//! A bottom-up rewrite with three rules, applied in order at each
//! composite node once its children are optimized:
//!
//! 1. A missing constant child forces the node to a missing constant,
//!    unless the operation absorbs missing values.
//! 2. If every child is a constant and the operation is foldable, the
//!    subtree is flattened and run through the evaluator — the very same
//!    per-operation logic the interpreter uses — and replaced by the
//!    resulting constant.
//! 3. A fixed table of algebraic identities.
//!
//! Replacement nodes inherit the replaced node's source span.


use ecow::EcoString;

use crate::catalog::{OpFlags, Opcode};
use crate::data::{SYSMIS, Value};
use crate::diagnostics::DiagnosticSink;
use crate::eval::{EvalContext, Scratch};
use crate::flatten::{self, ResultType};
use crate::parser::{ExprArena, NodeId, Payload};
use crate::settings::Settings;

/// Optimizes the tree rooted at `node`, returning the replacement root.
pub fn optimize(
    arena: &mut ExprArena,
    node: NodeId,
    settings: &Settings,
    sink: &dyn DiagnosticSink,
) -> NodeId {
    // Atoms are already as small as they get.
    if arena.node(node).op.is_atom() {
        return node;
    }

    // Children first.
    let args: Vec<NodeId> = arena.node(node).args().to_vec();
    let mut n_sysmis = 0usize;
    let mut n_nonconst = 0usize;
    for (idx, &arg) in args.iter().enumerate() {
        let new_arg = optimize(arena, arg, settings, sink);
        if let Payload::Composite { args, .. } = &mut arena.node_mut(node).payload {
            args[idx] = new_arg;
        }
        let arg_node = arena.node(new_arg);
        if arg_node.op == Opcode::Number && arg_node.as_number() == SYSMIS {
            n_sysmis += 1;
        }
        if !arg_node.op.is_atom() {
            n_nonconst += 1;
        }
    }

    let info = arena.node(node).op.info();
    let new_node = if n_sysmis > 0 && !info.flags.contains(OpFlags::ABSORB_MISSING) {
        // Most operations produce a missing result from any missing
        // argument.
        debug_assert!(matches!(info.returns, Opcode::Number | Opcode::Boolean));
        if info.returns == Opcode::Boolean {
            arena.alloc_boolean(SYSMIS)
        } else {
            arena.alloc_number(SYSMIS)
        }
    } else if n_nonconst == 0 && !info.flags.contains(OpFlags::NO_FOLD) {
        fold_constant(arena, node, settings, sink)
    } else {
        simplify(arena, node)
    };

    if new_node != node && arena.node(new_node).span.is_none() {
        if let Some(span) = arena.span_of(node) {
            arena.set_span_if_unset(new_node, span);
        }
    }
    new_node
}

/// Evaluates a constant subtree with the runtime interpreter and replaces
/// it with the result.
fn fold_constant(
    arena: &mut ExprArena,
    node: NodeId,
    settings: &Settings,
    sink: &dyn DiagnosticSink,
) -> NodeId {
    let program = flatten::flatten(arena, node, false);
    let mut ctx = EvalContext::new(settings).with_sink(sink);
    let mut scratch = Scratch::new();
    let folded = match program.evaluate(&mut ctx, &mut scratch) {
        Value::Number(x) => {
            if program.result_type() == ResultType::Boolean {
                arena.alloc_boolean(x)
            } else {
                arena.alloc_number(x)
            }
        }
        Value::Str(s) => arena.alloc_string(EcoString::from(s)),
    };
    tracing::trace!(op = ?arena.node(node).op, "folded constant subtree");
    folded
}

fn is_number(arena: &ExprArena, id: NodeId, value: f64) -> bool {
    let node = arena.node(id);
    node.op == Opcode::Number && node.as_number() == value
}

/// The fixed algebraic identity table.  Exhaustive; nothing else is
/// simplified.
fn simplify(arena: &mut ExprArena, node: NodeId) -> NodeId {
    use Opcode::*;

    let op = arena.node(node).op;
    let args: Vec<NodeId> = arena.node(node).args().to_vec();

    // x+0, x-0, 0+x => x.
    if matches!(op, Add | Sub) && is_number(arena, args[1], 0.0) {
        args[0]
    } else if op == Add && is_number(arena, args[0], 0.0) {
        args[1]
    }
    // x*1, x/1, 1*x => x.
    else if matches!(op, Mul | Div) && is_number(arena, args[1], 1.0) {
        args[0]
    } else if op == Mul && is_number(arena, args[0], 1.0) {
        args[1]
    }
    // 0*x, 0/x, x*0, MOD(0,x) => 0.
    else if (matches!(op, Mul | Div | Mod) && is_number(arena, args[0], 0.0))
        || (op == Mul && is_number(arena, args[1], 0.0))
    {
        arena.alloc_number(0.0)
    }
    // x**1 => x.
    else if op == Pow && is_number(arena, args[1], 1.0) {
        args[0]
    }
    // x**2 => SQUARE(x).
    else if op == Pow && is_number(arena, args[1], 2.0) {
        arena.alloc_unary(Square, args[0])
    }
    // The Boolean-to-number marker is a no-op.
    else if op == BooleanToNum {
        args[0]
    } else {
        node
    }
}
