//! The expression-tree arena.
//!
//! Nodes are addressed by index into one arena; parent-child "ownership"
//! is index containment, and the whole tree is dropped together.  Source
//! spans are computed lazily as the union of descendant spans and cached,
//! after which they never change.

use ecow::EcoString;
use smallvec::SmallVec;

use crate::catalog::Opcode;
use crate::data::{SYSMIS, VarId, VectorId};
use crate::format::FmtSpec;
use crate::syntax::Span;

/// Handle to a node in an [`ExprArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Node payload, keyed by the node's opcode.
#[derive(Clone, Debug)]
pub enum Payload {
    /// Composites with no auxiliary data.
    None,
    /// `Number` and `Boolean` leaves.
    Number(f64),
    /// `String` leaves.
    Str(EcoString),
    /// `Integer` and `PosInt` leaves.
    Integer(i64),
    /// `NumVarRef` and `StrVarRef` leaves.
    Variable(VarId),
    /// `VectorRef` leaves.
    Vector(VectorId),
    /// `Format`, `NiFormat` and `NoFormat` leaves.
    Format(FmtSpec),
    /// `NodeSpan` leaves: another node whose span locates a runtime
    /// diagnostic.
    NodeRef(NodeId),
    /// Functions and operators.
    Composite {
        args: SmallVec<[NodeId; 4]>,
        /// Minimum valid array elements for a non-missing result.
        min_valid: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Node {
    pub op: Opcode,
    pub payload: Payload,
    pub(crate) span: Option<Span>,
}

impl Node {
    /// Children of a composite node; empty for leaves.
    pub fn args(&self) -> &[NodeId] {
        match &self.payload {
            Payload::Composite { args, .. } => args,
            _ => &[],
        }
    }

    pub fn min_valid(&self) -> usize {
        match &self.payload {
            Payload::Composite { min_valid, .. } => *min_valid,
            _ => 0,
        }
    }

    pub fn as_number(&self) -> f64 {
        match &self.payload {
            Payload::Number(x) => *x,
            _ => panic!("node payload is not a number"),
        }
    }
}

/// Arena owning every node (and cached span) of one expression tree.
#[derive(Default)]
pub struct ExprArena {
    nodes: Vec<Node>,
    /// Deepest lookback the expression performs, recorded at parse time.
    pub max_lag: usize,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, op: Opcode, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            op,
            payload,
            span: None,
        });
        id
    }

    pub fn alloc_number(&mut self, value: f64) -> NodeId {
        self.alloc(Opcode::Number, Payload::Number(value))
    }

    pub fn alloc_boolean(&mut self, value: f64) -> NodeId {
        debug_assert!(value == 0.0 || value == 1.0 || value == SYSMIS);
        self.alloc(Opcode::Boolean, Payload::Number(value))
    }

    pub fn alloc_string(&mut self, value: EcoString) -> NodeId {
        self.alloc(Opcode::String, Payload::Str(value))
    }

    pub fn alloc_integer(&mut self, value: i64) -> NodeId {
        self.alloc(Opcode::Integer, Payload::Integer(value))
    }

    pub fn alloc_pos_int(&mut self, value: i64) -> NodeId {
        debug_assert!(value > 0);
        self.alloc(Opcode::PosInt, Payload::Integer(value))
    }

    pub fn alloc_variable(&mut self, id: VarId, is_numeric: bool) -> NodeId {
        let op = if is_numeric {
            Opcode::NumVarRef
        } else {
            Opcode::StrVarRef
        };
        self.alloc(op, Payload::Variable(id))
    }

    pub fn alloc_vector(&mut self, id: VectorId) -> NodeId {
        self.alloc(Opcode::VectorRef, Payload::Vector(id))
    }

    pub fn alloc_format(&mut self, op: Opcode, spec: FmtSpec) -> NodeId {
        debug_assert!(matches!(
            op,
            Opcode::Format | Opcode::NiFormat | Opcode::NoFormat
        ));
        self.alloc(op, Payload::Format(spec))
    }

    pub fn alloc_node_ref(&mut self, target: NodeId) -> NodeId {
        self.alloc(Opcode::NodeSpan, Payload::NodeRef(target))
    }

    pub fn alloc_composite(&mut self, op: Opcode, args: &[NodeId], min_valid: usize) -> NodeId {
        debug_assert!(op.is_composite());
        self.alloc(
            op,
            Payload::Composite {
                args: SmallVec::from_slice(args),
                min_valid,
            },
        )
    }

    pub fn alloc_unary(&mut self, op: Opcode, arg: NodeId) -> NodeId {
        self.alloc_composite(op, &[arg], 0)
    }

    pub fn alloc_binary(&mut self, op: Opcode, a: NodeId, b: NodeId) -> NodeId {
        self.alloc_composite(op, &[a, b], 0)
    }

    /// Atom type produced by a node: the node's own type for atoms, the
    /// catalog return type for composites.
    pub fn returns(&self, id: NodeId) -> Opcode {
        let node = self.node(id);
        if node.op.is_atom() {
            node.op
        } else {
            node.op.info().returns
        }
    }

    /// Sets a node's span unless one is already present.
    pub fn set_span_if_unset(&mut self, id: NodeId, span: Span) {
        let node = self.node_mut(id);
        if node.span.is_none() {
            node.span = Some(span);
        }
    }

    /// Source span of a node, computed lazily as the union of its
    /// descendants' spans and cached.
    pub fn span_of(&mut self, id: NodeId) -> Option<Span> {
        if let Some(span) = self.node(id).span {
            return Some(span);
        }
        let computed = self.compute_span(id);
        if let Some(span) = computed {
            self.node_mut(id).span = Some(span);
        }
        computed
    }

    fn compute_span(&self, id: NodeId) -> Option<Span> {
        let node = self.node(id);
        if let Some(span) = node.span {
            return Some(span);
        }
        let mut acc: Option<Span> = None;
        for &arg in node.args() {
            if let Some(span) = self.compute_span(arg) {
                acc = Some(acc.map_or(span, |a| a.union(span)));
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_union_lazily() {
        let mut arena = ExprArena::new();
        let a = arena.alloc_number(1.0);
        let b = arena.alloc_number(2.0);
        arena.set_span_if_unset(a, Span::new(0, 1));
        arena.set_span_if_unset(b, Span::new(4, 5));
        let sum = arena.alloc_binary(Opcode::Add, a, b);
        assert_eq!(arena.span_of(sum), Some(Span::new(0, 5)));
        // Cached: direct field now set.
        assert_eq!(arena.node(sum).span, Some(Span::new(0, 5)));
    }

    #[test]
    fn returns_follows_catalog() {
        let mut arena = ExprArena::new();
        let a = arena.alloc_number(1.0);
        let b = arena.alloc_number(2.0);
        let eq = arena.alloc_binary(Opcode::Eq, a, b);
        assert_eq!(arena.returns(a), Opcode::Number);
        assert_eq!(arena.returns(eq), Opcode::Boolean);
    }
}
