//! Recursive-descent expression parser.
//!
//! Classic precedence climbing, lowest to highest: `OR`, `AND`, `NOT`,
//! relational, additive, multiplicative, unary minus, `**`, then primaries.
//! Name resolution and overload selection go through the operation
//! [`catalog`](crate::catalog); argument coercion inserts the small, closed
//! set of conversion operators and nothing else.

pub mod tree;


use ecow::EcoString;

use crate::calendar;
use crate::catalog::{OpFlags, Opcode, extract_min_valid, lookup_function};
use crate::data::{Dictionary, SYSMIS, VarId};
use crate::diagnostics::DiagnosticSink;
use crate::format::FmtSpec;
use crate::settings::{Settings, Syntax};
use crate::syntax::{Span, TokenCursor, TokenKind};

pub use tree::{ExprArena, Node, NodeId, Payload};

/// Operator name for diagnostics; the Boolean type is an internal concept,
/// so diagnostics call it a number.
pub(crate) fn atom_type_name(op: Opcode) -> &'static str {
    debug_assert!(op.is_atom());
    if op == Opcode::Boolean {
        "number"
    } else {
        op.info().name
    }
}

/// Tokens that can act as binary operators, folded across their spellings
/// (`=` and `EQ` are the same operator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpToken {
    Or,
    And,
    Not,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    Plus,
    Dash,
    NegNum,
    Asterisk,
    Slash,
    Exp,
}

impl OpToken {
    fn of(kind: &TokenKind) -> Option<OpToken> {
        Some(match kind {
            TokenKind::Or => OpToken::Or,
            TokenKind::And => OpToken::And,
            TokenKind::Not => OpToken::Not,
            TokenKind::Equals | TokenKind::Eq => OpToken::Eq,
            TokenKind::Ne => OpToken::Ne,
            TokenKind::Ge => OpToken::Ge,
            TokenKind::Gt => OpToken::Gt,
            TokenKind::Le => OpToken::Le,
            TokenKind::Lt => OpToken::Lt,
            TokenKind::Plus => OpToken::Plus,
            TokenKind::Dash => OpToken::Dash,
            TokenKind::NegNumber(_) => OpToken::NegNum,
            TokenKind::Asterisk => OpToken::Asterisk,
            TokenKind::Slash => OpToken::Slash,
            TokenKind::Exp => OpToken::Exp,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            OpToken::Or => "OR",
            OpToken::And => "AND",
            OpToken::Not => "NOT",
            OpToken::Eq => "=",
            OpToken::Ne => "<>",
            OpToken::Ge => ">=",
            OpToken::Gt => ">",
            OpToken::Le => "<=",
            OpToken::Lt => "<",
            OpToken::Plus => "+",
            OpToken::Dash | OpToken::NegNum => "-",
            OpToken::Asterisk => "*",
            OpToken::Slash => "/",
            OpToken::Exp => "**",
        }
    }
}

/// How to parse one binary operator: the token, the numeric operation, and
/// the string operation when the operator is overloaded on strings.
struct Operator {
    token: OpToken,
    num_op: Opcode,
    str_op: Option<Opcode>,
}

const OR_OPS: &[Operator] = &[Operator {
    token: OpToken::Or,
    num_op: Opcode::Or,
    str_op: None,
}];

const AND_OPS: &[Operator] = &[Operator {
    token: OpToken::And,
    num_op: Opcode::And,
    str_op: None,
}];

const REL_OPS: &[Operator] = &[
    Operator {
        token: OpToken::Eq,
        num_op: Opcode::Eq,
        str_op: Some(Opcode::EqStr),
    },
    Operator {
        token: OpToken::Ne,
        num_op: Opcode::Ne,
        str_op: Some(Opcode::NeStr),
    },
    Operator {
        token: OpToken::Ge,
        num_op: Opcode::Ge,
        str_op: Some(Opcode::GeStr),
    },
    Operator {
        token: OpToken::Gt,
        num_op: Opcode::Gt,
        str_op: Some(Opcode::GtStr),
    },
    Operator {
        token: OpToken::Le,
        num_op: Opcode::Le,
        str_op: Some(Opcode::LeStr),
    },
    Operator {
        token: OpToken::Lt,
        num_op: Opcode::Lt,
        str_op: Some(Opcode::LtStr),
    },
];

const ADD_OPS: &[Operator] = &[
    Operator {
        token: OpToken::Plus,
        num_op: Opcode::Add,
        str_op: None,
    },
    Operator {
        token: OpToken::Dash,
        num_op: Opcode::Sub,
        str_op: None,
    },
    // `x -5` parses as implied addition of a negative literal.
    Operator {
        token: OpToken::NegNum,
        num_op: Opcode::Add,
        str_op: None,
    },
];

const MUL_OPS: &[Operator] = &[
    Operator {
        token: OpToken::Asterisk,
        num_op: Opcode::Mul,
        str_op: None,
    },
    Operator {
        token: OpToken::Slash,
        num_op: Opcode::Div,
        str_op: None,
    },
];

const EXP_OPS: &[Operator] = &[Operator {
    token: OpToken::Exp,
    num_op: Opcode::Pow,
    str_op: None,
}];

const REL_CHAIN_WARNING: &str = "Chaining relational operators (e.g. `a < b < c') will \
not produce the mathematically expected result.  \
Use the AND logical operator to fix the problem \
(e.g. `a < b AND b < c').  \
To disable this warning, insert parentheses.";

const EXP_CHAIN_WARNING: &str = "The exponentiation operator (`**') is left-associative: \
`a**b**c' equals `(a**b)**c', not `a**(b**c)'.  \
To disable this warning, insert parentheses.";

/// Expression parser over one token cursor.
///
/// All errors are reported through the diagnostic sink; parsing methods
/// return `None` after reporting, and no partial tree survives.
pub struct Parser<'a, C: TokenCursor> {
    pub cursor: &'a mut C,
    pub arena: &'a mut ExprArena,
    pub dict: Option<&'a Dictionary>,
    pub settings: &'a Settings,
    pub sink: &'a dyn DiagnosticSink,
}

impl<'a, C: TokenCursor> Parser<'a, C> {
    pub fn new(
        cursor: &'a mut C,
        arena: &'a mut ExprArena,
        dict: Option<&'a Dictionary>,
        settings: &'a Settings,
        sink: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            cursor,
            arena,
            dict,
            settings,
            sink,
        }
    }

    /// Parses one complete expression.
    pub fn parse_expression(&mut self) -> Option<NodeId> {
        let node = self.parse_or()?;
        // A raw vector element at the root behaves like any numeric value.
        if self.arena.node(node).op == Opcode::VecElemNumRaw {
            self.arena.node_mut(node).op = Opcode::VecElemNum;
        }
        Some(node)
    }

    // === Token helpers ===

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.cursor.kind() == kind {
            self.cursor.advance();
            true
        } else {
            false
        }
    }

    fn force_match(&mut self, kind: &TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.sink.error(
                Some(self.cursor.span()),
                format!("Syntax error expecting `{}`.", kind.name()),
            );
            false
        }
    }

    /// Span of tokens from `start_ofs` through the token before the
    /// current one.
    fn span_from(&self, start_ofs: usize) -> Span {
        let end = self.cursor.offset().saturating_sub(1).max(start_ofs);
        self.cursor.span_between(start_ofs, end)
    }

    fn add_location(&mut self, start_ofs: usize, node: NodeId) {
        let span = self.span_from(start_ofs);
        self.arena.set_span_if_unset(node, span);
    }

    // === Coercion ===

    /// Checks (and with `do_coercion`, performs) conversion of argument
    /// `arg_idx` of `node` to its required parameter type.  This is the
    /// complete, closed set of legal conversions.
    fn coerce_inner(&mut self, node_id: NodeId, arg_idx: usize, do_coercion: bool) -> bool {
        let node = self.arena.node(node_id);
        let info = node.op.info();
        let arg_id = node.args()[arg_idx];
        let required = info.args[arg_idx.min(info.n_args() - 1)];
        let actual = self.arena.returns(arg_id);
        if actual == required {
            return true;
        }

        let arg_op = self.arena.node(arg_id).op;
        match required {
            Opcode::Number => {
                if actual == Opcode::Boolean {
                    // Strict typing: insert a Boolean-to-number marker.
                    // It is a no-op and the optimizer strips it.
                    if do_coercion {
                        let wrapped = self.arena.alloc_unary(Opcode::BooleanToNum, arg_id);
                        self.set_arg(node_id, arg_idx, wrapped);
                    }
                    true
                } else if actual == Opcode::NumVecElem {
                    // Commit the raw vector element to its coerced form.
                    if do_coercion {
                        self.arena.node_mut(arg_id).op = Opcode::VecElemNum;
                    }
                    true
                } else {
                    false
                }
            }
            // No coercion to string, ever.
            Opcode::String => false,
            Opcode::Boolean => {
                if actual == Opcode::Number {
                    // Insert a runtime range check that warns about and
                    // zeroes values outside {0, 1, missing}.
                    if do_coercion {
                        let span_leaf = self.arena.alloc_node_ref(node_id);
                        let wrapped =
                            self.arena
                                .alloc_binary(Opcode::OperandToBoolean, arg_id, span_leaf);
                        self.set_arg(node_id, arg_idx, wrapped);
                    }
                    true
                } else {
                    false
                }
            }
            Opcode::Integer => {
                if actual == Opcode::Number {
                    if do_coercion {
                        let wrapped = self.arena.alloc_unary(Opcode::NumToInteger, arg_id);
                        self.set_arg(node_id, arg_idx, wrapped);
                    }
                    true
                } else {
                    false
                }
            }
            Opcode::NiFormat => {
                if arg_op == Opcode::Format && self.format_of(arg_id).check_input().is_ok() {
                    if do_coercion {
                        self.arena.node_mut(arg_id).op = Opcode::NiFormat;
                    }
                    true
                } else {
                    false
                }
            }
            Opcode::NoFormat => {
                if arg_op == Opcode::Format && self.format_of(arg_id).check_output().is_ok() {
                    if do_coercion {
                        self.arena.node_mut(arg_id).op = Opcode::NoFormat;
                    }
                    true
                } else {
                    false
                }
            }
            Opcode::NumVarRef => {
                if arg_op == Opcode::NumVar {
                    // The parameter wants the bare variable, not its value.
                    if do_coercion {
                        let leaf = self.arena.node(arg_id).args()[0];
                        self.set_arg(node_id, arg_idx, leaf);
                    }
                    true
                } else {
                    false
                }
            }
            Opcode::StrVarRef => {
                if arg_op == Opcode::StrVar {
                    if do_coercion {
                        let leaf = self.arena.node(arg_id).args()[0];
                        self.set_arg(node_id, arg_idx, leaf);
                    }
                    true
                } else {
                    false
                }
            }
            Opcode::PosInt => {
                if arg_op == Opcode::Number {
                    let value = self.arena.node(arg_id).as_number();
                    if value.floor() == value && value > 0.0 && value < i32::MAX as f64 {
                        if do_coercion {
                            let leaf = self.arena.alloc_pos_int(value as i64);
                            self.set_arg(node_id, arg_idx, leaf);
                        }
                        return true;
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn set_arg(&mut self, node_id: NodeId, arg_idx: usize, arg: NodeId) {
        if let Payload::Composite { args, .. } = &mut self.arena.node_mut(node_id).payload {
            args[arg_idx] = arg;
        }
    }

    fn format_of(&self, id: NodeId) -> FmtSpec {
        match &self.arena.node(id).payload {
            Payload::Format(spec) => *spec,
            _ => panic!("node payload is not a format"),
        }
    }

    fn is_coercible(&mut self, node_id: NodeId, arg_idx: usize) -> bool {
        self.coerce_inner(node_id, arg_idx, false)
    }

    fn type_coercion(&mut self, node_id: NodeId, arg_idx: usize) -> bool {
        self.coerce_inner(node_id, arg_idx, true)
    }

    // === Binary and unary operator levels ===

    fn match_operator(&mut self, ops: &[Operator], lhs: NodeId) -> Option<Opcode> {
        let lhs_is_numeric = self.arena.returns(lhs) != Opcode::String;
        let current = OpToken::of(self.cursor.kind())?;
        for op in ops {
            if op.token == current {
                // A negative-number token is left for the next level to
                // consume as the right operand.
                if current != OpToken::NegNum {
                    self.cursor.advance();
                }
                return Some(match op.str_op {
                    Some(str_op) if !lhs_is_numeric => str_op,
                    _ => op.num_op,
                });
            }
        }
        None
    }

    fn parse_binary_operators_from(
        &mut self,
        ops: &[Operator],
        next_level: fn(&mut Self) -> Option<NodeId>,
        chain_warning: Option<&str>,
        mut lhs: NodeId,
    ) -> Option<NodeId> {
        let mut op_count = 0;
        loop {
            let token = OpToken::of(self.cursor.kind());
            let Some(optype) = self.match_operator(ops, lhs) else {
                if op_count > 1 {
                    if let Some(warning) = chain_warning {
                        let span = self.arena.span_of(lhs);
                        self.sink.warn(span, warning);
                    }
                }
                return Some(lhs);
            };
            let token = token.unwrap();

            let rhs = next_level(self)?;
            let node = self.arena.alloc_binary(optype, lhs, rhs);
            if !self.is_coercible(node, 0) || !self.is_coercible(node, 1) {
                self.report_binary_mismatch(ops, token, node);
                return None;
            }
            let coerced = self.type_coercion(node, 0) && self.type_coercion(node, 1);
            debug_assert!(coerced);

            lhs = node;
            op_count += 1;
        }
    }

    fn parse_binary_operators(
        &mut self,
        ops: &[Operator],
        next_level: fn(&mut Self) -> Option<NodeId>,
        chain_warning: Option<&str>,
    ) -> Option<NodeId> {
        let lhs = next_level(self)?;
        self.parse_binary_operators_from(ops, next_level, chain_warning, lhs)
    }

    fn report_binary_mismatch(&mut self, ops: &[Operator], token: OpToken, node: NodeId) {
        let both = ops
            .iter()
            .any(|op| op.token == token && op.str_op.is_some());
        let name = token.name();
        let span = self.arena.span_of(node);
        if both {
            self.sink.error(
                span,
                format!("Both operands of {name} must have the same type."),
            );
        } else {
            self.sink
                .error(span, format!("Both operands of {name} must be numeric."));
        }
        for idx in 0..2 {
            let arg = self.arena.node(node).args()[idx];
            let type_name = atom_type_name(self.arena.returns(arg));
            let arg_span = self.arena.span_of(arg);
            self.sink
                .note(arg_span, format!("This operand has type '{type_name}'."));
        }
    }

    fn parse_inverting_unary_operator(
        &mut self,
        token: OpToken,
        opcode: Opcode,
        next_level: fn(&mut Self) -> Option<NodeId>,
    ) -> Option<NodeId> {
        let start_ofs = self.cursor.offset();
        let mut op_count = 0usize;
        while OpToken::of(self.cursor.kind()) == Some(token) {
            self.cursor.advance();
            op_count += 1;
        }

        let inner = next_level(self)?;
        if op_count == 0 {
            return Some(inner);
        }

        let outer = self.arena.alloc_unary(opcode, inner);
        self.add_location(start_ofs, outer);

        if !self.type_coercion(outer, 0) {
            let name = token.name();
            let span = self.arena.span_of(outer);
            self.sink.error(
                span,
                format!("The unary {name} operator requires a numeric operand."),
            );
            let arg = self.arena.node(outer).args()[0];
            let type_name = atom_type_name(self.arena.returns(arg));
            let arg_span = self.arena.span_of(arg);
            self.sink.note(
                arg_span,
                format!("The operand of {name} has type '{type_name}'."),
            );
            return None;
        }

        // Paired inversions cancel.
        if op_count % 2 == 1 {
            Some(outer)
        } else {
            Some(self.arena.node(outer).args()[0])
        }
    }

    fn parse_or(&mut self) -> Option<NodeId> {
        self.parse_binary_operators(OR_OPS, Self::parse_and, None)
    }

    fn parse_and(&mut self) -> Option<NodeId> {
        self.parse_binary_operators(AND_OPS, Self::parse_not, None)
    }

    fn parse_not(&mut self) -> Option<NodeId> {
        self.parse_inverting_unary_operator(OpToken::Not, Opcode::Not, Self::parse_rel)
    }

    fn parse_rel(&mut self) -> Option<NodeId> {
        self.parse_binary_operators(REL_OPS, Self::parse_add, Some(REL_CHAIN_WARNING))
    }

    fn parse_add(&mut self) -> Option<NodeId> {
        self.parse_binary_operators(ADD_OPS, Self::parse_mul, None)
    }

    fn parse_mul(&mut self) -> Option<NodeId> {
        self.parse_binary_operators(MUL_OPS, Self::parse_neg, None)
    }

    fn parse_neg(&mut self) -> Option<NodeId> {
        self.parse_inverting_unary_operator(OpToken::Dash, Opcode::Neg, Self::parse_exp)
    }

    fn parse_exp(&mut self) -> Option<NodeId> {
        if !matches!(self.cursor.kind(), TokenKind::NegNumber(_))
            || self.cursor.lookahead(1) != &TokenKind::Exp
        {
            return self.parse_binary_operators(
                EXP_OPS,
                Self::parse_primary,
                Some(EXP_CHAIN_WARNING),
            );
        }

        // `-5**6` binds the sign loosely: parse as -(5**6).
        let &TokenKind::NegNumber(magnitude) = self.cursor.kind() else {
            unreachable!();
        };
        let start_ofs = self.cursor.offset();
        let lhs = self.arena.alloc_number(magnitude);
        self.cursor.advance();
        self.add_location(start_ofs, lhs);

        let node = self.parse_binary_operators_from(
            EXP_OPS,
            Self::parse_primary,
            Some(EXP_CHAIN_WARNING),
            lhs,
        )?;

        let negated = self.arena.alloc_unary(Opcode::Neg, node);
        self.add_location(start_ofs, negated);
        Some(negated)
    }

    // === Primaries ===

    fn parse_primary(&mut self) -> Option<NodeId> {
        let start_ofs = self.cursor.offset();
        let node = self.parse_primary_inner()?;
        self.add_location(start_ofs, node);
        Some(node)
    }

    fn parse_primary_inner(&mut self) -> Option<NodeId> {
        match self.cursor.kind().clone() {
            TokenKind::Id(name) => {
                if self.cursor.lookahead(1) == &TokenKind::LParen {
                    // A name followed by `(` is a vector element reference
                    // if the name is a known vector, else a function call.
                    if self
                        .dict
                        .is_some_and(|d| d.lookup_vector(&name).is_some())
                    {
                        self.parse_vector_element(&name)
                    } else {
                        self.parse_function(&name)
                    }
                } else if name.starts_with('$') {
                    self.parse_sysvar(&name)
                } else if let Some(var) =
                    self.dict.and_then(|d| d.lookup_var(&name))
                {
                    self.cursor.advance();
                    Some(self.allocate_unary_variable(var))
                } else if let Ok(spec) = FmtSpec::parse(&name) {
                    self.cursor.advance();
                    Some(self.arena.alloc_format(Opcode::Format, spec))
                } else {
                    self.sink.error(
                        Some(self.cursor.span()),
                        format!("Unknown identifier {name}."),
                    );
                    None
                }
            }
            TokenKind::Number(value) => {
                self.cursor.advance();
                Some(self.arena.alloc_number(value))
            }
            TokenKind::NegNumber(magnitude) => {
                self.cursor.advance();
                Some(self.arena.alloc_number(-magnitude))
            }
            TokenKind::String(text) => {
                self.cursor.advance();
                Some(self.arena.alloc_string(text))
            }
            TokenKind::LParen => {
                self.cursor.advance();
                let node = self.parse_or()?;
                if !self.force_match(&TokenKind::RParen) {
                    return None;
                }
                Some(node)
            }
            _ => {
                self.sink.error(
                    Some(self.cursor.span()),
                    "Syntax error parsing expression.",
                );
                None
            }
        }
    }

    /// `$`-prefixed system variables, resolved at parse time where
    /// constant.
    fn parse_sysvar(&mut self, name: &str) -> Option<NodeId> {
        self.cursor.advance();
        let now = self.settings.now;
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "$CASENUM" => Some(self.arena.alloc_composite(Opcode::Casenum, &[], 0)),
            "$TRUE" => Some(self.arena.alloc_boolean(1.0)),
            "$FALSE" => Some(self.arena.alloc_boolean(0.0)),
            "$SYSMIS" => Some(self.arena.alloc_number(SYSMIS)),
            "$DATE" | "$DATE11" => {
                const MONTHS: [&str; 12] = [
                    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV",
                    "DEC",
                ];
                let month = MONTHS[(now.month.clamp(1, 12) - 1) as usize];
                let text = if upper == "$DATE" {
                    format!("{:02}-{}-{:02}", now.day, month, now.year % 100)
                } else {
                    format!("{:02}-{}-{:04}", now.day, month, now.year)
                };
                Some(self.arena.alloc_string(EcoString::from(text)))
            }
            "$JDATE" => {
                let ofs = self.current_date_offset();
                Some(self.arena.alloc_number(ofs))
            }
            "$TIME" => {
                let ofs = self.current_date_offset();
                let value = if ofs == SYSMIS {
                    SYSMIS
                } else {
                    ofs * calendar::DAY_S
                        + f64::from(now.hour) * calendar::H_S
                        + f64::from(now.minute) * calendar::MIN_S
                        + f64::from(now.second)
                };
                Some(self.arena.alloc_number(value))
            }
            "$LENGTH" => Some(self.arena.alloc_number(f64::from(self.settings.view_length))),
            "$WIDTH" => Some(self.arena.alloc_number(f64::from(self.settings.view_width))),
            _ => {
                self.sink.error(
                    Some(self.span_from(self.cursor.offset().saturating_sub(1))),
                    format!("Unknown system variable {name}."),
                );
                None
            }
        }
    }

    fn current_date_offset(&self) -> f64 {
        let now = self.settings.now;
        match calendar::gregorian_to_offset(now.year, now.month, now.day) {
            Ok(ofs) => ofs,
            Err(error) => {
                self.sink.error(None, error);
                SYSMIS
            }
        }
    }

    /// A variable reference: the leaf wrapped in the operator that fetches
    /// its value from the current record.
    fn allocate_unary_variable(&mut self, var: VarId) -> NodeId {
        let is_numeric = self.dict.unwrap().var(var).is_numeric();
        let leaf = self.arena.alloc_variable(var, is_numeric);
        let op = if is_numeric {
            Opcode::NumVar
        } else {
            Opcode::StrVar
        };
        self.arena.alloc_unary(op, leaf)
    }

    // === Vector elements ===

    fn parse_vector_element(&mut self, name: &str) -> Option<NodeId> {
        let vector_start_ofs = self.cursor.offset();
        let dict = self.dict.unwrap();
        let vector_id = dict.lookup_vector(name).unwrap();
        let is_numeric = dict.vector(vector_id).value_type == crate::data::ValueType::Numeric;
        self.cursor.advance();
        self.cursor.advance(); // The verified `(`.

        let element_start_ofs = self.cursor.offset();
        let element = self.parse_or()?;
        self.add_location(element_start_ofs, element);

        if !self.force_match(&TokenKind::RParen) {
            return None;
        }

        let optype = if is_numeric {
            Opcode::VecElemNumRaw
        } else {
            Opcode::VecElemStr
        };
        let vector_leaf = self.arena.alloc_vector(vector_id);
        let node = self.arena.alloc_binary(optype, element, vector_leaf);
        self.add_location(vector_start_ofs, node);

        if !self.type_coercion(node, 0) {
            let span = self.arena.span_of(node);
            self.sink.error(span, "A vector index must be numeric.");
            let arg = self.arena.node(node).args()[0];
            let type_name = atom_type_name(self.arena.returns(arg));
            let arg_span = self.arena.span_of(arg);
            self.sink.note(
                arg_span,
                format!("This vector index has type '{type_name}'."),
            );
            return None;
        }

        Some(node)
    }

    // === Function calls ===

    fn parse_function(&mut self, full_name: &str) -> Option<NodeId> {
        let (base_name, min_valid) = extract_min_valid(full_name);
        let Some(overloads) = lookup_function(base_name) else {
            self.sink.error(
                Some(self.cursor.span()),
                format!("No function or vector named {full_name}."),
            );
            return None;
        };

        let func_start_ofs = self.cursor.offset();
        self.cursor.advance();
        if !self.force_match(&TokenKind::LParen) {
            return None;
        }

        let mut args: Vec<NodeId> = Vec::new();
        if self.cursor.kind() != &TokenKind::RParen {
            loop {
                let arg_start_ofs = self.cursor.offset();
                if matches!(self.cursor.kind(), TokenKind::Id(_))
                    && self.cursor.lookahead(1) == &TokenKind::To
                {
                    self.parse_variable_range(&mut args, arg_start_ofs)?;
                } else {
                    let arg = self.parse_or()?;
                    self.add_location(arg_start_ofs, arg);
                    args.push(arg);
                }
                if self.eat(&TokenKind::RParen) {
                    break;
                } else if !self.eat(&TokenKind::Comma) {
                    self.sink.error(
                        Some(self.cursor.span()),
                        "Syntax error expecting `,` or `)`.",
                    );
                    return None;
                }
            }
        } else {
            self.cursor.advance();
        }

        let node = self.arena.alloc_composite(overloads[0], &args, 0);
        self.add_location(func_start_ofs, node);

        let Some(matched) = self.match_function(node, overloads) else {
            self.report_no_match(full_name, node, overloads);
            return None;
        };
        let info = matched.info();

        if let Payload::Composite {
            min_valid: node_min_valid,
            ..
        } = &mut self.arena.node_mut(node).payload
        {
            *node_min_valid = min_valid.unwrap_or(info.array_min_elems);
        }

        for idx in 0..args.len() {
            let ok = self.type_coercion(node, idx);
            debug_assert!(ok, "match_function already verified coercibility");
        }

        if !self.validate_function_args(node, matched, args.len(), min_valid) {
            return None;
        }

        if info.flags.contains(OpFlags::EXTENSION) && self.settings.syntax == Syntax::Compatible {
            let span = self.arena.span_of(node);
            self.sink
                .warn(span, format!("{} is a tabex extension.", info.prototype));
        }
        if info.flags.contains(OpFlags::PERM_ONLY) && self.settings.in_temporary_transformations {
            let span = self.arena.span_of(node);
            self.sink.error(
                span,
                format!("{} may not appear after TEMPORARY.", info.prototype),
            );
            return None;
        }

        self.note_lag(node, matched);
        Some(node)
    }

    /// Expands `first TO last` to the inclusive dictionary range.
    fn parse_variable_range(
        &mut self,
        args: &mut Vec<NodeId>,
        arg_start_ofs: usize,
    ) -> Option<()> {
        let TokenKind::Id(first_name) = self.cursor.kind().clone() else {
            unreachable!();
        };
        let Some(dict) = self.dict else {
            self.sink.error(
                Some(self.cursor.span()),
                format!("Unknown identifier {first_name}."),
            );
            return None;
        };
        let Some(first) = dict.lookup_var(&first_name) else {
            self.sink.error(
                Some(self.cursor.span()),
                format!("{first_name} is not a variable name."),
            );
            return None;
        };
        self.cursor.advance();
        self.cursor.advance(); // TO

        let TokenKind::Id(last_name) = self.cursor.kind().clone() else {
            self.sink.error(
                Some(self.cursor.span()),
                "Syntax error expecting a variable name.",
            );
            return None;
        };
        let Some(last) = dict.lookup_var(&last_name) else {
            self.sink.error(
                Some(self.cursor.span()),
                format!("{last_name} is not a variable name."),
            );
            return None;
        };
        self.cursor.advance();

        let Some(range) = dict.var_range(first, last) else {
            self.sink.error(
                Some(self.span_from(arg_start_ofs)),
                format!(
                    "{first_name} TO {last_name} is not valid syntax since {first_name} \
                     precedes {last_name} in the dictionary."
                ),
            );
            return None;
        };
        for var in range {
            let arg = self.allocate_unary_variable(var);
            self.add_location(arg_start_ofs, arg);
            args.push(arg);
        }
        Some(())
    }

    /// Selects the first overload, in catalog order, with a compatible
    /// arity whose every argument is coercible.
    fn match_function(&mut self, node: NodeId, overloads: &[Opcode]) -> Option<Opcode> {
        'next: for &candidate in overloads {
            let info = candidate.info();
            let n_args = self.arena.node(node).args().len();
            if n_args < info.n_args()
                || (n_args > info.n_args() && !info.has_array())
                || n_args - (info.n_args() - 1) < info.array_min_elems
            {
                continue;
            }
            self.arena.node_mut(node).op = candidate;
            for idx in 0..n_args {
                if !self.is_coercible(node, idx) {
                    continue 'next;
                }
            }
            return Some(candidate);
        }
        None
    }

    fn invocation(&self, func_name: &str, node: NodeId) -> String {
        let mut s = format!("{func_name}(");
        for (idx, &arg) in self.arena.node(node).args().iter().enumerate() {
            if idx > 0 {
                s.push_str(", ");
            }
            s.push_str(self.arena.returns(arg).info().prototype);
        }
        s.push(')');
        s
    }

    fn report_no_match(&mut self, func_name: &str, node: NodeId, overloads: &[Opcode]) {
        let invocation = self.invocation(func_name, node);
        let span = self.arena.span_of(node);
        if let [only] = overloads {
            let info = only.info();
            self.sink.error(
                span,
                format!("Type mismatch invoking {} as {}.", info.prototype, invocation),
            );
            if info.n_args() == self.arena.node(node).args().len() {
                self.arena.node_mut(node).op = *only;
                for idx in 0..info.n_args() {
                    if self.is_coercible(node, idx) {
                        continue;
                    }
                    let arg = self.arena.node(node).args()[idx];
                    let expected = info.args[idx];
                    let actual = self.arena.returns(arg);
                    let arg_span = self.arena.span_of(arg);
                    if matches!(expected, Opcode::NiFormat | Opcode::NoFormat)
                        && actual == Opcode::Format
                    {
                        let spec = self.format_of(arg);
                        let check = if expected == Opcode::NiFormat {
                            spec.check_input()
                        } else {
                            spec.check_output()
                        };
                        if let Err(error) = check {
                            self.sink.note(arg_span, error.to_string());
                        }
                    } else {
                        self.sink.note(
                            arg_span,
                            format!(
                                "This argument has type '{}' but '{}' is required.",
                                atom_type_name(actual),
                                atom_type_name(expected)
                            ),
                        );
                    }
                }
            }
        } else {
            let mut message = format!(
                "Function invocation {invocation} does not match any known function.  \
                 Candidates are:"
            );
            for op in overloads {
                message.push('\n');
                message.push_str(op.info().prototype);
            }
            message.push('.');
            self.sink.error(span, message);
        }
    }

    fn validate_function_args(
        &mut self,
        node: NodeId,
        matched: Opcode,
        n_args: usize,
        min_valid: Option<usize>,
    ) -> bool {
        let info = matched.info();
        let array_n_args = n_args + 1 - info.n_args();

        if info.has_array() && array_n_args % info.array_granularity != 0 {
            let span = self.arena.span_of(node);
            self.sink.error(
                span,
                format!("{} must have an odd number of arguments.", info.prototype),
            );
            return false;
        }

        if let Some(requested) = min_valid {
            if info.array_min_elems == 0 {
                let span = self.arena.span_of(node);
                self.sink.error(
                    span,
                    format!(
                        "{} function cannot accept suffix .{} to specify the minimum \
                         number of valid arguments.",
                        info.prototype, requested
                    ),
                );
                return false;
            } else if requested > array_n_args {
                let span = self.arena.span_of(node);
                self.sink.error(
                    span,
                    format!(
                        "For {} with {} arguments, at most {} (not {}) may be required \
                         to be valid.",
                        info.prototype, n_args, array_n_args, requested
                    ),
                );
                return false;
            }
        }

        true
    }

    /// Records the deepest lookback the expression performs.
    fn note_lag(&mut self, node: NodeId, matched: Opcode) {
        let lag = match matched {
            Opcode::LagNum | Opcode::LagStr => 1,
            Opcode::LagNumN | Opcode::LagStrN => {
                let arg = self.arena.node(node).args()[1];
                debug_assert_eq!(self.arena.node(arg).op, Opcode::PosInt);
                match &self.arena.node(arg).payload {
                    Payload::Integer(n) => *n as usize,
                    _ => 1,
                }
            }
            _ => return,
        };
        self.arena.max_lag = self.arena.max_lag.max(lag);
    }
}
