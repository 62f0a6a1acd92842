//! The stack-machine evaluator.
//!
//! A program counter walks the flattened op-code stream: literals push onto
//! the numeric or string stack, every other op-code pops its arguments,
//! applies the operation (the same logic the optimizer uses for constant
//! folding), and pushes exactly one result.  Stack depths were fixed at
//! compile time, so the loop never bounds-checks.

mod dates;
mod operate;

#[cfg(test)]
mod eval_test;

use bumpalo::Bump;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use smallvec::SmallVec;

use crate::catalog::{OpFlags, Opcode};
use crate::data::{Case, CaseLookback, Dictionary, SYSMIS, Value, VarId, VectorId, count_valid};
use crate::diagnostics::DiagnosticSink;
use crate::flatten::{Expression, Instr, ResultType};
use crate::format::FmtSpec;
use crate::settings::Settings;
use crate::syntax::Span;

use operate::Operands;

/// Per-evaluation scratch state: the arena for transient string results.
///
/// The arena is cleared at the *start* of each evaluation, so the previous
/// evaluation's string results stay valid until the evaluator runs again —
/// which the borrow checker enforces, since the result borrows the scratch.
#[derive(Default)]
pub struct Scratch {
    bump: Bump,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one evaluation may consult.
///
/// A record is required exactly when the expression was compiled against a
/// dictionary.  Each concurrently evaluating thread brings its own context
/// and scratch; the compiled program itself is shared read-only.
pub struct EvalContext<'a> {
    pub case: Option<&'a Case>,
    /// 1-based index of the current record, for `$CASENUM`.
    pub case_num: f64,
    pub lookback: Option<&'a dyn CaseLookback>,
    pub dict: Option<&'a Dictionary>,
    pub settings: &'a Settings,
    pub sink: Option<&'a dyn DiagnosticSink>,
    /// State for the random-variate operations.
    pub rng: Xoshiro256PlusPlus,
}

impl<'a> EvalContext<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            case: None,
            case_num: 0.0,
            lookback: None,
            dict: None,
            settings,
            sink: None,
            rng: Xoshiro256PlusPlus::seed_from_u64(settings.rng_seed),
        }
    }

    pub fn with_case(mut self, dict: &'a Dictionary, case: &'a Case) -> Self {
        self.dict = Some(dict);
        self.case = Some(case);
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub(crate) fn warn(&self, span: Option<Span>, message: String) {
        if let Some(sink) = self.sink {
            sink.warn(span, message);
        }
    }

    pub(crate) fn var(&self, id: VarId) -> &'a crate::data::Variable {
        self.dict.expect("variable access without dictionary").var(id)
    }

    pub(crate) fn vector(&self, id: VectorId) -> &'a crate::data::Vector {
        self.dict
            .expect("vector access without dictionary")
            .vector(id)
    }
}

impl Expression {
    /// Evaluates the program against one record.
    ///
    /// String results live in `scratch` and stay valid until the next
    /// evaluation that borrows it.
    pub fn evaluate<'s>(&self, ctx: &mut EvalContext<'_>, scratch: &'s mut Scratch) -> Value<'s> {
        // Without a dictionary the expression cannot reference record data
        // and needs no record; with one, it must have a record.
        assert_eq!(
            ctx.case.is_some(),
            self.needs_case,
            "a record must be supplied exactly when the expression was compiled against a data \
             source"
        );

        scratch.bump.reset();
        let bump: &'s Bump = &scratch.bump;

        let mut ns: Vec<f64> = Vec::with_capacity(self.number_stack_size);
        let mut ss: Vec<&'s str> = Vec::with_capacity(self.string_stack_size);
        let mut pc = 0usize;
        loop {
            debug_assert!(pc < self.code().len());
            let instr = &self.code()[pc];
            pc += 1;
            match instr {
                Instr::Number(x) => ns.push(*x),
                Instr::Str(s) => ss.push(&*bump.alloc_str(s)),
                Instr::Op(Opcode::ReturnNumber) => {
                    let x = *ns.last().unwrap();
                    return Value::Number(if x.is_finite() { x } else { SYSMIS });
                }
                Instr::Op(Opcode::ReturnString) => {
                    return Value::Str(*ss.last().unwrap());
                }
                Instr::Op(op) => {
                    let op = *op;
                    self.step(op, &mut pc, &mut ns, &mut ss, ctx, bump);
                }
                _ => unreachable!("operand instruction in execution position"),
            }
        }
    }

    /// Evaluates a numeric or boolean expression to its number.
    pub fn evaluate_number(&self, ctx: &mut EvalContext<'_>, scratch: &mut Scratch) -> f64 {
        assert_ne!(self.result_type, ResultType::String);
        self.evaluate(ctx, scratch).as_number()
    }

    /// Evaluates a string expression into `dst`, space-padded or truncated
    /// to the buffer's length.
    pub fn evaluate_string_into(
        &self,
        ctx: &mut EvalContext<'_>,
        scratch: &mut Scratch,
        dst: &mut [u8],
    ) {
        assert_eq!(self.result_type, ResultType::String);
        let value = self.evaluate(ctx, scratch);
        let s = value.as_str().as_bytes();
        let n = s.len().min(dst.len());
        dst[..n].copy_from_slice(&s[..n]);
        for byte in &mut dst[n..] {
            *byte = b' ';
        }
    }

    fn fetch<'e>(&'e self, pc: &mut usize) -> &'e Instr {
        let instr = &self.code()[*pc];
        *pc += 1;
        instr
    }

    /// Pops one operation's arguments, applies it, pushes its result.
    fn step<'s>(
        &self,
        op: Opcode,
        pc: &mut usize,
        ns: &mut Vec<f64>,
        ss: &mut Vec<&'s str>,
        ctx: &mut EvalContext<'_>,
        bump: &'s Bump,
    ) {
        let info = op.info();
        let mut o = Operands::default();

        let scalar_args = if info.has_array() {
            &info.args[..info.n_args() - 1]
        } else {
            info.args
        };

        // Inline operands follow the opcode in argument order.
        let mut n_num = 0usize;
        let mut n_str = 0usize;
        for &arg in scalar_args {
            match arg {
                Opcode::Number | Opcode::Boolean | Opcode::Integer | Opcode::NumVecElem => {
                    n_num += 1;
                }
                Opcode::String => n_str += 1,
                Opcode::NumVarRef | Opcode::StrVarRef => {
                    let Instr::Var(var) = self.fetch(pc) else {
                        unreachable!();
                    };
                    o.vars.push(*var);
                }
                Opcode::VectorRef => {
                    let Instr::Vector(vector) = self.fetch(pc) else {
                        unreachable!();
                    };
                    o.vectors.push(*vector);
                }
                Opcode::NiFormat | Opcode::NoFormat => {
                    let Instr::Format(spec) = self.fetch(pc) else {
                        unreachable!();
                    };
                    o.formats.push(*spec);
                }
                Opcode::PosInt => {
                    let Instr::Integer(value) = self.fetch(pc) else {
                        unreachable!();
                    };
                    o.ints.push(*value);
                }
                Opcode::NodeSpan => {
                    let Instr::Span(span) = self.fetch(pc) else {
                        unreachable!();
                    };
                    o.span = *span;
                }
                _ => unreachable!("bad argument atom type"),
            }
        }

        // Trailing operands: array length, minimum-valid count, span.
        let mut array_n = 0usize;
        if info.has_array() {
            let Instr::Integer(n) = self.fetch(pc) else {
                unreachable!();
            };
            array_n = *n as usize;
        }
        if info.flags.contains(OpFlags::MIN_VALID) {
            let Instr::Integer(n) = self.fetch(pc) else {
                unreachable!();
            };
            o.min_valid = *n as usize;
        }
        if info.flags.contains(OpFlags::NEEDS_SPAN) {
            let Instr::Span(span) = self.fetch(pc) else {
                unreachable!();
            };
            o.span = *span;
        }

        // Pop the array block, then the scalars beneath it.
        let array_elem = if info.has_array() {
            info.args.last().copied()
        } else {
            None
        };
        match array_elem {
            Some(Opcode::Number) => {
                let base = ns.len() - array_n;
                o.num_array.extend_from_slice(&ns[base..]);
                ns.truncate(base);
            }
            Some(Opcode::String) => {
                let base = ss.len() - array_n;
                o.str_array.extend_from_slice(&ss[base..]);
                ss.truncate(base);
            }
            _ => {}
        }
        {
            let base = ns.len() - n_num;
            o.nums = SmallVec::from_slice(&ns[base..]);
            ns.truncate(base);
            let base = ss.len() - n_str;
            o.strs = SmallVec::from_slice(&ss[base..]);
            ss.truncate(base);
        }

        // Default, conservative missing propagation: unless the operation
        // absorbs missing values, any missing argument (or short valid
        // count) forces a missing result before its own logic runs.
        let absorb = info.flags.contains(OpFlags::ABSORB_MISSING);
        let force_missing = if !absorb {
            o.nums.iter().any(|&x| x == SYSMIS)
                || (array_elem == Some(Opcode::Number)
                    && count_valid(&o.num_array) < array_n)
        } else {
            info.flags.contains(OpFlags::MIN_VALID) && count_valid(&o.num_array) < o.min_valid
        };

        let result = if force_missing {
            match info.returns {
                Opcode::String => Value::Str(""),
                _ => Value::Number(SYSMIS),
            }
        } else {
            operate::operate(op, &o, ctx, bump)
        };

        match result {
            Value::Number(x) => ns.push(x),
            Value::Str(s) => ss.push(s),
        }
    }
}
