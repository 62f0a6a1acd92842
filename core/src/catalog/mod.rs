//! The operation catalog.
//!
//! One static table describes every atom, function, and operator the
//! expression language knows: display name, human-readable prototype, flag
//! bit-set, return type, and parameter types.  The parser resolves names
//! and overloads against this table; the optimizer and evaluator read the
//! flags to decide missing-value propagation and foldability.
//!
//! The original system generated this table from a declarative description;
//! here the [`operations!`] macro plays that role, and the table's internal
//! consistency rules are enforced by unit tests in `catalog_test`.

pub mod lookup;

#[cfg(test)]
mod catalog_test;

use bitflags::bitflags;
use static_assertions::const_assert;

pub use lookup::{extract_min_valid, lookup_function};

bitflags! {
    /// Behavioral flags for a catalog entry.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct OpFlags: u16 {
        /// The operation may produce a non-missing result from missing
        /// inputs.  Without this flag, any missing argument forces a
        /// missing result before the operation's own logic runs.
        const ABSORB_MISSING = 1 << 0;
        /// The final parameter is an array of one or more elements.
        const ARRAY_OPERAND = 1 << 1;
        /// The user may append `.n` to the name to set the minimum number
        /// of valid array elements.  Requires `ARRAY_OPERAND`,
        /// `ABSORB_MISSING`, and a numeric array.
        const MIN_VALID = 1 << 2;
        /// Never constant-folded (reads the record, the clock, or the RNG).
        const NO_FOLD = 1 << 3;
        /// Engine extension; warned about under compatible syntax.
        const EXTENSION = 1 << 4;
        /// Not allowed while temporary transformations are in effect.
        const PERM_ONLY = 1 << 5;
        /// The name may not be abbreviated.
        const NO_ABBREV = 1 << 6;
        /// The flattener appends the node's source span as a trailing
        /// operand so the evaluator can report located diagnostics.
        const NEEDS_SPAN = 1 << 7;
    }
}

/// Which of the three catalog sections an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Terminal node type.
    Atom,
    /// Callable by name, possibly abbreviated, possibly overloaded.
    Function,
    /// Infix/prefix operator or internal operation; never abbreviated.
    Operator,
}

/// Role of an atom type.
///
/// Context data that the evaluator supplies itself (the current record, the
/// record index, the RNG) plays the `Fixed` role; it never appears as a
/// node, so no atom opcode carries it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Usable anywhere; carries run-time data and has a missing value.
    Value,
    /// Usable as an operand but never returned by a composite.
    LeafOnly,
    /// Compile-time auxiliary data supplied by the evaluation context.
    Fixed,
    /// Not a data-carrying type.
    Marker,
}

/// Which evaluation stack a value of some atom type lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackUse {
    Number,
    String,
    None,
}

/// One immutable catalog entry.
#[derive(Debug)]
pub struct Operation {
    pub name: &'static str,
    pub prototype: &'static str,
    pub kind: Kind,
    pub flags: OpFlags,
    pub returns: Opcode,
    /// Parameter atom types; with `ARRAY_OPERAND`, the last entry is the
    /// repeated element type.
    pub args: &'static [Opcode],
    /// Minimum number of array elements.
    pub array_min_elems: usize,
    /// Array arguments must arrive in multiples of this (0 = no array).
    pub array_granularity: usize,
}

impl Operation {
    pub fn has_array(&self) -> bool {
        self.flags.contains(OpFlags::ARRAY_OPERAND)
    }

    pub fn n_args(&self) -> usize {
        self.args.len()
    }
}

macro_rules! operations {
    (
        $(
            $variant:ident = $kind:ident $name:literal, $proto:literal,
                ( $($arg:ident),* $(,)? )
                $([ $elem:ident; min $min:literal, by $gran:literal ])?
                -> $ret:ident
                $(, flags: $($flag:ident)|+ )? ;
        )+
    ) => {
        /// Every operation and atom type, in catalog order.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant),+
        }

        /// All opcodes, in declaration order.
        pub const ALL_OPCODES: &[Opcode] = &[$(Opcode::$variant),+];

        impl Opcode {
            /// Catalog entry for this opcode.
            pub fn info(self) -> &'static Operation {
                match self {
                    $(
                        Opcode::$variant => {
                            static INFO: Operation = Operation {
                                name: $name,
                                prototype: $proto,
                                kind: Kind::$kind,
                                flags: OpFlags::from_bits_retain(
                                    (0 $($(| OpFlags::$flag.bits())+)?)
                                    $(| { let _ = $min; OpFlags::ARRAY_OPERAND.bits() })?
                                ),
                                returns: Opcode::$ret,
                                args: &[$(Opcode::$arg,)* $(Opcode::$elem)?],
                                array_min_elems: 0 $(+ $min)?,
                                array_granularity: 0 $(+ $gran)?,
                            };
                            &INFO
                        }
                    ),+
                }
            }
        }
    };
}

operations! {
    // ===== Atoms =====
    Number = Atom "number", "number", () -> Number;
    Boolean = Atom "boolean", "boolean", () -> Boolean;
    String = Atom "string", "string", () -> String;
    Format = Atom "format", "format", () -> Format;
    NiFormat = Atom "ni_format", "input format", () -> NiFormat;
    NoFormat = Atom "no_format", "output format", () -> NoFormat;
    Integer = Atom "integer", "integer", () -> Integer;
    PosInt = Atom "pos_int", "positive integer constant", () -> PosInt;
    NumVarRef = Atom "num_var", "numeric variable", () -> NumVarRef;
    StrVarRef = Atom "str_var", "string variable", () -> StrVarRef;
    VectorRef = Atom "vector", "vector", () -> VectorRef;
    NumVecElem = Atom "num_vec_elem", "vector element", () -> NumVecElem;
    NodeSpan = Atom "node_span", "source location", () -> NodeSpan;
    ReturnNumber = Atom "return_number", "return_number", () -> ReturnNumber;
    ReturnString = Atom "return_string", "return_string", () -> ReturnString;

    // ===== Functions (alphabetical by name; overloads contiguous) =====
    Abs = Function "ABS", "ABS(number)", (Number) -> Number;
    AnyNum = Function "ANY", "ANY(number, number[, number]...)",
        (Number) [Number; min 0, by 1] -> Boolean, flags: ABSORB_MISSING;
    AnyStr = Function "ANY", "ANY(string, string[, string]...)",
        (String) [String; min 0, by 1] -> Boolean;
    Arcos = Function "ARCOS", "ARCOS(number)", (Number) -> Number;
    Arsin = Function "ARSIN", "ARSIN(number)", (Number) -> Number;
    Artan = Function "ARTAN", "ARTAN(number)", (Number) -> Number;
    Atan = Function "ATAN", "ATAN(number)", (Number) -> Number, flags: EXTENSION;
    CdfChisq = Function "CDF.CHISQ", "CDF.CHISQ(number, number)", (Number, Number) -> Number;
    CdfExp = Function "CDF.EXP", "CDF.EXP(number, number)", (Number, Number) -> Number;
    CdfF = Function "CDF.F", "CDF.F(number, number, number)", (Number, Number, Number) -> Number;
    CdfNormal = Function "CDF.NORMAL", "CDF.NORMAL(number, number, number)",
        (Number, Number, Number) -> Number;
    CdfT = Function "CDF.T", "CDF.T(number, number)", (Number, Number) -> Number;
    CdfUniform = Function "CDF.UNIFORM", "CDF.UNIFORM(number, number, number)",
        (Number, Number, Number) -> Number;
    Cfvar = Function "CFVAR", "CFVAR(number, number[, number]...)",
        () [Number; min 2, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    Concat = Function "CONCAT", "CONCAT(string[, string]...)",
        () [String; min 0, by 1] -> String;
    Cos = Function "COS", "COS(number)", (Number) -> Number;
    CtimeDays = Function "CTIME.DAYS", "CTIME.DAYS(number)", (Number) -> Number;
    CtimeHours = Function "CTIME.HOURS", "CTIME.HOURS(number)", (Number) -> Number;
    CtimeMinutes = Function "CTIME.MINUTES", "CTIME.MINUTES(number)", (Number) -> Number;
    CtimeSeconds = Function "CTIME.SECONDS", "CTIME.SECONDS(number)", (Number) -> Number;
    DateDmy = Function "DATE.DMY", "DATE.DMY(number, number, number)",
        (Number, Number, Number) -> Number;
    DateMdy = Function "DATE.MDY", "DATE.MDY(number, number, number)",
        (Number, Number, Number) -> Number;
    DateMoyr = Function "DATE.MOYR", "DATE.MOYR(number, number)", (Number, Number) -> Number;
    DateQyr = Function "DATE.QYR", "DATE.QYR(number, number)", (Number, Number) -> Number;
    DateWkyr = Function "DATE.WKYR", "DATE.WKYR(number, number)", (Number, Number) -> Number;
    DateYrday = Function "DATE.YRDAY", "DATE.YRDAY(number, number)", (Number, Number) -> Number;
    Datediff = Function "DATEDIFF", "DATEDIFF(number, number, string)",
        (Number, Number, String) -> Number;
    Datesum3 = Function "DATESUM", "DATESUM(number, number, string)",
        (Number, Number, String) -> Number;
    Datesum4 = Function "DATESUM", "DATESUM(number, number, string, string)",
        (Number, Number, String, String) -> Number;
    Exp = Function "EXP", "EXP(number)", (Number) -> Number;
    IdfExp = Function "IDF.EXP", "IDF.EXP(number, number)", (Number, Number) -> Number;
    IdfNormal = Function "IDF.NORMAL", "IDF.NORMAL(number, number, number)",
        (Number, Number, Number) -> Number;
    IdfUniform = Function "IDF.UNIFORM", "IDF.UNIFORM(number, number, number)",
        (Number, Number, Number) -> Number;
    Index2 = Function "INDEX", "INDEX(string, string)", (String, String) -> Number;
    Index3 = Function "INDEX", "INDEX(string, string, integer)",
        (String, String, Integer) -> Number;
    LagNum = Function "LAG", "LAG(numeric variable)",
        (NumVarRef) -> Number, flags: NO_FOLD | PERM_ONLY;
    LagNumN = Function "LAG", "LAG(numeric variable, positive integer constant)",
        (NumVarRef, PosInt) -> Number, flags: NO_FOLD | PERM_ONLY;
    LagStr = Function "LAG", "LAG(string variable)",
        (StrVarRef) -> String, flags: NO_FOLD | PERM_ONLY;
    LagStrN = Function "LAG", "LAG(string variable, positive integer constant)",
        (StrVarRef, PosInt) -> String, flags: NO_FOLD | PERM_ONLY;
    Length = Function "LENGTH", "LENGTH(string)", (String) -> Number;
    Lg10 = Function "LG10", "LG10(number)", (Number) -> Number;
    Ln = Function "LN", "LN(number)", (Number) -> Number;
    Lngamma = Function "LNGAMMA", "LNGAMMA(number)", (Number) -> Number;
    Lower = Function "LOWER", "LOWER(string)", (String) -> String;
    Lpad2 = Function "LPAD", "LPAD(string, integer)",
        (String, Integer) -> String, flags: ABSORB_MISSING | NEEDS_SPAN;
    Lpad3 = Function "LPAD", "LPAD(string, integer, string)",
        (String, Integer, String) -> String, flags: ABSORB_MISSING | NEEDS_SPAN;
    Ltrim1 = Function "LTRIM", "LTRIM(string)", (String) -> String;
    Ltrim2 = Function "LTRIM", "LTRIM(string, string)", (String, String) -> String;
    MaxNum = Function "MAX", "MAX(number[, number]...)",
        () [Number; min 1, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    MaxStr = Function "MAX", "MAX(string[, string]...)",
        () [String; min 0, by 1] -> String;
    Mean = Function "MEAN", "MEAN(number[, number]...)",
        () [Number; min 1, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    Median = Function "MEDIAN", "MEDIAN(number[, number]...)",
        () [Number; min 1, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    MinNum = Function "MIN", "MIN(number[, number]...)",
        () [Number; min 1, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    MinStr = Function "MIN", "MIN(string[, string]...)",
        () [String; min 0, by 1] -> String;
    Missing = Function "MISSING", "MISSING(number)", (Number) -> Boolean,
        flags: ABSORB_MISSING;
    Mod = Function "MOD", "MOD(number, number)", (Number, Number) -> Number,
        flags: ABSORB_MISSING;
    Mod10 = Function "MOD10", "MOD10(number)", (Number) -> Number;
    Nmiss = Function "NMISS", "NMISS(number[, number]...)",
        () [Number; min 0, by 1] -> Number, flags: ABSORB_MISSING;
    Normal = Function "NORMAL", "NORMAL(number)", (Number) -> Number, flags: NO_FOLD;
    NumberFn = Function "NUMBER", "NUMBER(string, input format)",
        (String, NiFormat) -> Number, flags: NEEDS_SPAN;
    Nvalid = Function "NVALID", "NVALID(number[, number]...)",
        () [Number; min 0, by 1] -> Number, flags: ABSORB_MISSING;
    PdfChisq = Function "PDF.CHISQ", "PDF.CHISQ(number, number)", (Number, Number) -> Number;
    PdfExp = Function "PDF.EXP", "PDF.EXP(number, number)", (Number, Number) -> Number;
    PdfF = Function "PDF.F", "PDF.F(number, number, number)", (Number, Number, Number) -> Number;
    PdfNormal = Function "PDF.NORMAL", "PDF.NORMAL(number, number, number)",
        (Number, Number, Number) -> Number;
    PdfT = Function "PDF.T", "PDF.T(number, number)", (Number, Number) -> Number;
    PdfUniform = Function "PDF.UNIFORM", "PDF.UNIFORM(number, number, number)",
        (Number, Number, Number) -> Number;
    RangeNum = Function "RANGE", "RANGE(number, number, number[, number, number]...)",
        (Number) [Number; min 0, by 2] -> Boolean, flags: ABSORB_MISSING;
    RangeStr = Function "RANGE", "RANGE(string, string, string[, string, string]...)",
        (String) [String; min 0, by 2] -> Boolean;
    Replace3 = Function "REPLACE", "REPLACE(string, string, string)",
        (String, String, String) -> String;
    Replace4 = Function "REPLACE", "REPLACE(string, string, string, number)",
        (String, String, String, Number) -> String, flags: ABSORB_MISSING;
    Rindex2 = Function "RINDEX", "RINDEX(string, string)", (String, String) -> Number;
    Rindex3 = Function "RINDEX", "RINDEX(string, string, integer)",
        (String, String, Integer) -> Number;
    Rnd1 = Function "RND", "RND(number)", (Number) -> Number;
    Rnd2 = Function "RND", "RND(number, number)", (Number, Number) -> Number;
    Rnd3 = Function "RND", "RND(number, number, number)", (Number, Number, Number) -> Number;
    Rpad2 = Function "RPAD", "RPAD(string, integer)",
        (String, Integer) -> String, flags: ABSORB_MISSING | NEEDS_SPAN;
    Rpad3 = Function "RPAD", "RPAD(string, integer, string)",
        (String, Integer, String) -> String, flags: ABSORB_MISSING | NEEDS_SPAN;
    Rtrim1 = Function "RTRIM", "RTRIM(string)", (String) -> String;
    Rtrim2 = Function "RTRIM", "RTRIM(string, string)", (String, String) -> String;
    RvNormal = Function "RV.NORMAL", "RV.NORMAL(number, number)",
        (Number, Number) -> Number, flags: NO_FOLD;
    RvUniform = Function "RV.UNIFORM", "RV.UNIFORM(number, number)",
        (Number, Number) -> Number, flags: NO_FOLD;
    Sd = Function "SD", "SD(number, number[, number]...)",
        () [Number; min 2, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    SigChisq = Function "SIG.CHISQ", "SIG.CHISQ(number, number)", (Number, Number) -> Number;
    SigF = Function "SIG.F", "SIG.F(number, number, number)",
        (Number, Number, Number) -> Number;
    Sin = Function "SIN", "SIN(number)", (Number) -> Number;
    Sqrt = Function "SQRT", "SQRT(number)", (Number) -> Number;
    StringFn = Function "STRING", "STRING(number, output format)",
        (Number, NoFormat) -> String, flags: ABSORB_MISSING;
    Strunc = Function "STRUNC", "STRUNC(string, number)",
        (String, Number) -> String, flags: ABSORB_MISSING | NEEDS_SPAN;
    Substr2 = Function "SUBSTR", "SUBSTR(string, number)",
        (String, Number) -> String, flags: ABSORB_MISSING;
    Substr3 = Function "SUBSTR", "SUBSTR(string, number, number)",
        (String, Number, Number) -> String, flags: ABSORB_MISSING;
    Sum = Function "SUM", "SUM(number[, number]...)",
        () [Number; min 1, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    SysmisVar = Function "SYSMIS", "SYSMIS(numeric variable)",
        (NumVarRef) -> Boolean, flags: NO_FOLD;
    SysmisNum = Function "SYSMIS", "SYSMIS(number)", (Number) -> Boolean,
        flags: ABSORB_MISSING;
    Tan = Function "TAN", "TAN(number)", (Number) -> Number;
    TimeDays = Function "TIME.DAYS", "TIME.DAYS(number)", (Number) -> Number;
    TimeHms = Function "TIME.HMS", "TIME.HMS(number, number, number)",
        (Number, Number, Number) -> Number;
    Trunc1 = Function "TRUNC", "TRUNC(number)", (Number) -> Number;
    Trunc2 = Function "TRUNC", "TRUNC(number, number)", (Number, Number) -> Number;
    Trunc3 = Function "TRUNC", "TRUNC(number, number, number)",
        (Number, Number, Number) -> Number;
    Uniform = Function "UNIFORM", "UNIFORM(number)", (Number) -> Number, flags: NO_FOLD;
    Upcase = Function "UPCASE", "UPCASE(string)", (String) -> String;
    ValueVar = Function "VALUE", "VALUE(variable)",
        (NumVarRef) -> Number, flags: NO_FOLD | ABSORB_MISSING;
    ValueElem = Function "VALUE", "VALUE(vector element)",
        (NumVecElem) -> Number, flags: ABSORB_MISSING;
    Variance = Function "VARIANCE", "VARIANCE(number, number[, number]...)",
        () [Number; min 2, by 1] -> Number, flags: ABSORB_MISSING | MIN_VALID;
    XdateDate = Function "XDATE.DATE", "XDATE.DATE(number)", (Number) -> Number;
    XdateHour = Function "XDATE.HOUR", "XDATE.HOUR(number)", (Number) -> Number;
    XdateJday = Function "XDATE.JDAY", "XDATE.JDAY(number)", (Number) -> Number;
    XdateMday = Function "XDATE.MDAY", "XDATE.MDAY(number)", (Number) -> Number;
    XdateMinute = Function "XDATE.MINUTE", "XDATE.MINUTE(number)", (Number) -> Number;
    XdateMonth = Function "XDATE.MONTH", "XDATE.MONTH(number)", (Number) -> Number;
    XdateQuarter = Function "XDATE.QUARTER", "XDATE.QUARTER(number)", (Number) -> Number;
    XdateSecond = Function "XDATE.SECOND", "XDATE.SECOND(number)", (Number) -> Number;
    XdateTday = Function "XDATE.TDAY", "XDATE.TDAY(number)", (Number) -> Number;
    XdateTime = Function "XDATE.TIME", "XDATE.TIME(number)", (Number) -> Number;
    XdateWeek = Function "XDATE.WEEK", "XDATE.WEEK(number)", (Number) -> Number;
    XdateWkday = Function "XDATE.WKDAY", "XDATE.WKDAY(number)", (Number) -> Number;
    XdateYear = Function "XDATE.YEAR", "XDATE.YEAR(number)", (Number) -> Number;
    Yrmoda = Function "YRMODA", "YRMODA(number, number, number)",
        (Number, Number, Number) -> Number;

    // ===== Operators =====
    Add = Operator "+", "+", (Number, Number) -> Number;
    Sub = Operator "-", "-", (Number, Number) -> Number;
    Mul = Operator "*", "*", (Number, Number) -> Number;
    Div = Operator "/", "/", (Number, Number) -> Number;
    Pow = Operator "**", "**", (Number, Number) -> Number, flags: ABSORB_MISSING;
    Neg = Operator "-", "-", (Number) -> Number;
    Not = Operator "NOT", "NOT", (Boolean) -> Boolean;
    And = Operator "AND", "AND", (Boolean, Boolean) -> Boolean, flags: ABSORB_MISSING;
    Or = Operator "OR", "OR", (Boolean, Boolean) -> Boolean, flags: ABSORB_MISSING;
    Eq = Operator "=", "=", (Number, Number) -> Boolean;
    Ne = Operator "<>", "<>", (Number, Number) -> Boolean;
    Lt = Operator "<", "<", (Number, Number) -> Boolean;
    Le = Operator "<=", "<=", (Number, Number) -> Boolean;
    Gt = Operator ">", ">", (Number, Number) -> Boolean;
    Ge = Operator ">=", ">=", (Number, Number) -> Boolean;
    EqStr = Operator "=", "=", (String, String) -> Boolean;
    NeStr = Operator "<>", "<>", (String, String) -> Boolean;
    LtStr = Operator "<", "<", (String, String) -> Boolean;
    LeStr = Operator "<=", "<=", (String, String) -> Boolean;
    GtStr = Operator ">", ">", (String, String) -> Boolean;
    GeStr = Operator ">=", ">=", (String, String) -> Boolean;
    // BOOLEAN_TO_NUM is inserted by coercion; a no-op the optimizer strips
    // and the flattener never emits.
    BooleanToNum = Operator "BOOLEAN_TO_NUM", "BOOLEAN_TO_NUM", (Boolean) -> Number;
    ExprToBoolean = Operator "EXPR_TO_BOOLEAN", "EXPR_TO_BOOLEAN", (Number) -> Boolean,
        flags: ABSORB_MISSING | NEEDS_SPAN;
    OperandToBoolean = Operator "OPERAND_TO_BOOLEAN", "OPERAND_TO_BOOLEAN",
        (Number, NodeSpan) -> Boolean, flags: ABSORB_MISSING;
    NumToInteger = Operator "NUM_TO_INTEGER", "NUM_TO_INTEGER", (Number) -> Number,
        flags: NEEDS_SPAN;
    Square = Operator "SQUARE", "SQUARE", (Number) -> Number;
    NumVar = Operator "NUM_VAR", "NUM_VAR", (NumVarRef) -> Number, flags: NO_FOLD;
    StrVar = Operator "STR_VAR", "STR_VAR", (StrVarRef) -> String, flags: NO_FOLD;
    VecElemNumRaw = Operator "VEC_ELEM_NUM_RAW", "VEC_ELEM_NUM_RAW",
        (Number, VectorRef) -> NumVecElem, flags: NO_FOLD | NEEDS_SPAN | ABSORB_MISSING;
    VecElemNum = Operator "VEC_ELEM_NUM", "VEC_ELEM_NUM",
        (Number, VectorRef) -> Number, flags: NO_FOLD | NEEDS_SPAN | ABSORB_MISSING;
    VecElemStr = Operator "VEC_ELEM_STR", "VEC_ELEM_STR",
        (Number, VectorRef) -> String, flags: NO_FOLD | NEEDS_SPAN | ABSORB_MISSING;
    Casenum = Operator "CASENUM", "CASENUM", () -> Number, flags: NO_FOLD;
}

// Opcodes are interleaved densely with operands in compiled programs; keep
// the tag a single byte.
const_assert!(core::mem::size_of::<Opcode>() == 1);

impl Opcode {
    pub fn is_atom(self) -> bool {
        self.info().kind == Kind::Atom
    }

    pub fn is_function(self) -> bool {
        self.info().kind == Kind::Function
    }

    pub fn is_operator(self) -> bool {
        self.info().kind == Kind::Operator
    }

    /// Functions and operators: anything with children.
    pub fn is_composite(self) -> bool {
        !self.is_atom()
    }

    /// Role of an atom type.  Meaningless for composites.
    pub fn role(self) -> Role {
        debug_assert!(self.is_atom());
        match self {
            Opcode::Number
            | Opcode::Boolean
            | Opcode::String
            | Opcode::Integer
            | Opcode::NumVecElem => Role::Value,
            Opcode::NiFormat
            | Opcode::NoFormat
            | Opcode::PosInt
            | Opcode::NumVarRef
            | Opcode::StrVarRef
            | Opcode::VectorRef
            | Opcode::NodeSpan => Role::LeafOnly,
            _ => Role::Marker,
        }
    }

    /// Stack used by a *value* of this atom type.
    pub fn stack_use(self) -> StackUse {
        match self {
            Opcode::Number | Opcode::Boolean | Opcode::NumVecElem => StackUse::Number,
            Opcode::String => StackUse::String,
            _ => StackUse::None,
        }
    }
}
