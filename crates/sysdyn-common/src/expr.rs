//! Equation expression tree shared by the parser, engine, analysis and
//! code generation.

/// A parsed equation right-hand side. Variable references are stored in
/// canonical form (see [`crate::names::canonical`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    /// The simulation clock pseudo-variable (`Time` / `TIME`).
    Time,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Builtin functions of the equation language.
///
/// `INTEG` is not a builtin: it is recognized only at the top level of an
/// equation by the parser and produces a stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Min,
    Max,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Integer,
    Modulo,
    Step,
    Pulse,
    Ramp,
    IfThenElse,
}

impl Builtin {
    /// Resolve a canonical (lowercased) name to a builtin.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "sqrt" => Builtin::Sqrt,
            "exp" => Builtin::Exp,
            "ln" => Builtin::Ln,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "integer" => Builtin::Integer,
            "modulo" => Builtin::Modulo,
            "step" => Builtin::Step,
            "pulse" => Builtin::Pulse,
            "ramp" => Builtin::Ramp,
            "if_then_else" => Builtin::IfThenElse,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Abs => "ABS",
            Builtin::Min => "MIN",
            Builtin::Max => "MAX",
            Builtin::Sqrt => "SQRT",
            Builtin::Exp => "EXP",
            Builtin::Ln => "LN",
            Builtin::Sin => "SIN",
            Builtin::Cos => "COS",
            Builtin::Integer => "INTEGER",
            Builtin::Modulo => "MODULO",
            Builtin::Step => "STEP",
            Builtin::Pulse => "PULSE",
            Builtin::Ramp => "RAMP",
            Builtin::IfThenElse => "IF THEN ELSE",
        }
    }

    /// Accepted argument count range, inclusive.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Builtin::Abs
            | Builtin::Sqrt
            | Builtin::Exp
            | Builtin::Ln
            | Builtin::Sin
            | Builtin::Cos
            | Builtin::Integer => (1, 1),
            Builtin::Min | Builtin::Max | Builtin::Modulo | Builtin::Step | Builtin::Pulse => {
                (2, 2)
            }
            Builtin::Ramp | Builtin::IfThenElse => (3, 3),
        }
    }
}

impl Expr {
    /// Collect every variable referenced anywhere in the expression,
    /// in first-appearance order and without duplicates.
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Expr::Num(_) | Expr::Time => {}
            Expr::Var(name) => {
                if !refs.contains(&name.as_str()) {
                    refs.push(name);
                }
            }
            Expr::Unary(_, inner) => inner.collect_refs(refs),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_refs(refs);
                rhs.collect_refs(refs);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_refs(refs);
                }
            }
        }
    }

    /// An expression with no variable references evaluates to the same
    /// value at every step; the IR classifies such auxiliaries as constants.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Num(_) => true,
            Expr::Var(_) | Expr::Time => false,
            Expr::Unary(_, inner) => inner.is_constant(),
            Expr::Binary(_, lhs, rhs) => lhs.is_constant() && rhs.is_constant(),
            Expr::Call(builtin, args) => {
                // STEP/PULSE/RAMP depend on the clock even with constant args
                !matches!(builtin, Builtin::Step | Builtin::Pulse | Builtin::Ramp)
                    && args.iter().all(Expr::is_constant)
            }
        }
    }
}
