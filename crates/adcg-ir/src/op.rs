use std::fmt;
use std::ops::RangeInclusive;

/// Comparison used by a conditional-select node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Ne => "!=",
        }
    }

    /// Evaluates the comparison on concrete values.
    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ge => left >= right,
            CompareOp::Gt => left > right,
            CompareOp::Ne => left != right,
        }
    }
}

/// The operation recorded by a graph node.
///
/// Array and atomic kinds carry their parameters in the node's auxiliary
/// info:
///
/// - `ArrayElement`: `[element index]`
/// - `AtomicForward`: `[atomic id, q, p]`
/// - `AtomicReverse`: `[atomic id, p]`
/// - `Independent`: `[independent index]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Independent,
    Alias,
    Abs,
    Acos,
    Asin,
    Atan,
    Cos,
    Cosh,
    Exp,
    Log,
    Sign,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    UnaryMinus,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    CondExp(CompareOp),
    ArrayCreation,
    ArrayElement,
    AtomicForward,
    AtomicReverse,
}

impl OpKind {
    /// Number of operands a node of this kind accepts.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            OpKind::Independent => 0..=0,
            OpKind::Alias => 1..=1,
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div | OpKind::Pow => 2..=2,
            OpKind::CondExp(_) => 4..=4,
            OpKind::ArrayCreation => 1..=usize::MAX,
            OpKind::ArrayElement => 1..=2,
            OpKind::AtomicForward => 2..=2,
            OpKind::AtomicReverse => 4..=4,
            _ => 1..=1,
        }
    }

    /// Number of auxiliary integers a node of this kind carries.
    pub fn info_len(self) -> usize {
        match self {
            OpKind::Independent | OpKind::ArrayElement => 1,
            OpKind::AtomicForward => 3,
            OpKind::AtomicReverse => 2,
            _ => 0,
        }
    }

    /// `false` for pure markers that never receive an evaluation order.
    #[inline]
    pub fn produces_value(self) -> bool {
        !matches!(self, OpKind::Independent | OpKind::Alias)
    }

    #[inline]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            OpKind::Abs
                | OpKind::Acos
                | OpKind::Asin
                | OpKind::Atan
                | OpKind::Cos
                | OpKind::Cosh
                | OpKind::Exp
                | OpKind::Log
                | OpKind::Sign
                | OpKind::Sin
                | OpKind::Sinh
                | OpKind::Sqrt
                | OpKind::Tan
                | OpKind::Tanh
                | OpKind::UnaryMinus
        )
    }

    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div | OpKind::Pow
        )
    }

    /// Scalar kinds compute a single floating point value from their operands.
    #[inline]
    pub fn is_scalar(self) -> bool {
        self.is_unary() || self.is_binary() || matches!(self, OpKind::CondExp(_))
    }

    #[inline]
    pub fn is_atomic(self) -> bool {
        matches!(self, OpKind::AtomicForward | OpKind::AtomicReverse)
    }

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Independent => "independent",
            OpKind::Alias => "alias",
            OpKind::Abs => "abs",
            OpKind::Acos => "acos",
            OpKind::Asin => "asin",
            OpKind::Atan => "atan",
            OpKind::Cos => "cos",
            OpKind::Cosh => "cosh",
            OpKind::Exp => "exp",
            OpKind::Log => "log",
            OpKind::Sign => "sign",
            OpKind::Sin => "sin",
            OpKind::Sinh => "sinh",
            OpKind::Sqrt => "sqrt",
            OpKind::Tan => "tan",
            OpKind::Tanh => "tanh",
            OpKind::UnaryMinus => "neg",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Pow => "pow",
            OpKind::CondExp(CompareOp::Lt) => "cond_lt",
            OpKind::CondExp(CompareOp::Le) => "cond_le",
            OpKind::CondExp(CompareOp::Eq) => "cond_eq",
            OpKind::CondExp(CompareOp::Ge) => "cond_ge",
            OpKind::CondExp(CompareOp::Gt) => "cond_gt",
            OpKind::CondExp(CompareOp::Ne) => "cond_ne",
            OpKind::ArrayCreation => "array",
            OpKind::ArrayElement => "array_element",
            OpKind::AtomicForward => "atomic_forward",
            OpKind::AtomicReverse => "atomic_reverse",
        }
    }

    /// Display template where `$n` stands for the n-th operand.
    pub fn template(self) -> &'static str {
        match self {
            OpKind::Independent => "independent",
            OpKind::Alias => "= $1",
            OpKind::UnaryMinus => "-( $1 )",
            OpKind::Add => "$1 + $2",
            OpKind::Sub => "$1 - $2",
            OpKind::Mul => "$1 * $2",
            OpKind::Div => "$1 / $2",
            OpKind::Pow => "pow( $1, $2 )",
            OpKind::CondExp(CompareOp::Lt) => "($1 < $2)? $3 : $4",
            OpKind::CondExp(CompareOp::Le) => "($1 <= $2)? $3 : $4",
            OpKind::CondExp(CompareOp::Eq) => "($1 == $2)? $3 : $4",
            OpKind::CondExp(CompareOp::Ge) => "($1 >= $2)? $3 : $4",
            OpKind::CondExp(CompareOp::Gt) => "($1 > $2)? $3 : $4",
            OpKind::CondExp(CompareOp::Ne) => "($1 != $2)? $3 : $4",
            OpKind::ArrayCreation => "new array [$*]",
            OpKind::ArrayElement => "$1[$i]",
            OpKind::AtomicForward => "atomic_forward( $* )",
            OpKind::AtomicReverse => "atomic_reverse( $* )",
            OpKind::Abs => "abs( $1 )",
            OpKind::Acos => "acos( $1 )",
            OpKind::Asin => "asin( $1 )",
            OpKind::Atan => "atan( $1 )",
            OpKind::Cos => "cos( $1 )",
            OpKind::Cosh => "cosh( $1 )",
            OpKind::Exp => "exp( $1 )",
            OpKind::Log => "log( $1 )",
            OpKind::Sign => "sign( $1 )",
            OpKind::Sin => "sin( $1 )",
            OpKind::Sinh => "sinh( $1 )",
            OpKind::Sqrt => "sqrt( $1 )",
            OpKind::Tan => "tan( $1 )",
            OpKind::Tanh => "tanh( $1 )",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OpKind::Independent, 0..=0, false)]
    #[case(OpKind::Alias, 1..=1, false)]
    #[case(OpKind::Cos, 1..=1, true)]
    #[case(OpKind::Mul, 2..=2, true)]
    #[case(OpKind::CondExp(CompareOp::Ge), 4..=4, true)]
    #[case(OpKind::ArrayElement, 1..=2, true)]
    #[case(OpKind::AtomicReverse, 4..=4, true)]
    fn test_arity_and_value(
        #[case] kind: OpKind,
        #[case] expected: RangeInclusive<usize>,
        #[case] produces_value: bool,
    ) {
        assert_eq!(kind.arity(), expected);
        assert_eq!(kind.produces_value(), produces_value);
    }

    #[rstest]
    #[case(OpKind::Sqrt, true)]
    #[case(OpKind::Pow, true)]
    #[case(OpKind::CondExp(CompareOp::Lt), true)]
    #[case(OpKind::ArrayCreation, false)]
    #[case(OpKind::AtomicForward, false)]
    fn test_is_scalar(#[case] kind: OpKind, #[case] expected: bool) {
        assert_eq!(kind.is_scalar(), expected);
    }

    #[rstest]
    #[case(CompareOp::Lt, 1.0, 2.0, true)]
    #[case(CompareOp::Ge, 1.0, 2.0, false)]
    #[case(CompareOp::Ne, 2.0, 2.0, false)]
    fn test_compare_holds(#[case] op: CompareOp, #[case] l: f64, #[case] r: f64, #[case] expected: bool) {
        assert_eq!(op.holds(l, r), expected);
    }
}
