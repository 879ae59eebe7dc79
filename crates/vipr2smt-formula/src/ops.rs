//! SMT-LIB operator tokens emitted by the writer.

/// Every operator the generated formulas use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Assert,
    Not,
    And,
    Or,
    Eq,
    Distinct,
    Plus,
    Minus,
    Times,
    Divide,
    Leq,
    Geq,
    Lt,
    Gt,
    IsInt,
    ToInt,
    Ite,
    Implies,
}

impl Op {
    pub fn token(self) -> &'static str {
        match self {
            Op::Assert => "assert",
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Eq => "=",
            Op::Distinct => "distinct",
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Times => "*",
            Op::Divide => "/",
            Op::Leq => "<=",
            Op::Geq => ">=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::IsInt => "is_int",
            Op::ToInt => "to_int",
            Op::Ite => "ite",
            Op::Implies => "=>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_match_the_smtlib_spelling() {
        assert_eq!(Op::Distinct.token(), "distinct");
        assert_eq!(Op::IsInt.token(), "is_int");
        assert_eq!(Op::ToInt.token(), "to_int");
        assert_eq!(Op::Implies.token(), "=>");
    }
}
