use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while tokenizing or parsing a certificate file.
///
/// Every variant that corresponds to a position in the input carries the
/// 1-based line number the reader was on when the problem surfaced.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("cannot read certificate: {source}")]
    #[diagnostic(code(vipr2smt::parse::io))]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("line {line}: unexpected end of input, expected {expected}")]
    #[diagnostic(code(vipr2smt::parse::eof))]
    UnexpectedEof { line: u64, expected: &'static str },

    #[error("line {line}: unknown section `{token}`")]
    #[diagnostic(
        code(vipr2smt::parse::unknown_section),
        help("sections are VAR, INT, OBJ, CON, RTP, SOL, DER; comment lines start with %")
    )]
    UnknownSection { line: u64, token: String },

    #[error("line {line}: expected direction E, L or G, found `{token}`")]
    #[diagnostic(code(vipr2smt::parse::bad_direction))]
    BadDirection { line: u64, token: String },

    #[error("line {line}: expected `min` or `max`, found `{token}`")]
    #[diagnostic(code(vipr2smt::parse::bad_objective_sense))]
    BadObjectiveSense { line: u64, token: String },

    #[error("line {line}: unknown derivation reason `{token}`")]
    #[diagnostic(
        code(vipr2smt::parse::bad_reason),
        help("reasons are asm, lin, rnd, uns and sol")
    )]
    BadReason { line: u64, token: String },

    #[error("line {line}: expected `{{` around a reason body, found `{token}`")]
    #[diagnostic(code(vipr2smt::parse::missing_open_bracket))]
    MissingOpenBracket { line: u64, token: String },

    #[error("line {line}: expected `}}` after a reason body, found `{token}`")]
    #[diagnostic(code(vipr2smt::parse::missing_close_bracket))]
    MissingCloseBracket { line: u64, token: String },

    #[error("line {line}: malformed integer `{token}`: {message}")]
    #[diagnostic(code(vipr2smt::parse::bad_integer))]
    BadInteger {
        line: u64,
        token: String,
        message: String,
    },

    #[error("line {line}: leftover bytes in number token `{token}`")]
    #[diagnostic(code(vipr2smt::parse::bad_number))]
    BadNumber { line: u64, token: String },

    #[error("line {line}: fraction with zero denominator `{token}`")]
    #[diagnostic(code(vipr2smt::parse::zero_denominator))]
    ZeroDenominator { line: u64, token: String },

    #[error("line {line}: extraneous bytes in bound token `{token}`")]
    #[diagnostic(
        code(vipr2smt::parse::bad_bound),
        help("RTP bounds are numbers, `inf` or `-inf`")
    )]
    BadBound { line: u64, token: String },

    #[error("line {line}: RTP expects `infeas` or `range`, found `{token}`")]
    #[diagnostic(code(vipr2smt::parse::bad_rtp))]
    BadRtp { line: u64, token: String },

    #[error("line {line}: coefficient index {index} out of range for {variables} variables")]
    #[diagnostic(code(vipr2smt::parse::index_out_of_range))]
    IndexOutOfRange {
        line: u64,
        index: usize,
        variables: usize,
    },

    #[error("solution count mismatch after SOL: declared {declared}, read {read}")]
    #[diagnostic(code(vipr2smt::parse::solution_count))]
    SolutionCountMismatch { declared: usize, read: usize },

    #[error("constraint count mismatch after DER: declared {declared}, have {have}")]
    #[diagnostic(code(vipr2smt::parse::constraint_count))]
    ConstraintCountMismatch { declared: usize, have: usize },
}

/// Violations of the certificate's structural invariants, caught during
/// precomputation.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("constraint {derivation} has dependency {referenced} with index bigger than or equal to itself")]
    #[diagnostic(
        code(vipr2smt::model::forward_dependency),
        help("every index referenced by a derivation must be strictly smaller than its own")
    )]
    ForwardDependency { derivation: usize, referenced: usize },

    #[error("constraint {constraint} carries {found} coefficients for {expected} variables")]
    #[diagnostic(
        code(vipr2smt::model::coefficient_length),
        help("a VAR section must precede any section that builds dense vectors")
    )]
    CoefficientLength {
        constraint: usize,
        expected: usize,
        found: usize,
    },

    #[error("solution {solution} carries {found} assignments for {expected} variables")]
    #[diagnostic(code(vipr2smt::model::assignment_length))]
    AssignmentLength {
        solution: usize,
        expected: usize,
        found: usize,
    },
}
