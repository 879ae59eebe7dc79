//! Section-dispatched VIPR parser.
//!
//! The top-level loop reads the first token of each line and dispatches
//! on the section name; section bodies then pull tokens freely across
//! line boundaries. Whatever is left of the line a section body ended on
//! is discarded when the loop advances, and `%` lines are skipped whole.

use std::io::BufRead;
use std::path::Path;

use crate::arena::StringArena;
use crate::errors::ParseError;
use crate::model::{Certificate, Constraint, Derivation, Direction, Reason, Solution};
use crate::number::Num;
use crate::reader::TokenReader;

/// Parse a certificate from a file on disk.
pub fn parse_file(path: &Path) -> Result<Certificate, ParseError> {
    let reader = TokenReader::open(path)?;
    Parser::new(reader).run()
}

/// Parse a certificate from any buffered reader.
pub fn parse<R: BufRead>(input: R) -> Result<Certificate, ParseError> {
    Parser::new(TokenReader::new(input)).run()
}

enum Section {
    Comment,
    Var,
    Int,
    Obj,
    Con,
    Rtp,
    Sol,
    Der,
}

impl Section {
    fn classify(token: &str) -> Option<Section> {
        match token {
            "%" => Some(Section::Comment),
            "VAR" => Some(Section::Var),
            "INT" => Some(Section::Int),
            "OBJ" => Some(Section::Obj),
            "CON" => Some(Section::Con),
            "RTP" => Some(Section::Rtp),
            "SOL" => Some(Section::Sol),
            "DER" => Some(Section::Der),
            _ => None,
        }
    }
}

/// Next token or a positioned end-of-input error.
fn require<'a, R: BufRead>(
    reader: &'a mut TokenReader<R>,
    expected: &'static str,
) -> Result<&'a str, ParseError> {
    let line = reader.line_number();
    match reader.next_token()? {
        Some(token) => Ok(token),
        None => Err(ParseError::UnexpectedEof { line, expected }),
    }
}

enum NumTokenError {
    Leftover(String),
    ZeroDenominator(String),
}

impl NumTokenError {
    fn into_error(self, line: u64) -> ParseError {
        match self {
            NumTokenError::Leftover(token) => ParseError::BadNumber { line, token },
            NumTokenError::ZeroDenominator(token) => ParseError::ZeroDenominator { line, token },
        }
    }
}

/// Intern a number lexeme. Numbers are opaque: no digit validation is
/// done here, only the fraction shape and the zero-denominator ban.
fn intern_number(token: &str, arena: &mut StringArena) -> Result<Num, NumTokenError> {
    match token.split_once('/') {
        None => Ok(Num::Int(arena.intern(token))),
        Some((numerator, denominator)) => {
            if denominator.contains('/') {
                return Err(NumTokenError::Leftover(token.to_string()));
            }
            if denominator == "0" {
                return Err(NumTokenError::ZeroDenominator(token.to_string()));
            }
            let n = arena.intern(numerator);
            let d = arena.intern(denominator);
            Ok(Num::Ratio(n, d))
        }
    }
}

struct Parser<R> {
    reader: TokenReader<R>,
    cert: Certificate,
}

impl<R: BufRead> Parser<R> {
    fn new(reader: TokenReader<R>) -> Self {
        Parser {
            reader,
            cert: Certificate::new(StringArena::new()),
        }
    }

    fn run(mut self) -> Result<Certificate, ParseError> {
        loop {
            if !self.reader.next_line()? {
                break;
            }
            let section = match self.reader.next_token()? {
                None => break,
                Some(token) => match Section::classify(token) {
                    Some(section) => section,
                    None => {
                        let token = token.to_string();
                        return Err(ParseError::UnknownSection {
                            line: self.reader.line_number(),
                            token,
                        });
                    }
                },
            };
            match section {
                Section::Comment => continue,
                Section::Var => self.parse_var()?,
                Section::Int => self.parse_int()?,
                Section::Obj => self.parse_obj()?,
                Section::Con => self.parse_con()?,
                Section::Rtp => self.parse_rtp()?,
                Section::Sol => self.parse_sol()?,
                Section::Der => self.parse_der()?,
            }
        }
        Ok(self.cert)
    }

    ////////////////////////
    // Token conversions  //
    ////////////////////////

    fn next_usize(&mut self) -> Result<usize, ParseError> {
        let token = require(&mut self.reader, "unsigned integral value")?;
        match token.parse::<usize>() {
            Ok(value) => Ok(value),
            Err(error) => {
                let token = token.to_string();
                let message = error.to_string();
                Err(ParseError::BadInteger {
                    line: self.reader.line_number(),
                    token,
                    message,
                })
            }
        }
    }

    fn next_i64(&mut self) -> Result<i64, ParseError> {
        let token = require(&mut self.reader, "signed integral value")?;
        match token.parse::<i64>() {
            Ok(value) => Ok(value),
            Err(error) => {
                let token = token.to_string();
                let message = error.to_string();
                Err(ParseError::BadInteger {
                    line: self.reader.line_number(),
                    token,
                    message,
                })
            }
        }
    }

    fn next_number(&mut self) -> Result<Num, ParseError> {
        let token = require(&mut self.reader, "numeric value")?;
        match intern_number(token, &mut self.cert.arena) {
            Ok(num) => Ok(num),
            Err(bad) => Err(bad.into_error(self.reader.line_number())),
        }
    }

    /// RTP bounds: a number, `inf`, or `-inf`.
    fn next_bound(&mut self) -> Result<Num, ParseError> {
        let token = require(&mut self.reader, "bound value")?;
        if !token.contains("inf") {
            return match intern_number(token, &mut self.cert.arena) {
                Ok(num) => Ok(num),
                Err(bad) => Err(bad.into_error(self.reader.line_number())),
            };
        }
        match token {
            "inf" => Ok(Num::PosInf),
            "-inf" => Ok(Num::NegInf),
            other => {
                let token = other.to_string();
                Err(ParseError::BadBound {
                    line: self.reader.line_number(),
                    token,
                })
            }
        }
    }

    fn next_direction(&mut self) -> Result<Direction, ParseError> {
        let token = require(&mut self.reader, "constraint direction")?;
        match token {
            "E" => Ok(Direction::Equal),
            "L" => Ok(Direction::SmallerEqual),
            "G" => Ok(Direction::GreaterEqual),
            other => {
                let token = other.to_string();
                Err(ParseError::BadDirection {
                    line: self.reader.line_number(),
                    token,
                })
            }
        }
    }

    ////////////////////////
    // Shared structures  //
    ////////////////////////

    /// `count` sparse (index, value) pairs scattered into a dense vector
    /// of `length` zeros.
    fn read_dense_from_pairs(
        &mut self,
        count: usize,
        length: usize,
    ) -> Result<Vec<Num>, ParseError> {
        let mut dense = vec![Num::ZERO; length];
        for _ in 0..count {
            let index = self.next_usize()?;
            let value = self.next_number()?;
            if index >= length {
                return Err(ParseError::IndexOutOfRange {
                    line: self.reader.line_number(),
                    index,
                    variables: length,
                });
            }
            dense[index] = value;
        }
        Ok(dense)
    }

    /// Leading count, then sparse pairs.
    fn read_sparse_coefficients(&mut self, length: usize) -> Result<Vec<Num>, ParseError> {
        let count = self.next_usize()?;
        self.read_dense_from_pairs(count, length)
    }

    /// `name (E|L|G) target (OBJ | count pairs…)` — shared between CON
    /// and DER.
    fn read_constraint(&mut self) -> Result<Constraint, ParseError> {
        let name = {
            let token = require(&mut self.reader, "constraint name")?;
            self.cert.arena.intern(token)
        };
        let direction = self.next_direction()?;
        let target = self.next_number()?;

        let spec = require(&mut self.reader, "coefficient count or OBJ")?;
        let coefficients = if spec == "OBJ" {
            self.cert.objective.clone()
        } else {
            let count = match spec.parse::<usize>() {
                Ok(count) => count,
                Err(error) => {
                    let token = spec.to_string();
                    let message = error.to_string();
                    return Err(ParseError::BadInteger {
                        line: self.reader.line_number(),
                        token,
                        message,
                    });
                }
            };
            self.read_dense_from_pairs(count, self.cert.num_variables)?
        };

        Ok(Constraint {
            name,
            coefficients,
            direction,
            target,
        })
    }

    fn expect_open_bracket(&mut self) -> Result<(), ParseError> {
        let token = require(&mut self.reader, "open bracket")?;
        if token == "{" {
            return Ok(());
        }
        let token = token.to_string();
        Err(ParseError::MissingOpenBracket {
            line: self.reader.line_number(),
            token,
        })
    }

    fn expect_close_bracket(&mut self) -> Result<(), ParseError> {
        let token = require(&mut self.reader, "close bracket")?;
        if token == "}" {
            return Ok(());
        }
        let token = token.to_string();
        Err(ParseError::MissingCloseBracket {
            line: self.reader.line_number(),
            token,
        })
    }

    fn read_index_multiplier_pairs(&mut self) -> Result<Vec<(usize, Num)>, ParseError> {
        let count = self.next_usize()?;
        let mut terms = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let index = self.next_usize()?;
            let multiplier = self.next_number()?;
            terms.push((index, multiplier));
        }
        Ok(terms)
    }

    /// `{ asm | lin … | rnd … | uns i1 l1 i2 l2 | sol }`.
    fn read_reason(&mut self) -> Result<Reason, ParseError> {
        self.expect_open_bracket()?;

        let token = require(&mut self.reader, "reason kind")?;
        let reason = match token {
            "asm" => Reason::Assumption,
            "lin" => {
                let terms = self.read_index_multiplier_pairs()?;
                Reason::Linear { terms }
            }
            "rnd" => {
                let terms = self.read_index_multiplier_pairs()?;
                Reason::Rounding { terms }
            }
            "uns" => {
                let i1 = self.next_usize()?;
                let l1 = self.next_usize()?;
                let i2 = self.next_usize()?;
                let l2 = self.next_usize()?;
                Reason::Unsplit { i1, l1, i2, l2 }
            }
            "sol" => Reason::Solution,
            other => {
                let token = other.to_string();
                return Err(ParseError::BadReason {
                    line: self.reader.line_number(),
                    token,
                });
            }
        };

        self.expect_close_bracket()?;
        Ok(reason)
    }

    ////////////////////////
    // Section bodies     //
    ////////////////////////

    fn parse_var(&mut self) -> Result<(), ParseError> {
        let count = self.next_usize()?;
        self.cert.num_variables = count;
        self.cert.variable_names.reserve(count);
        self.cert.integral_flags = vec![false; count];
        for _ in 0..count {
            let token = require(&mut self.reader, "variable name")?;
            let name = self.cert.arena.intern(token);
            self.cert.variable_names.push(name);
        }
        Ok(())
    }

    fn parse_int(&mut self) -> Result<(), ParseError> {
        let count = self.next_usize()?;
        for _ in 0..count {
            let index = self.next_usize()?;
            if index >= self.cert.integral_flags.len() {
                return Err(ParseError::IndexOutOfRange {
                    line: self.reader.line_number(),
                    index,
                    variables: self.cert.integral_flags.len(),
                });
            }
            self.cert.integral_flags[index] = true;
        }
        Ok(())
    }

    fn parse_obj(&mut self) -> Result<(), ParseError> {
        let sense = require(&mut self.reader, "objective sense")?;
        match sense {
            "min" => self.cert.minimization = true,
            "max" => self.cert.minimization = false,
            other => {
                let token = other.to_string();
                return Err(ParseError::BadObjectiveSense {
                    line: self.reader.line_number(),
                    token,
                });
            }
        }
        self.cert.objective = self.read_sparse_coefficients(self.cert.num_variables)?;
        Ok(())
    }

    fn parse_con(&mut self) -> Result<(), ParseError> {
        let count = self.next_usize()?;
        self.cert.num_problem_constraints = count;

        // Bound-constraint count: present in the format, unused here.
        let _bound_constraints = self.next_usize()?;

        for _ in 0..count {
            let constraint = self.read_constraint()?;
            self.cert.constraints.push(constraint);
        }
        Ok(())
    }

    fn parse_rtp(&mut self) -> Result<(), ParseError> {
        let token = require(&mut self.reader, "RTP verdict tag")?;
        match token {
            "infeas" => {
                self.cert.feasible = false;
                Ok(())
            }
            "range" => {
                self.cert.feasible = true;
                self.cert.lower_bound = self.next_bound()?;
                self.cert.upper_bound = self.next_bound()?;
                Ok(())
            }
            other => {
                let token = other.to_string();
                Err(ParseError::BadRtp {
                    line: self.reader.line_number(),
                    token,
                })
            }
        }
    }

    fn parse_sol(&mut self) -> Result<(), ParseError> {
        let count = self.next_usize()?;
        for _ in 0..count {
            let name = {
                let token = require(&mut self.reader, "solution name")?;
                self.cert.arena.intern(token)
            };
            let assignments = self.read_sparse_coefficients(self.cert.num_variables)?;
            self.cert.solutions.push(Solution { name, assignments });
        }

        if self.cert.solutions.len() != count {
            return Err(ParseError::SolutionCountMismatch {
                declared: count,
                read: self.cert.solutions.len(),
            });
        }
        Ok(())
    }

    fn parse_der(&mut self) -> Result<(), ParseError> {
        let count = self.next_usize()?;
        self.cert.num_derived_constraints = count;

        for i in 0..count {
            let constraint = self.read_constraint()?;
            let reason = self.read_reason()?;
            let largest_index = self.next_i64()?;

            self.cert.constraints.push(constraint);
            self.cert.derivations.push(Derivation {
                constraint_index: i + self.cert.num_problem_constraints,
                reason,
                largest_index,
            });
        }

        let expected = self.cert.num_problem_constraints + count;
        if self.cert.constraints.len() != expected {
            return Err(ParseError::ConstraintCountMismatch {
                declared: expected,
                have: self.cert.constraints.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReasonKind;
    use std::io::Cursor;

    fn parse_str(text: &str) -> Result<Certificate, ParseError> {
        parse(Cursor::new(text.to_string()))
    }

    const SMALL: &str = "\
% toy certificate
VAR 2
x y
INT 1
0
OBJ min 2 0 1 1 1/2
CON 2 0
c1 G 0 OBJ
c2 L 3 1 1 2
RTP range 0 3
SOL 1
s1 1 0 1
DER 2
d1 G 0 1 0 1 { asm } -1
d2 G 0 OBJ { lin 1 2 1 } -1
";

    #[test]
    fn parses_every_section_of_a_small_certificate() {
        let cert = parse_str(SMALL).unwrap();
        assert_eq!(cert.num_variables, 2);
        assert_eq!(cert.arena.resolve(cert.variable_names[0]), "x");
        assert_eq!(cert.integral_flags, vec![true, false]);
        assert!(cert.minimization);
        assert_eq!(cert.objective.len(), 2);
        assert_eq!(cert.objective[1].display(&cert.arena), "1/2");
        assert_eq!(cert.num_problem_constraints, 2);
        assert!(cert.feasible);
        assert_eq!(cert.lower_bound.display(&cert.arena), "0");
        assert_eq!(cert.upper_bound.display(&cert.arena), "3");
        assert_eq!(cert.solutions.len(), 1);
        assert_eq!(cert.num_derived_constraints, 2);
        assert_eq!(cert.constraints.len(), 4);
        assert_eq!(cert.derivations[0].constraint_index, 2);
        assert_eq!(cert.derivations[0].reason.kind(), ReasonKind::Assumption);
        assert_eq!(cert.derivations[1].reason.kind(), ReasonKind::Linear);
    }

    #[test]
    fn obj_keyword_copies_the_objective_into_the_constraint() {
        let cert = parse_str(SMALL).unwrap();
        assert_eq!(cert.constraints[0].coefficients, cert.objective);
        // Derived constraint d2 also used OBJ.
        assert_eq!(cert.constraints[3].coefficients, cert.objective);
    }

    #[test]
    fn sparse_pairs_scatter_into_dense_vectors() {
        let cert = parse_str(SMALL).unwrap();
        let c2 = &cert.constraints[1];
        assert!(c2.coefficients[0].is_zero(&cert.arena));
        assert_eq!(c2.coefficients[1].display(&cert.arena), "2");
        assert_eq!(c2.direction, Direction::SmallerEqual);
    }

    #[test]
    fn rtp_infeas_clears_the_feasible_flag() {
        let cert = parse_str("RTP infeas\n").unwrap();
        assert!(!cert.feasible);
    }

    #[test]
    fn rtp_accepts_infinite_bounds() {
        let cert = parse_str("RTP range -inf inf\n").unwrap();
        assert!(cert.feasible);
        assert!(cert.lower_bound.is_negative_infinity());
        assert!(cert.upper_bound.is_positive_infinity());
    }

    #[test]
    fn rtp_rejects_unknown_tags() {
        let err = parse_str("RTP maybe\n").unwrap_err();
        assert!(matches!(err, ParseError::BadRtp { .. }));
    }

    #[test]
    fn infinity_with_extra_bytes_is_rejected() {
        let err = parse_str("RTP range infx 0\n").unwrap_err();
        assert!(matches!(err, ParseError::BadBound { .. }));
    }

    #[test]
    fn unknown_sections_are_rejected_with_the_line() {
        let err = parse_str("VAR 1\nx\nBOGUS 3\n").unwrap_err();
        match err {
            ParseError::UnknownSection { line, token } => {
                assert_eq!(line, 3);
                assert_eq!(token, "BOGUS");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn comment_lines_are_skipped_entirely() {
        let cert = parse_str("% VAR 99 junk that would not parse\nVAR 1\nx\n").unwrap();
        assert_eq!(cert.num_variables, 1);
    }

    #[test]
    fn bad_direction_is_rejected() {
        let err = parse_str("VAR 1\nx\nCON 1 0\nc1 Q 0 1 0 1\n").unwrap_err();
        assert!(matches!(err, ParseError::BadDirection { .. }));
    }

    #[test]
    fn bad_reason_kind_is_rejected() {
        let err = parse_str("VAR 1\nx\nDER 1\nd1 G 0 1 0 1 { wat } -1\n").unwrap_err();
        assert!(matches!(err, ParseError::BadReason { .. }));
    }

    #[test]
    fn missing_brackets_are_rejected() {
        let open = parse_str("VAR 1\nx\nDER 1\nd1 G 0 1 0 1 asm } -1\n").unwrap_err();
        assert!(matches!(open, ParseError::MissingOpenBracket { .. }));
        let close = parse_str("VAR 1\nx\nDER 1\nd1 G 0 1 0 1 { asm asm } -1\n").unwrap_err();
        assert!(matches!(close, ParseError::MissingCloseBracket { .. }));
    }

    #[test]
    fn uns_reason_reads_exactly_four_indices() {
        let cert =
            parse_str("VAR 1\nx\nCON 4 0\nc1 G 0 0\nc2 G 0 0\nc3 G 0 0\nc4 G 0 0\nDER 1\nd1 G 1 0 { uns 0 2 1 3 } -1\n")
                .unwrap();
        match &cert.derivations[0].reason {
            Reason::Unsplit { i1, l1, i2, l2 } => {
                assert_eq!((*i1, *l1, *i2, *l2), (0, 2, 1, 3));
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn numeric_overflow_carries_the_line_number() {
        let err = parse_str("VAR 99999999999999999999999\n").unwrap_err();
        match err {
            ParseError::BadInteger { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn fraction_with_two_slashes_is_rejected() {
        let err = parse_str("VAR 1\nx\nOBJ min 1 0 1/2/3\n").unwrap_err();
        assert!(matches!(err, ParseError::BadNumber { .. }));
    }

    #[test]
    fn fraction_with_zero_denominator_is_rejected() {
        let err = parse_str("VAR 1\nx\nOBJ min 1 0 1/0\n").unwrap_err();
        assert!(matches!(err, ParseError::ZeroDenominator { .. }));
    }

    #[test]
    fn truncated_input_reports_what_was_expected() {
        let err = parse_str("VAR 3\nx\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn negative_zero_is_preserved_lexically() {
        let cert = parse_str("VAR 1\nx\nOBJ min 1 0 -0\n").unwrap();
        assert_eq!(cert.objective[0].display(&cert.arena), "-0");
        assert!(!cert.objective[0].is_zero(&cert.arena));
    }

    #[test]
    fn trailing_tokens_on_a_section_line_are_discarded() {
        // The remainder of the line where a section body ends is dropped
        // when the top-level loop advances.
        let cert = parse_str("VAR 1\nx these tokens vanish\nRTP infeas\n").unwrap();
        assert_eq!(cert.num_variables, 1);
        assert!(!cert.feasible);
    }

    #[test]
    fn largest_index_is_parsed_signed() {
        let cert = parse_str("VAR 1\nx\nDER 1\nd1 G 0 1 0 1 { asm } -7\n").unwrap();
        assert_eq!(cert.derivations[0].largest_index, -7);
    }
}
