//! The streaming writer the predicate emitters compose over.
//!
//! A "writer" in this crate is any closure `FnOnce(&mut FormulaWriter) ->
//! EmitResult`: it receives the sink explicitly and prints its fragment
//! directly, so sub-emitters nest arbitrarily without building terms in
//! memory. The conventions the emitters rely on live here: negative
//! lexemes become unary-minus applications, variable-arity `and`/`or`/`+`
//! forms are padded with their identity up to two operands, and the file
//! header/footer are fixed strings.

use std::io::Write;

use vipr2smt_cert::{Certificate, Direction, Num};

use crate::ops::Op;

pub type EmitResult = std::io::Result<()>;

/// Identity element used when a variable-arity operator needs padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pad {
    /// `true`, for `and`.
    True,
    /// `false`, for `or`.
    False,
    /// `0`, for `+`.
    Zero,
}

pub struct FormulaWriter<'c, W> {
    pub(crate) cert: &'c Certificate,
    out: W,
    pub(crate) dense: bool,
}

impl<'c, W: Write> FormulaWriter<'c, W> {
    pub fn new(cert: &'c Certificate, out: W) -> Self {
        FormulaWriter {
            cert,
            out,
            dense: false,
        }
    }

    /// Emit dense forms: no zero-term skipping, every iteration
    /// contributes an operand.
    pub fn dense(mut self, dense: bool) -> Self {
        self.dense = dense;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub(crate) fn raw(&mut self, text: &str) -> EmitResult {
        self.out.write_all(text.as_bytes())
    }

    ////////////////////////
    // Fixed file framing //
    ////////////////////////

    pub fn header(&mut self) -> EmitResult {
        self.raw("(set-info :smt-lib-version 2.6)\n")?;
        self.raw("(set-logic AUFLIRA)\n")?;
        self.raw("(set-info :source \"Transformed from a VIPR certificate\")\n")?;
        self.raw("; --- END HEADER --- \n\n")
    }

    pub fn footer(&mut self) -> EmitResult {
        self.raw("(check-sat)\n")
    }

    ////////////////////////
    // Atoms              //
    ////////////////////////

    pub(crate) fn bool_lit(&mut self, value: bool) -> EmitResult {
        self.raw(if value { "true" } else { "false" })
    }

    pub(crate) fn usize_lit(&mut self, value: usize) -> EmitResult {
        write!(self.out, "{value}")
    }

    /// A signed decimal lexeme: a leading `-` becomes a unary-minus
    /// application, anything else passes through untouched.
    pub(crate) fn signed_lexeme(&mut self, lexeme: &str) -> EmitResult {
        match lexeme.strip_prefix('-') {
            Some(magnitude) => {
                self.raw("(- ")?;
                self.raw(magnitude)?;
                self.raw(")")
            }
            None => self.raw(lexeme),
        }
    }

    /// A certificate number. Infinities never reach this point in well-
    /// formed runs (the bound accessors substitute zero); their lexemes
    /// are emitted as-is so a broken caller is at least visible in the
    /// output.
    pub(crate) fn number(&mut self, num: Num) -> EmitResult {
        let arena = &self.cert.arena;
        match num {
            Num::Int(n) => {
                let lexeme = arena.resolve(n);
                self.signed_lexeme(lexeme)
            }
            Num::Ratio(n, d) => {
                let numerator = arena.resolve(n);
                let denominator = arena.resolve(d);
                self.raw("(/ ")?;
                self.signed_lexeme(numerator)?;
                self.raw(" ")?;
                self.signed_lexeme(denominator)?;
                self.raw(")")
            }
            Num::PosInf => self.raw("inf"),
            Num::NegInf => self.raw("(- inf)"),
        }
    }

    /// The sign code s(d) of a direction: −1, 0 or 1.
    pub(crate) fn sign_code(&mut self, direction: Direction) -> EmitResult {
        match direction {
            Direction::SmallerEqual => self.raw("(- 1)"),
            Direction::Equal => self.raw("0"),
            Direction::GreaterEqual => self.raw("1"),
        }
    }

    ////////////////////////
    // Operator forms     //
    ////////////////////////

    pub(crate) fn op1<F>(&mut self, op: Op, body: F) -> EmitResult
    where
        F: FnOnce(&mut Self) -> EmitResult,
    {
        self.raw("(")?;
        self.raw(op.token())?;
        self.raw(" ")?;
        body(self)?;
        self.raw(")")
    }

    pub(crate) fn op2<F, G>(&mut self, op: Op, first: F, second: G) -> EmitResult
    where
        F: FnOnce(&mut Self) -> EmitResult,
        G: FnOnce(&mut Self) -> EmitResult,
    {
        self.raw("(")?;
        self.raw(op.token())?;
        self.raw(" ")?;
        first(self)?;
        self.raw(" ")?;
        second(self)?;
        self.raw(")")
    }

    /// `(<= …)`, `(= …)` or `(>= …)` depending on the direction.
    pub(crate) fn direction_op<F, G>(
        &mut self,
        direction: Direction,
        first: F,
        second: G,
    ) -> EmitResult
    where
        F: FnOnce(&mut Self) -> EmitResult,
        G: FnOnce(&mut Self) -> EmitResult,
    {
        let op = match direction {
            Direction::SmallerEqual => Op::Leq,
            Direction::Equal => Op::Eq,
            Direction::GreaterEqual => Op::Geq,
        };
        self.op2(op, first, second)
    }

    pub(crate) fn ifelse<T, A, B>(&mut self, test: T, then: A, otherwise: B) -> EmitResult
    where
        T: FnOnce(&mut Self) -> EmitResult,
        A: FnOnce(&mut Self) -> EmitResult,
        B: FnOnce(&mut Self) -> EmitResult,
    {
        self.op1(Op::Ite, |w| {
            test(w)?;
            w.raw(" ")?;
            then(w)?;
            w.raw(" ")?;
            otherwise(w)
        })
    }

    /// `ceil(x)` over reals: `(- (to_int (- x)))`.
    pub(crate) fn ceil<F>(&mut self, value: F) -> EmitResult
    where
        F: FnOnce(&mut Self) -> EmitResult,
    {
        self.op1(Op::Minus, |w| {
            w.op1(Op::ToInt, |w| w.op1(Op::Minus, value))
        })
    }

    /// `floor(x)`: `to_int` rounds toward negative infinity.
    pub(crate) fn floor<F>(&mut self, value: F) -> EmitResult
    where
        F: FnOnce(&mut Self) -> EmitResult,
    {
        self.op1(Op::ToInt, value)
    }

    ////////////////////////
    // Arity padding      //
    ////////////////////////

    /// Append identity operands until `count` reaches `minimum`. Callers
    /// write a trailing space after every real operand; this does the
    /// same for the padding.
    pub(crate) fn pad_operands(&mut self, count: usize, minimum: usize, pad: Pad) -> EmitResult {
        for _ in count..minimum {
            match pad {
                Pad::True => self.bool_lit(true)?,
                Pad::False => self.bool_lit(false)?,
                Pad::Zero => self.raw("0")?,
            }
            self.raw(" ")?;
        }
        Ok(())
    }

    /// `(and …)` whose body reports how many operands it wrote; padded
    /// with `true` to at least two.
    pub(crate) fn and_padded<F>(&mut self, body: F) -> EmitResult
    where
        F: FnOnce(&mut Self) -> std::io::Result<usize>,
    {
        self.op1(Op::And, |w| {
            let count = body(w)?;
            w.pad_operands(count, 2, Pad::True)
        })
    }

    /// `(or …)`, padded with `false` to at least two operands.
    pub(crate) fn or_padded<F>(&mut self, body: F) -> EmitResult
    where
        F: FnOnce(&mut Self) -> std::io::Result<usize>,
    {
        self.op1(Op::Or, |w| {
            let count = body(w)?;
            w.pad_operands(count, 2, Pad::False)
        })
    }

    /// `(+ …)`, padded with `0` to at least two operands.
    pub(crate) fn plus_padded<F>(&mut self, body: F) -> EmitResult
    where
        F: FnOnce(&mut Self) -> std::io::Result<usize>,
    {
        self.op1(Op::Plus, |w| {
            let count = body(w)?;
            w.pad_operands(count, 2, Pad::Zero)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vipr2smt_cert::parser::parse;

    fn tiny_certificate() -> Certificate {
        parse(Cursor::new("VAR 1\nx\n".to_string())).unwrap()
    }

    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut FormulaWriter<'_, &mut Vec<u8>>) -> EmitResult,
    {
        let cert = tiny_certificate();
        let mut out = Vec::new();
        let mut writer = FormulaWriter::new(&cert, &mut out);
        f(&mut writer).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn header_and_footer_are_the_fixed_strings() {
        let header = emit(|w| w.header());
        assert_eq!(
            header,
            "(set-info :smt-lib-version 2.6)\n\
             (set-logic AUFLIRA)\n\
             (set-info :source \"Transformed from a VIPR certificate\")\n\
             ; --- END HEADER --- \n\n"
        );
        assert_eq!(emit(|w| w.footer()), "(check-sat)\n");
    }

    #[test]
    fn negative_lexemes_become_unary_minus() {
        assert_eq!(emit(|w| w.signed_lexeme("-17")), "(- 17)");
        assert_eq!(emit(|w| w.signed_lexeme("17")), "17");
        assert_eq!(emit(|w| w.signed_lexeme("-0")), "(- 0)");
    }

    #[test]
    fn numbers_emit_integers_and_fractions() {
        let mut cert = tiny_certificate();
        let n = Num::Int(cert.arena.intern("-4"));
        let r = Num::Ratio(cert.arena.intern("-3"), cert.arena.intern("4"));
        let mut out = Vec::new();
        let mut writer = FormulaWriter::new(&cert, &mut out);
        writer.number(n).unwrap();
        writer.raw(" ").unwrap();
        writer.number(r).unwrap();
        drop(writer);
        assert_eq!(String::from_utf8(out).unwrap(), "(- 4) (/ (- 3) 4)");
    }

    #[test]
    fn sign_codes_are_exactly_minus_one_zero_one() {
        assert_eq!(emit(|w| w.sign_code(Direction::SmallerEqual)), "(- 1)");
        assert_eq!(emit(|w| w.sign_code(Direction::Equal)), "0");
        assert_eq!(emit(|w| w.sign_code(Direction::GreaterEqual)), "1");
    }

    #[test]
    fn direction_op_selects_the_comparison() {
        let leq = emit(|w| {
            w.direction_op(Direction::SmallerEqual, |w| w.raw("a"), |w| w.raw("b"))
        });
        assert_eq!(leq, "(<= a b)");
        let eq = emit(|w| w.direction_op(Direction::Equal, |w| w.raw("a"), |w| w.raw("b")));
        assert_eq!(eq, "(= a b)");
        let geq = emit(|w| {
            w.direction_op(Direction::GreaterEqual, |w| w.raw("a"), |w| w.raw("b"))
        });
        assert_eq!(geq, "(>= a b)");
    }

    #[test]
    fn ifelse_is_an_ite_application() {
        let text = emit(|w| w.ifelse(|w| w.raw("t"), |w| w.raw("a"), |w| w.raw("b")));
        assert_eq!(text, "(ite t a b)");
    }

    #[test]
    fn ceil_uses_the_negated_to_int_identity() {
        assert_eq!(emit(|w| w.ceil(|w| w.raw("x"))), "(- (to_int (- x)))");
        assert_eq!(emit(|w| w.floor(|w| w.raw("x"))), "(to_int x)");
    }

    #[test]
    fn padded_forms_reach_two_operands() {
        assert_eq!(emit(|w| w.and_padded(|_| Ok(0))), "(and true true )");
        assert_eq!(
            emit(|w| w.or_padded(|w| {
                w.raw("x ")?;
                Ok(1)
            })),
            "(or x false )"
        );
        assert_eq!(emit(|w| w.plus_padded(|_| Ok(0))), "(+ 0 0 )");
    }

    #[test]
    fn padding_is_a_no_op_at_two_or_more() {
        let text = emit(|w| {
            w.and_padded(|w| {
                w.raw("a ")?;
                w.raw("b ")?;
                Ok(2)
            })
        });
        assert_eq!(text, "(and a b )");
    }
}
