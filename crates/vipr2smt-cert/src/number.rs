//! Lexical rational values.
//!
//! Numbers are carried through the whole pipeline as the decimal strings
//! that appeared in the certificate; no arithmetic is ever performed on
//! them. The only inspections are the zero test (numerator is literally
//! `"0"`) and leading-sign detection, both of which the emitter needs.

use crate::arena::{StringArena, Sym};

/// A certificate number: an integer, a fraction, or an infinity sentinel.
///
/// Infinities are only legal in `RTP` bounds and are never printed into a
/// formula; the bound accessors on the certificate substitute zero before
/// an infinite bound could reach the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Num {
    /// Integer, e.g. `-17`.
    Int(Sym),
    /// Fraction `numerator/denominator`, e.g. `-3/4`.
    Ratio(Sym, Sym),
    PosInf,
    NegInf,
}

impl Num {
    /// The integer zero, backed by the arena's reserved `"0"`.
    pub const ZERO: Num = Num::Int(Sym::ZERO);
    /// The integer one, backed by the arena's reserved `"1"`.
    pub const ONE: Num = Num::Int(Sym::ONE);

    /// True when the numerator is the literal token `0`.
    ///
    /// `-0` is deliberately not zero here; the test is lexical, not
    /// arithmetic.
    pub fn is_zero(&self, arena: &StringArena) -> bool {
        match self {
            Num::Int(n) | Num::Ratio(n, _) => arena.resolve(*n) == "0",
            Num::PosInf | Num::NegInf => false,
        }
    }

    pub fn is_positive_infinity(&self) -> bool {
        matches!(self, Num::PosInf)
    }

    pub fn is_negative_infinity(&self) -> bool {
        matches!(self, Num::NegInf)
    }

    /// Render in certificate syntax (`n` or `n/d`, `inf`, `-inf`).
    pub fn display(&self, arena: &StringArena) -> String {
        match self {
            Num::Int(n) => arena.resolve(*n).to_string(),
            Num::Ratio(n, d) => format!("{}/{}", arena.resolve(*n), arena.resolve(*d)),
            Num::PosInf => "inf".to_string(),
            Num::NegInf => "-inf".to_string(),
        }
    }
}

impl Default for Num {
    /// Dense coefficient vectors start out all-zero.
    fn default() -> Self {
        Num::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_test_is_lexical() {
        let mut arena = StringArena::new();
        let zero = Num::Int(arena.intern("0"));
        let minus_zero = Num::Int(arena.intern("-0"));
        let zero_ratio = Num::Ratio(arena.intern("0"), arena.intern("7"));
        assert!(zero.is_zero(&arena));
        assert!(zero_ratio.is_zero(&arena));
        assert!(!minus_zero.is_zero(&arena));
        assert!(!Num::PosInf.is_zero(&arena));
    }

    #[test]
    fn default_is_the_reserved_zero() {
        let arena = StringArena::new();
        assert!(Num::default().is_zero(&arena));
        assert_eq!(Num::default(), Num::ZERO);
    }

    #[test]
    fn display_round_trips_certificate_syntax() {
        let mut arena = StringArena::new();
        let frac = Num::Ratio(arena.intern("-3"), arena.intern("4"));
        assert_eq!(frac.display(&arena), "-3/4");
        assert_eq!(Num::PosInf.display(&arena), "inf");
        assert_eq!(Num::NegInf.display(&arena), "-inf");
    }
}
