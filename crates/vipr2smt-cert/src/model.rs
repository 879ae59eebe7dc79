//! In-memory certificate model.
//!
//! Everything here is built once by the parser, finished by
//! [`Certificate::precompute`], and treated as read-only by the formula
//! emitter, which may walk it from several threads at once.

use crate::arena::{StringArena, Sym};
use crate::deps::DependencyTable;
use crate::errors::ModelError;
use crate::number::Num;

/// Comparison sense of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SmallerEqual,
    Equal,
    GreaterEqual,
}

/// A named linear form `coefficients · x <dir> target`.
///
/// Coefficient vectors are dense with one entry per variable.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: Sym,
    pub coefficients: Vec<Num>,
    pub direction: Direction,
    pub target: Num,
}

/// A named dense variable assignment.
#[derive(Debug, Clone)]
pub struct Solution {
    pub name: Sym,
    pub assignments: Vec<Num>,
}

/// Discriminant of a [`Reason`], used where only the kind matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonKind {
    Assumption,
    Linear,
    Rounding,
    Unsplit,
    Solution,
}

/// Justification attached to a derived constraint.
#[derive(Debug, Clone)]
pub enum Reason {
    /// `asm`: the constraint is assumed.
    Assumption,
    /// `lin`: a weighted combination of earlier constraints.
    Linear { terms: Vec<(usize, Num)> },
    /// `rnd`: a weighted combination whose bound is then rounded.
    Rounding { terms: Vec<(usize, Num)> },
    /// `uns`: case split elimination over two branches `i1`/`i2` with
    /// their local assumptions `l1`/`l2`.
    Unsplit {
        i1: usize,
        l1: usize,
        i2: usize,
        l2: usize,
    },
    /// `sol`: justified by one of the listed solutions.
    Solution,
}

impl Reason {
    pub fn kind(&self) -> ReasonKind {
        match self {
            Reason::Assumption => ReasonKind::Assumption,
            Reason::Linear { .. } => ReasonKind::Linear,
            Reason::Rounding { .. } => ReasonKind::Rounding,
            Reason::Unsplit { .. } => ReasonKind::Unsplit,
            Reason::Solution => ReasonKind::Solution,
        }
    }

    pub fn is_assumption(&self) -> bool {
        matches!(self, Reason::Assumption)
    }

    /// All constraint indices this reason mentions, in certificate order.
    pub fn referenced_indices(&self) -> Vec<usize> {
        match self {
            Reason::Assumption | Reason::Solution => Vec::new(),
            Reason::Linear { terms } | Reason::Rounding { terms } => {
                terms.iter().map(|&(index, _)| index).collect()
            }
            Reason::Unsplit { i1, l1, i2, l2 } => vec![*i1, *l1, *i2, *l2],
        }
    }
}

/// One derivation step. The constraint it derives sits at
/// `constraint_index` in the flat constraint sequence.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub constraint_index: usize,
    pub reason: Reason,
    pub largest_index: i64,
}

/// A parsed VIPR certificate.
///
/// Constraint indices `[0, num_problem_constraints)` are problem
/// constraints; the derived ones follow in derivation order.
#[derive(Debug)]
pub struct Certificate {
    pub arena: StringArena,

    pub feasible: bool,
    pub lower_bound: Num,
    pub upper_bound: Num,
    pub minimization: bool,

    pub num_variables: usize,
    pub variable_names: Vec<Sym>,
    pub integral_flags: Vec<bool>,

    /// Variable indices with the integrality flag set. Precomputed.
    pub integral_vars: Vec<usize>,
    /// The complement of `integral_vars`. Precomputed.
    pub continuous_vars: Vec<usize>,

    pub objective: Vec<Num>,

    pub num_problem_constraints: usize,
    pub num_derived_constraints: usize,
    /// `num_problem_constraints + num_derived_constraints`. Precomputed.
    pub num_total_constraints: usize,

    pub constraints: Vec<Constraint>,
    pub solutions: Vec<Solution>,
    pub derivations: Vec<Derivation>,

    /// Transitive assumption sets, one per derived constraint. Built by
    /// [`Certificate::precompute`], read-only afterwards.
    pub dependencies: DependencyTable,
}

impl Certificate {
    pub(crate) fn new(arena: StringArena) -> Self {
        Certificate {
            arena,
            feasible: false,
            lower_bound: Num::NegInf,
            upper_bound: Num::PosInf,
            minimization: true,
            num_variables: 0,
            variable_names: Vec::new(),
            integral_flags: Vec::new(),
            integral_vars: Vec::new(),
            continuous_vars: Vec::new(),
            objective: Vec::new(),
            num_problem_constraints: 0,
            num_derived_constraints: 0,
            num_total_constraints: 0,
            constraints: Vec::new(),
            solutions: Vec::new(),
            derivations: Vec::new(),
            dependencies: DependencyTable::empty(),
        }
    }

    /// The derivation that produced the constraint at `global_index`.
    ///
    /// Callers must only pass indices in the derived range.
    pub fn derivation_at(&self, global_index: usize) -> &Derivation {
        &self.derivations[global_index - self.num_problem_constraints]
    }

    /// A finite upper bound is claimed.
    pub fn upper_bound_claimed(&self) -> bool {
        self.feasible && !self.upper_bound.is_positive_infinity()
    }

    /// A finite lower bound is claimed.
    pub fn lower_bound_claimed(&self) -> bool {
        self.feasible && !self.lower_bound.is_negative_infinity()
    }

    /// The claimed upper bound, or zero when none is claimed. The zero
    /// fallback keeps infinities out of emitted formulas; the guard on
    /// the claim flag makes the value irrelevant in that case.
    pub fn claimed_upper(&self) -> Num {
        if self.upper_bound_claimed() {
            self.upper_bound
        } else {
            Num::ZERO
        }
    }

    /// The claimed lower bound, or zero when none is claimed.
    pub fn claimed_lower(&self) -> Num {
        if self.lower_bound_claimed() {
            self.lower_bound
        } else {
            Num::ZERO
        }
    }

    /// Finish the model after parsing: total constraint count, the
    /// integral/continuous partition, dense-vector validation, and the
    /// dependency table.
    pub fn precompute(&mut self) -> Result<(), ModelError> {
        self.num_total_constraints = self.num_problem_constraints + self.num_derived_constraints;

        self.integral_vars.clear();
        self.continuous_vars.clear();
        for (index, &integral) in self.integral_flags.iter().enumerate() {
            if integral {
                self.integral_vars.push(index);
            } else {
                self.continuous_vars.push(index);
            }
        }

        // A certificate without an OBJ section has an all-zero objective.
        if self.objective.len() < self.num_variables {
            self.objective.resize(self.num_variables, Num::ZERO);
        }

        // The emitter indexes every dense vector up to the variable
        // count; sections out of order leave short vectors.
        for (index, constraint) in self.constraints.iter().enumerate() {
            if constraint.coefficients.len() != self.num_variables {
                return Err(ModelError::CoefficientLength {
                    constraint: index,
                    expected: self.num_variables,
                    found: constraint.coefficients.len(),
                });
            }
        }
        for (index, solution) in self.solutions.iter().enumerate() {
            if solution.assignments.len() != self.num_variables {
                return Err(ModelError::AssignmentLength {
                    solution: index,
                    expected: self.num_variables,
                    found: solution.assignments.len(),
                });
            }
        }

        self.dependencies = DependencyTable::compute(
            self.num_problem_constraints,
            self.num_total_constraints,
            &self.derivations,
        )?;
        Ok(())
    }
}
