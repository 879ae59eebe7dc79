//! Transitive assumption-dependency analysis.
//!
//! Every derived constraint `k` gets the set `A(k)` of assumption
//! derivations it transitively relies on. The emitter inlines the boolean
//! `A(i, j)` into the generated formulas, so the table is computed once
//! here and never touched again.

use std::collections::HashSet;

use crate::errors::ModelError;
use crate::model::{Derivation, Reason};

/// One assumption set per constraint index. Problem constraints keep an
/// empty set; `depends` is false for them by construction.
#[derive(Debug, Default)]
pub struct DependencyTable {
    sets: Vec<HashSet<usize>>,
}

impl DependencyTable {
    pub fn empty() -> Self {
        DependencyTable { sets: Vec::new() }
    }

    /// The predicate `A(i, j)`: derivation `i` transitively depends on
    /// assumption `j`.
    pub fn depends(&self, i: usize, j: usize) -> bool {
        match self.sets.get(i) {
            Some(set) => set.contains(&j),
            None => false,
        }
    }

    /// The full assumption set of constraint `i`.
    pub fn assumption_set(&self, i: usize) -> &HashSet<usize> {
        &self.sets[i]
    }

    /// Build the table by walking derived indices in ascending order.
    ///
    /// Also enforces the ordering invariant: every index a reason
    /// references must be strictly smaller than the derivation's own
    /// constraint index.
    pub fn compute(
        num_problem_constraints: usize,
        num_total_constraints: usize,
        derivations: &[Derivation],
    ) -> Result<Self, ModelError> {
        let mut sets: Vec<HashSet<usize>> = Vec::with_capacity(num_total_constraints);
        sets.resize_with(num_problem_constraints, HashSet::new);

        for derivation in derivations {
            let i = derivation.constraint_index;
            let mut set = HashSet::new();

            match &derivation.reason {
                Reason::Assumption => {
                    set.insert(i);
                }
                Reason::Linear { terms } | Reason::Rounding { terms } => {
                    for &(referenced, _) in terms {
                        // Problem constraints carry no assumptions.
                        if referenced < num_problem_constraints {
                            continue;
                        }
                        if referenced >= i {
                            return Err(ModelError::ForwardDependency {
                                derivation: i,
                                referenced,
                            });
                        }
                        set.extend(&sets[referenced]);
                    }
                }
                Reason::Unsplit { i1, l1, i2, l2 } => {
                    for &referenced in &[*i1, *l1, *i2, *l2] {
                        if referenced >= i {
                            return Err(ModelError::ForwardDependency {
                                derivation: i,
                                referenced,
                            });
                        }
                    }

                    if *i1 >= num_problem_constraints {
                        set.extend(&sets[*i1]);
                        set.remove(l1);
                    }

                    if *i2 >= num_problem_constraints {
                        // l2 stays if the first branch already
                        // contributed it.
                        let exclude = !set.contains(l2);
                        set.extend(&sets[*i2]);
                        if exclude {
                            set.remove(l2);
                        }
                    }
                }
                Reason::Solution => {}
            }

            sets.push(set);
        }

        Ok(DependencyTable { sets })
    }
}
