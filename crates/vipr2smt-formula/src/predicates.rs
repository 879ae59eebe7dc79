//! Verification-condition emitters.
//!
//! One method per predicate of the encoding: DOM (domination between two
//! half-spaces), RND (rounding legality), DIS (disjoint integer
//! half-spaces), PRV (references precede the derivation), ASM
//! (assumption-set consistency), FEAS and the top-level SOL block, plus
//! the per-derivation assertion bodies and the terminal solution check.
//!
//! All boolean `A(i, j)` facts are inlined from the precomputed
//! dependency table; the formulas never mention assumption variables.

use std::io::Write;

use vipr2smt_cert::{Constraint, Derivation, Direction, Num, Reason, Solution};

use crate::ops::Op;
use crate::writer::{EmitResult, FormulaWriter, Pad};

impl<'c, W: Write> FormulaWriter<'c, W> {
    ////////////////////////
    // Bound claims       //
    ////////////////////////

    /// `(and <feasible> <upper bound finite>)` — a finite upper bound is
    /// claimed.
    fn upper_claim(&mut self) -> EmitResult {
        let feasible = self.cert.feasible;
        let finite = !self.cert.upper_bound.is_positive_infinity();
        self.op2(Op::And, |w| w.bool_lit(feasible), |w| w.bool_lit(finite))
    }

    fn lower_claim(&mut self) -> EmitResult {
        let feasible = self.cert.feasible;
        let finite = !self.cert.lower_bound.is_negative_infinity();
        self.op2(Op::And, |w| w.bool_lit(feasible), |w| w.bool_lit(finite))
    }

    ////////////////////////
    // SOL block          //
    ////////////////////////

    /// `(<dir> (+ (* c_i x_i) …) target)`, skipping terms where either
    /// factor is lexically zero.
    fn respect_bound(
        &mut self,
        coefficients: &[Num],
        assignments: &[Num],
        direction: Direction,
        target: Num,
    ) -> EmitResult {
        let cert = self.cert;
        self.direction_op(
            direction,
            |w| {
                w.op1(Op::Plus, |w| {
                    let mut count = 0usize;
                    for i in 0..cert.num_variables {
                        let coefficient = coefficients[i];
                        let assignment = assignments[i];
                        if !w.dense
                            && (coefficient.is_zero(&cert.arena)
                                || assignment.is_zero(&cert.arena))
                        {
                            continue;
                        }
                        w.op2(Op::Times, |w| w.number(coefficient), |w| w.number(assignment))?;
                        w.raw(" ")?;
                        count += 1;
                    }
                    if !w.dense {
                        w.pad_operands(count, 2, Pad::Zero)?;
                    }
                    Ok(())
                })
            },
            |w| w.number(target),
        )
    }

    /// Some listed solution's objective value respects `bound`.
    fn one_solution_within_bound(&mut self, direction: Direction, bound: Num) -> EmitResult {
        let cert = self.cert;
        self.or_padded(|w| {
            let mut count = 0usize;
            for solution in &cert.solutions {
                w.respect_bound(&cert.objective, &solution.assignments, direction, bound)?;
                w.raw(" ")?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// One solution satisfies every problem constraint and is integral
    /// where the variables are.
    fn feas_individual(&mut self, solution: &Solution) -> EmitResult {
        let cert = self.cert;
        self.and_padded(|w| {
            let mut count = 0usize;

            for &i in &cert.integral_vars {
                let integral = matches!(solution.assignments[i], Num::Int(_));
                w.bool_lit(integral)?;
                w.raw(" ")?;
                count += 1;
            }

            for constraint in &cert.constraints[..cert.num_problem_constraints] {
                w.op2(
                    Op::Implies,
                    |w| w.op2(Op::Geq, |w| w.sign_code(constraint.direction), |w| w.raw("0")),
                    |w| {
                        w.respect_bound(
                            &constraint.coefficients,
                            &solution.assignments,
                            Direction::GreaterEqual,
                            constraint.target,
                        )
                    },
                )?;
                count += 1;

                w.op2(
                    Op::Implies,
                    |w| w.op2(Op::Leq, |w| w.sign_code(constraint.direction), |w| w.raw("0")),
                    |w| {
                        w.respect_bound(
                            &constraint.coefficients,
                            &solution.assignments,
                            Direction::SmallerEqual,
                            constraint.target,
                        )
                    },
                )?;
                count += 1;

                w.raw(" ")?;
            }

            Ok(count)
        })
    }

    fn feas(&mut self) -> EmitResult {
        let cert = self.cert;
        self.and_padded(|w| {
            let mut count = 0usize;
            for solution in &cert.solutions {
                w.feas_individual(solution)?;
                w.raw(" ")?;
                count += 1;
            }
            Ok(count)
        })
    }

    fn upper_implication(&mut self) -> EmitResult {
        let bound = self.cert.claimed_upper();
        self.op2(
            Op::Implies,
            |w| w.upper_claim(),
            |w| w.one_solution_within_bound(Direction::SmallerEqual, bound),
        )
    }

    fn lower_implication(&mut self) -> EmitResult {
        let bound = self.cert.claimed_lower();
        self.op2(
            Op::Implies,
            |w| w.lower_claim(),
            |w| w.one_solution_within_bound(Direction::GreaterEqual, bound),
        )
    }

    /// The top-level SOL assertion: without feasibility there are no
    /// solutions; with it, every solution is feasible and a claimed
    /// bound is witnessed by at least one of them.
    pub fn sol_block(&mut self) -> EmitResult {
        let cert = self.cert;
        self.raw("; Begin SOL\n")?;
        self.op1(Op::Assert, |w| {
            w.ifelse(
                |w| w.op1(Op::Not, |w| w.bool_lit(cert.feasible)),
                |w| w.op2(Op::Eq, |w| w.usize_lit(cert.solutions.len()), |w| w.raw("0")),
                |w| {
                    w.op2(
                        Op::And,
                        |w| w.feas(),
                        |w| {
                            w.ifelse(
                                |w| w.bool_lit(cert.minimization),
                                |w| w.upper_implication(),
                                |w| w.lower_implication(),
                            )
                        },
                    )
                },
            )
        })?;
        self.raw("\n")
    }

    ////////////////////////
    // Shared predicates  //
    ////////////////////////

    /// DOM over fully general half-space writers. `a`/`a_prime` print
    /// the j-th coefficients, `b`/`b_prime` the targets, and the six
    /// direction writers the exclusive eq/geq/leq tags of each side.
    #[allow(clippy::too_many_arguments)]
    fn dom<A, B, E, G, L, A2, B2, E2, G2, L2>(
        &mut self,
        a: A,
        b: B,
        eq: E,
        geq: G,
        leq: L,
        a_prime: A2,
        b_prime: B2,
        eq_prime: E2,
        geq_prime: G2,
        leq_prime: L2,
    ) -> EmitResult
    where
        A: Fn(&mut Self, usize) -> EmitResult,
        B: Fn(&mut Self) -> EmitResult,
        E: Fn(&mut Self) -> EmitResult,
        G: Fn(&mut Self) -> EmitResult,
        L: Fn(&mut Self) -> EmitResult,
        A2: Fn(&mut Self, usize) -> EmitResult,
        B2: Fn(&mut Self) -> EmitResult,
        E2: Fn(&mut Self) -> EmitResult,
        G2: Fn(&mut Self) -> EmitResult,
        L2: Fn(&mut Self) -> EmitResult,
    {
        let num_variables = self.cert.num_variables;
        self.op2(
            Op::Or,
            // Left side identically zero and infeasible by sign.
            |w| {
                w.op2(
                    Op::And,
                    |w| {
                        let mut count = 0usize;
                        for j in 0..num_variables {
                            w.op2(Op::Eq, |w| a(w, j), |w| w.raw("0"))?;
                            w.raw(" ")?;
                            count += 1;
                        }
                        w.pad_operands(count, 1, Pad::True)
                    },
                    |w| {
                        w.ifelse(
                            |w| eq(w),
                            |w| w.op2(Op::Distinct, |w| b(w), |w| w.raw("0")),
                            |w| {
                                w.ifelse(
                                    |w| geq(w),
                                    |w| w.op2(Op::Gt, |w| b(w), |w| w.raw("0")),
                                    |w| {
                                        w.ifelse(
                                            |w| leq(w),
                                            |w| w.op2(Op::Lt, |w| b(w), |w| w.raw("0")),
                                            |w| w.bool_lit(false),
                                        )
                                    },
                                )
                            },
                        )
                    },
                )
            },
            // Coefficients equal and directions/targets consistent.
            |w| {
                w.op2(
                    Op::And,
                    |w| {
                        let mut count = 0usize;
                        for j in 0..num_variables {
                            w.op2(Op::Eq, |w| a(w, j), |w| a_prime(w, j))?;
                            w.raw(" ")?;
                            count += 1;
                        }
                        w.pad_operands(count, 1, Pad::True)
                    },
                    |w| {
                        w.ifelse(
                            |w| eq_prime(w),
                            |w| w.op2(Op::And, |w| eq(w), |w| w.op2(Op::Eq, |w| b(w), |w| b_prime(w))),
                            |w| {
                                w.ifelse(
                                    |w| geq_prime(w),
                                    |w| {
                                        w.op2(
                                            Op::And,
                                            |w| geq(w),
                                            |w| w.op2(Op::Geq, |w| b(w), |w| b_prime(w)),
                                        )
                                    },
                                    |w| {
                                        w.ifelse(
                                            |w| leq_prime(w),
                                            |w| {
                                                w.op2(
                                                    Op::And,
                                                    |w| leq(w),
                                                    |w| {
                                                        w.op2(
                                                            Op::Leq,
                                                            |w| b(w),
                                                            |w| b_prime(w),
                                                        )
                                                    },
                                                )
                                            },
                                            |w| w.bool_lit(false),
                                        )
                                    },
                                )
                            },
                        )
                    },
                )
            },
        )
    }

    /// DOM where each side's direction is a single sign-code writer; the
    /// eq/geq/leq tags become comparisons of that value against zero.
    fn dom_directed<A, D, B, A2, D2, B2>(
        &mut self,
        a: A,
        direction_a: D,
        b: B,
        a_prime: A2,
        direction_b: D2,
        b_prime: B2,
    ) -> EmitResult
    where
        A: Fn(&mut Self, usize) -> EmitResult,
        D: Fn(&mut Self) -> EmitResult,
        B: Fn(&mut Self) -> EmitResult,
        A2: Fn(&mut Self, usize) -> EmitResult,
        D2: Fn(&mut Self) -> EmitResult,
        B2: Fn(&mut Self) -> EmitResult,
    {
        self.dom(
            a,
            b,
            |w| w.op2(Op::Eq, |w| direction_a(w), |w| w.raw("0")),
            |w| w.op2(Op::Geq, |w| direction_a(w), |w| w.raw("0")),
            |w| w.op2(Op::Leq, |w| direction_a(w), |w| w.raw("0")),
            a_prime,
            b_prime,
            |w| w.op2(Op::Eq, |w| direction_b(w), |w| w.raw("0")),
            |w| w.op2(Op::Geq, |w| direction_b(w), |w| w.raw("0")),
            |w| w.op2(Op::Leq, |w| direction_b(w), |w| w.raw("0")),
        )
    }

    /// DOM between two stored constraints.
    fn dom_constraints(&mut self, first: &Constraint, second: &Constraint) -> EmitResult {
        self.dom_directed(
            |w, j| w.number(first.coefficients[j]),
            |w| w.sign_code(first.direction),
            |w| w.number(first.target),
            |w, j| w.number(second.coefficients[j]),
            |w| w.sign_code(second.direction),
            |w| w.number(second.target),
        )
    }

    /// RND: the combined coefficients are integral on integral
    /// variables, zero elsewhere, and the combination is not an
    /// equation.
    fn rnd_predicate<A, E>(&mut self, a: A, eq: E) -> EmitResult
    where
        A: Fn(&mut Self, usize) -> EmitResult,
        E: FnOnce(&mut Self) -> EmitResult,
    {
        let cert = self.cert;
        self.and_padded(|w| {
            let mut count = 0usize;
            for &j in &cert.integral_vars {
                w.op1(Op::IsInt, |w| a(w, j))?;
                w.raw(" ")?;
                count += 1;
            }
            for &j in &cert.continuous_vars {
                w.op2(Op::Eq, |w| a(w, j), |w| w.raw("0"))?;
                w.raw(" ")?;
                count += 1;
            }
            w.op1(Op::Not, eq)?;
            w.raw(" ")?;
            count += 1;
            Ok(count)
        })
    }

    /// DIS: the two constraints are the same integer hyperplane split
    /// into two facing half-spaces with adjacent integral targets.
    fn dis_predicate(&mut self, c_i: &Constraint, c_j: &Constraint) -> EmitResult {
        let cert = self.cert;
        // Operand count is structurally >= 2 here, no padding needed.
        self.op1(Op::And, |w| {
            for k in 0..cert.num_variables {
                w.op2(
                    Op::Eq,
                    |w| w.number(c_i.coefficients[k]),
                    |w| w.number(c_j.coefficients[k]),
                )?;
                w.raw(" ")?;
            }

            for &k in &cert.integral_vars {
                w.op1(Op::IsInt, |w| w.number(c_i.coefficients[k]))?;
                w.raw(" ")?;
            }

            for &k in &cert.continuous_vars {
                w.op2(Op::Eq, |w| w.number(c_i.coefficients[k]), |w| w.raw("0"))?;
                w.raw(" ")?;
            }

            w.op1(Op::IsInt, |w| w.number(c_i.target))?;
            w.raw(" ")?;
            w.op1(Op::IsInt, |w| w.number(c_j.target))?;
            w.raw(" ")?;

            w.op2(
                Op::And,
                |w| w.op2(Op::Distinct, |w| w.sign_code(c_i.direction), |w| w.raw("0")),
                |w| {
                    w.op2(
                        Op::Eq,
                        |w| {
                            w.op2(
                                Op::Plus,
                                |w| w.sign_code(c_i.direction),
                                |w| w.sign_code(c_j.direction),
                            )
                        },
                        |w| w.raw("0"),
                    )
                },
            )?;
            w.raw(" ")?;

            w.ifelse(
                |w| w.op2(Op::Eq, |w| w.sign_code(c_i.direction), |w| w.raw("1")),
                |w| {
                    w.op2(
                        Op::Eq,
                        |w| w.number(c_i.target),
                        |w| w.op2(Op::Plus, |w| w.number(c_j.target), |w| w.raw("1")),
                    )
                },
                |w| {
                    w.op2(
                        Op::Eq,
                        |w| w.number(c_i.target),
                        |w| w.op2(Op::Minus, |w| w.number(c_j.target), |w| w.raw("1")),
                    )
                },
            )
        })
    }

    /// PRV: every referenced index precedes the current derivation.
    fn prv_predicate(&mut self, k: usize, derivation: &Derivation) -> EmitResult {
        self.and_padded(|w| {
            let mut count = 0usize;
            for j in derivation.reason.referenced_indices() {
                w.op2(Op::Lt, |w| w.usize_lit(j), |w| w.usize_lit(k))?;
                w.raw(" ")?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// ASM: ties the inlined `A(k, ·)` facts to the reason structure.
    /// Emits a sequence of sibling forms and reports how many.
    fn asm_predicate(&mut self, k: usize, derivation: &Derivation) -> std::io::Result<usize> {
        let cert = self.cert;
        let mut emitted = 0usize;

        // Later assumptions can never be depended on.
        for j in (k + 1)..cert.num_total_constraints {
            if cert.derivation_at(j).reason.is_assumption() {
                let dep = cert.dependencies.depends(k, j);
                self.op1(Op::Not, |w| w.bool_lit(dep))?;
                self.raw(" ")?;
                emitted += 1;
            }
        }

        match &derivation.reason {
            Reason::Assumption => {
                let self_dep = cert.dependencies.depends(k, k);
                self.op2(
                    Op::And,
                    |w| w.bool_lit(self_dep),
                    |w| {
                        w.and_padded(|w| {
                            let mut count = 0usize;
                            for j in cert.num_problem_constraints..k {
                                if cert.derivation_at(j).reason.is_assumption() {
                                    let dep = cert.dependencies.depends(k, j);
                                    w.op1(Op::Not, |w| w.bool_lit(dep))?;
                                    w.raw(" ")?;
                                    count += 1;
                                }
                            }
                            Ok(count)
                        })
                    },
                )?;
            }
            Reason::Linear { terms } | Reason::Rounding { terms } => {
                self.and_padded(|w| {
                    let mut count = 0usize;
                    for j in cert.num_problem_constraints..k {
                        if !cert.derivation_at(j).reason.is_assumption() {
                            continue;
                        }
                        let dep = cert.dependencies.depends(k, j);
                        w.op2(
                            Op::Eq,
                            |w| w.bool_lit(dep),
                            |w| {
                                w.or_padded(|w| {
                                    let mut inner = 0usize;
                                    for &(i, _) in terms.iter() {
                                        if j <= i && i < k {
                                            let fact = cert.dependencies.depends(i, j);
                                            w.bool_lit(fact)?;
                                            w.raw(" ")?;
                                            inner += 1;
                                        }
                                    }
                                    Ok(inner)
                                })
                            },
                        )?;
                        w.raw(" ")?;
                        count += 1;
                    }
                    Ok(count)
                })?;
            }
            Reason::Unsplit { i1, l1, i2, l2 } => {
                let (i1, l1, i2, l2) = (*i1, *l1, *i2, *l2);
                self.and_padded(|w| {
                    let mut count = 0usize;
                    for j in cert.num_problem_constraints..k {
                        if !cert.derivation_at(j).reason.is_assumption() {
                            continue;
                        }
                        let dep = cert.dependencies.depends(k, j);
                        w.op2(
                            Op::Eq,
                            |w| w.bool_lit(dep),
                            |w| {
                                w.op2(
                                    Op::Or,
                                    |w| {
                                        w.op2(
                                            Op::And,
                                            |w| w.bool_lit(cert.dependencies.depends(i1, j)),
                                            |w| {
                                                w.op2(
                                                    Op::Distinct,
                                                    |w| w.usize_lit(j),
                                                    |w| w.usize_lit(l1),
                                                )
                                            },
                                        )
                                    },
                                    |w| {
                                        w.op2(
                                            Op::And,
                                            |w| w.bool_lit(cert.dependencies.depends(i2, j)),
                                            |w| {
                                                w.op2(
                                                    Op::Distinct,
                                                    |w| w.usize_lit(j),
                                                    |w| w.usize_lit(l2),
                                                )
                                            },
                                        )
                                    },
                                )
                            },
                        )?;
                        w.raw(" ")?;
                        count += 1;
                    }
                    Ok(count)
                })?;
            }
            Reason::Solution => {
                self.and_padded(|w| {
                    let mut count = 0usize;
                    for j in cert.num_problem_constraints..k {
                        if cert.derivation_at(j).reason.is_assumption() {
                            let dep = cert.dependencies.depends(k, j);
                            w.op1(Op::Not, |w| w.bool_lit(dep))?;
                            w.raw(" ")?;
                            count += 1;
                        }
                    }
                    Ok(count)
                })?;
            }
        }

        Ok(emitted + 1)
    }

    ////////////////////////
    // LIN / RND support  //
    ////////////////////////

    /// j-th coefficient of the weighted reference combination:
    /// `(+ (* d_i c_i[j]) …)`.
    fn combination_coefficient(&mut self, terms: &[(usize, Num)], j: usize) -> EmitResult {
        let cert = self.cert;
        self.plus_padded(|w| {
            let mut count = 0usize;
            for &(i, multiplier) in terms {
                let coefficient = cert.constraints[i].coefficients[j];
                if !w.dense
                    && (multiplier.is_zero(&cert.arena) || coefficient.is_zero(&cert.arena))
                {
                    continue;
                }
                w.op2(Op::Times, |w| w.number(multiplier), |w| w.number(coefficient))?;
                w.raw(" ")?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// Target of the weighted reference combination.
    fn combination_target(&mut self, terms: &[(usize, Num)]) -> EmitResult {
        let cert = self.cert;
        self.plus_padded(|w| {
            let mut count = 0usize;
            for &(i, multiplier) in terms {
                let target = cert.constraints[i].target;
                if !w.dense && (multiplier.is_zero(&cert.arena) || target.is_zero(&cert.arena)) {
                    continue;
                }
                w.op2(Op::Times, |w| w.number(multiplier), |w| w.number(target))?;
                w.raw(" ")?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// The combination carries the given direction: every weighted
    /// reference sign satisfies `(d_i · s(dir_i)) <dir> 0`.
    fn combination_direction(
        &mut self,
        terms: &[(usize, Num)],
        direction: Direction,
    ) -> EmitResult {
        let cert = self.cert;
        self.and_padded(|w| {
            let mut count = 0usize;
            for &(i, multiplier) in terms {
                let reference_direction = cert.constraints[i].direction;
                if !w.dense
                    && (multiplier.is_zero(&cert.arena)
                        || reference_direction == Direction::Equal)
                {
                    continue;
                }
                w.direction_op(
                    direction,
                    |w| {
                        w.op2(
                            Op::Times,
                            |w| w.number(multiplier),
                            |w| w.sign_code(reference_direction),
                        )
                    },
                    |w| w.raw("0"),
                )?;
                w.raw(" ")?;
                count += 1;
            }
            Ok(count)
        })
    }

    ////////////////////////
    // Per-reason bodies  //
    ////////////////////////

    fn lin_body(
        &mut self,
        k: usize,
        derivation: &'c Derivation,
        terms: &'c [(usize, Num)],
    ) -> EmitResult {
        let cert = self.cert;
        let current = &cert.constraints[k];
        // ASM + PRV + DOM: always at least three operands.
        self.op1(Op::And, |w| {
            w.asm_predicate(k, derivation)?;
            w.raw(" ")?;
            w.prv_predicate(k, derivation)?;
            w.raw(" ")?;
            w.dom(
                |w, j| w.combination_coefficient(terms, j),
                |w| w.combination_target(terms),
                |w| w.combination_direction(terms, Direction::Equal),
                |w| w.combination_direction(terms, Direction::GreaterEqual),
                |w| w.combination_direction(terms, Direction::SmallerEqual),
                |w, j| w.number(current.coefficients[j]),
                |w| w.number(current.target),
                |w| w.op2(Op::Eq, |w| w.sign_code(current.direction), |w| w.raw("0")),
                |w| w.op2(Op::Geq, |w| w.sign_code(current.direction), |w| w.raw("0")),
                |w| w.op2(Op::Leq, |w| w.sign_code(current.direction), |w| w.raw("0")),
            )
        })
    }

    /// The DOM-like disjunction specialized for rounding: either the
    /// combination is identically zero with a strict sign, or it matches
    /// the current coefficients and the rounded bound dominates.
    #[allow(clippy::too_many_arguments)]
    fn rnd_round_part<A, B, G, L, A2, B2>(
        &mut self,
        a: A,
        b: B,
        geq: G,
        leq: L,
        a_prime: A2,
        b_prime: B2,
        k: usize,
    ) -> EmitResult
    where
        A: Fn(&mut Self, usize) -> EmitResult,
        B: Fn(&mut Self) -> EmitResult,
        G: Fn(&mut Self) -> EmitResult,
        L: Fn(&mut Self) -> EmitResult,
        A2: Fn(&mut Self, usize) -> EmitResult,
        B2: Fn(&mut Self) -> EmitResult,
    {
        let num_variables = self.cert.num_variables;
        let current_direction = self.cert.constraints[k].direction;
        self.op2(
            Op::Or,
            |w| {
                w.op2(
                    Op::And,
                    |w| {
                        let mut count = 0usize;
                        for j in 0..num_variables {
                            w.op2(Op::Eq, |w| a(w, j), |w| w.raw("0"))?;
                            w.raw(" ")?;
                            count += 1;
                        }
                        w.pad_operands(count, 1, Pad::True)
                    },
                    |w| {
                        w.ifelse(
                            |w| geq(w),
                            |w| w.op2(Op::Gt, |w| b(w), |w| w.raw("0")),
                            |w| {
                                w.ifelse(
                                    |w| leq(w),
                                    |w| w.op2(Op::Lt, |w| b(w), |w| w.raw("0")),
                                    |w| w.bool_lit(false),
                                )
                            },
                        )
                    },
                )
            },
            |w| {
                w.op2(
                    Op::And,
                    |w| {
                        let mut count = 0usize;
                        for j in 0..num_variables {
                            w.op2(Op::Eq, |w| a(w, j), |w| a_prime(w, j))?;
                            w.raw(" ")?;
                            count += 1;
                        }
                        w.pad_operands(count, 1, Pad::True)
                    },
                    |w| {
                        w.ifelse(
                            |w| {
                                w.op2(Op::Eq, |w| w.sign_code(current_direction), |w| w.raw("1"))
                            },
                            |w| {
                                w.op2(
                                    Op::And,
                                    |w| geq(w),
                                    |w| {
                                        w.op2(
                                            Op::Geq,
                                            |w| w.ceil(|w| b(w)),
                                            |w| b_prime(w),
                                        )
                                    },
                                )
                            },
                            |w| {
                                w.op2(
                                    Op::And,
                                    |w| leq(w),
                                    |w| {
                                        w.op2(
                                            Op::Leq,
                                            |w| w.floor(|w| b(w)),
                                            |w| b_prime(w),
                                        )
                                    },
                                )
                            },
                        )
                    },
                )
            },
        )
    }

    fn rnd_body(
        &mut self,
        k: usize,
        derivation: &'c Derivation,
        terms: &'c [(usize, Num)],
    ) -> EmitResult {
        let cert = self.cert;
        let current = &cert.constraints[k];
        self.op1(Op::And, |w| {
            w.asm_predicate(k, derivation)?;
            w.raw(" ")?;
            w.prv_predicate(k, derivation)?;
            w.raw(" ")?;

            w.rnd_predicate(
                |w, j| w.combination_coefficient(terms, j),
                |w| w.combination_direction(terms, Direction::Equal),
            )?;
            w.raw(" ")?;

            w.op2(
                Op::Distinct,
                |w| w.sign_code(current.direction),
                |w| w.raw("0"),
            )?;
            w.raw(" ")?;

            w.rnd_round_part(
                |w, j| w.combination_coefficient(terms, j),
                |w| w.combination_target(terms),
                |w| w.combination_direction(terms, Direction::GreaterEqual),
                |w| w.combination_direction(terms, Direction::SmallerEqual),
                |w, j| w.number(current.coefficients[j]),
                |w| w.number(current.target),
                k,
            )
        })
    }

    fn uns_body(
        &mut self,
        k: usize,
        derivation: &'c Derivation,
        i1: usize,
        l1: usize,
        i2: usize,
        l2: usize,
    ) -> EmitResult {
        let cert = self.cert;
        let current = &cert.constraints[k];
        self.op1(Op::And, |w| {
            w.asm_predicate(k, derivation)?;
            w.raw(" ")?;
            w.op2(Op::Gt, |w| w.usize_lit(k), |w| w.usize_lit(i1))?;
            w.raw(" ")?;
            w.op2(Op::Gt, |w| w.usize_lit(k), |w| w.usize_lit(i2))?;
            w.raw(" ")?;
            w.dom_constraints(&cert.constraints[i1], current)?;
            w.raw(" ")?;
            w.dom_constraints(&cert.constraints[i2], current)?;
            w.raw(" ")?;
            w.bool_lit(cert.dependencies.depends(i1, l1))?;
            w.raw(" ")?;
            w.bool_lit(cert.dependencies.depends(i2, l2))?;
            w.raw(" ")?;
            w.dis_predicate(&cert.constraints[l1], &cert.constraints[l2])
        })
    }

    /// DOM between one solution's objective value and the derived
    /// constraint, with the bound side's direction chosen by the caller.
    fn sol_body_dom(
        &mut self,
        solution: &'c Solution,
        direction: Direction,
        current: &'c Constraint,
    ) -> EmitResult {
        let cert = self.cert;
        self.dom_directed(
            |w, j| w.number(cert.objective[j]),
            |w| w.sign_code(direction),
            |w| {
                w.op1(Op::Plus, |w| {
                    let mut count = 0usize;
                    for i in 0..cert.num_variables {
                        if !w.dense
                            && (cert.objective[i].is_zero(&cert.arena)
                                || solution.assignments[i].is_zero(&cert.arena))
                        {
                            continue;
                        }
                        w.op2(
                            Op::Times,
                            |w| w.number(cert.objective[i]),
                            |w| w.number(solution.assignments[i]),
                        )?;
                        w.raw(" ")?;
                        count += 1;
                    }
                    if !w.dense {
                        w.pad_operands(count, 2, Pad::Zero)?;
                    }
                    Ok(())
                })
            },
            |w, j| w.number(current.coefficients[j]),
            |w| w.sign_code(current.direction),
            |w| w.number(current.target),
        )
    }

    fn sol_body(&mut self, k: usize, derivation: &'c Derivation) -> EmitResult {
        let cert = self.cert;
        let current = &cert.constraints[k];
        self.op2(
            Op::And,
            |w| {
                w.asm_predicate(k, derivation)?;
                Ok(())
            },
            |w| {
                w.ifelse(
                    |w| w.bool_lit(cert.minimization),
                    |w| {
                        w.or_padded(|w| {
                            let mut count = 0usize;
                            for solution in &cert.solutions {
                                w.sol_body_dom(solution, Direction::SmallerEqual, current)?;
                                w.raw(" ")?;
                                count += 1;
                            }
                            Ok(count)
                        })
                    },
                    |w| {
                        w.or_padded(|w| {
                            let mut count = 0usize;
                            for solution in &cert.solutions {
                                w.sol_body_dom(solution, Direction::GreaterEqual, current)?;
                                w.raw(" ")?;
                                count += 1;
                            }
                            Ok(count)
                        })
                    },
                )
            },
        )
    }

    ////////////////////////
    // DER assertions     //
    ////////////////////////

    /// One `(assert (and …))` for the derivation at `global_index`, with
    /// a leading comment naming the derived constraint.
    pub fn derivation_assertion(&mut self, global_index: usize) -> EmitResult {
        let cert = self.cert;
        let derivation = cert.derivation_at(global_index);
        let name = cert.arena.resolve(cert.constraints[global_index].name);

        self.raw("; DER for constraint ")?;
        self.raw(name)?;
        self.raw("\n")?;

        self.op1(Op::Assert, |w| {
            w.and_padded(|w| {
                let count = match &derivation.reason {
                    Reason::Assumption => w.asm_predicate(global_index, derivation)?,
                    Reason::Linear { terms } => {
                        w.lin_body(global_index, derivation, terms)?;
                        1
                    }
                    Reason::Rounding { terms } => {
                        w.rnd_body(global_index, derivation, terms)?;
                        1
                    }
                    Reason::Unsplit { i1, l1, i2, l2 } => {
                        w.uns_body(global_index, derivation, *i1, *l1, *i2, *l2)?;
                        1
                    }
                    Reason::Solution => {
                        w.sol_body(global_index, derivation)?;
                        1
                    }
                };
                w.raw(" ")?;
                Ok(count)
            })
        })?;
        self.raw("\n")
    }

    ////////////////////////
    // Solution check     //
    ////////////////////////

    /// Negations of every `A(k, j)` fact for assumption rows `j`.
    fn negated_assumption_conjunction(&mut self, k: usize) -> EmitResult {
        let cert = self.cert;
        self.and_padded(|w| {
            let mut count = 0usize;
            for j in cert.num_problem_constraints..cert.num_total_constraints {
                if cert.derivation_at(j).reason.is_assumption() {
                    let dep = cert.dependencies.depends(k, j);
                    w.op1(Op::Not, |w| w.bool_lit(dep))?;
                    w.raw(" ")?;
                    count += 1;
                }
            }
            Ok(count)
        })
    }

    /// The terminal assertion tying the last constraint to the claimed
    /// verdict: infeasibility must dominate `0 >= 1`, a finite bound
    /// must dominate the objective bounded by it, and neither may rest
    /// on open assumptions.
    pub fn solution_check_block(&mut self) -> EmitResult {
        let cert = self.cert;
        if cert.constraints.is_empty() {
            tracing::warn!("certificate has no constraints; skipping the solution check");
            return Ok(());
        }
        let last = cert.num_total_constraints - 1;
        let last_constraint = &cert.constraints[last];

        self.raw("; Begin DER (solution check)\n")?;
        self.op1(Op::Assert, |w| {
            w.ifelse(
                |w| w.op1(Op::Not, |w| w.bool_lit(cert.feasible)),
                |w| {
                    w.op2(
                        Op::And,
                        |w| {
                            w.dom_directed(
                                |w, j| w.number(last_constraint.coefficients[j]),
                                |w| w.sign_code(last_constraint.direction),
                                |w| w.number(last_constraint.target),
                                |w, _j| w.raw("0"),
                                |w| w.sign_code(Direction::GreaterEqual),
                                |w| w.raw("1"),
                            )
                        },
                        |w| w.negated_assumption_conjunction(last),
                    )
                },
                |w| {
                    w.op2(
                        Op::And,
                        |w| {
                            w.op2(
                                Op::Implies,
                                |w| {
                                    w.op2(
                                        Op::And,
                                        |w| w.bool_lit(cert.minimization),
                                        |w| w.lower_claim(),
                                    )
                                },
                                |w| {
                                    w.op2(
                                        Op::And,
                                        |w| {
                                            w.dom_directed(
                                                |w, j| {
                                                    w.number(last_constraint.coefficients[j])
                                                },
                                                |w| w.sign_code(last_constraint.direction),
                                                |w| w.number(last_constraint.target),
                                                |w, j| w.number(cert.objective[j]),
                                                |w| w.sign_code(Direction::GreaterEqual),
                                                |w| w.number(cert.claimed_lower()),
                                            )
                                        },
                                        |w| w.negated_assumption_conjunction(last),
                                    )
                                },
                            )
                        },
                        |w| {
                            w.op2(
                                Op::Implies,
                                |w| {
                                    w.op2(
                                        Op::And,
                                        |w| w.op1(Op::Not, |w| w.bool_lit(cert.minimization)),
                                        |w| w.upper_claim(),
                                    )
                                },
                                |w| {
                                    w.op2(
                                        Op::And,
                                        |w| {
                                            w.dom_directed(
                                                |w, j| {
                                                    w.number(last_constraint.coefficients[j])
                                                },
                                                |w| w.sign_code(last_constraint.direction),
                                                |w| w.number(last_constraint.target),
                                                |w, j| w.number(cert.objective[j]),
                                                |w| w.sign_code(Direction::SmallerEqual),
                                                |w| w.number(cert.claimed_upper()),
                                            )
                                        },
                                        |w| w.negated_assumption_conjunction(last),
                                    )
                                },
                            )
                        },
                    )
                },
            )
        })?;
        self.raw("\n")
    }
}
