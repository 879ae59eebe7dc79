//! Human-readable certificate rendering, used by the CLI's dump mode and
//! by tests that want to eyeball a parsed model.

use std::fmt::Write;

use crate::arena::StringArena;
use crate::model::{Certificate, Constraint, Direction, Reason, Solution};
use crate::number::Num;

fn linear_form(values: &[Num], arena: &StringArena) -> String {
    let mut out = String::new();
    let mut first = true;
    for (index, value) in values.iter().enumerate() {
        if value.is_zero(arena) {
            continue;
        }
        if first {
            first = false;
        } else {
            out.push_str(" + ");
        }
        let _ = write!(out, "({} x_{index})", value.display(arena));
    }
    out
}

fn direction_symbol(direction: Direction) -> &'static str {
    match direction {
        Direction::SmallerEqual => " <= ",
        Direction::Equal => " = ",
        Direction::GreaterEqual => " >= ",
    }
}

pub fn render_constraint(constraint: &Constraint, arena: &StringArena) -> String {
    format!(
        "{}: {}{}{}",
        arena.resolve(constraint.name),
        linear_form(&constraint.coefficients, arena),
        direction_symbol(constraint.direction),
        constraint.target.display(arena)
    )
}

pub fn render_solution(solution: &Solution, arena: &StringArena) -> String {
    format!(
        "{}: {}",
        arena.resolve(solution.name),
        linear_form(&solution.assignments, arena)
    )
}

fn render_reason(reason: &Reason, arena: &StringArena) -> String {
    let tag = match reason {
        Reason::Assumption => "asm",
        Reason::Linear { .. } => "lin",
        Reason::Rounding { .. } => "rnd",
        Reason::Unsplit { .. } => "uns",
        Reason::Solution => "sol",
    };
    let mut out = format!("{{ {tag} }} [");
    for index in reason.referenced_indices() {
        let _ = write!(out, " {index}");
    }
    out.push_str(" ] [");
    if let Reason::Linear { terms } | Reason::Rounding { terms } = reason {
        for (_, multiplier) in terms {
            let _ = write!(out, " {}", multiplier.display(arena));
        }
    }
    out.push_str(" ]");
    out
}

/// Render the whole certificate in the order it was declared: variables,
/// objective, constraints, solutions, derivations.
pub fn render_certificate(cert: &Certificate) -> String {
    let mut out = String::new();

    for (index, &name) in cert.variable_names.iter().enumerate() {
        let kind = if cert.integral_flags[index] {
            "Integral"
        } else {
            "Fraction"
        };
        let _ = writeln!(out, "{}: {kind}", cert.arena.resolve(name));
    }

    let _ = writeln!(
        out,
        "Objective ({}): {}",
        if cert.minimization { "min" } else { "max" },
        linear_form(&cert.objective, &cert.arena)
    );

    let _ = writeln!(out, "Constraints:");
    for constraint in &cert.constraints {
        let _ = writeln!(out, "{}", render_constraint(constraint, &cert.arena));
    }

    let _ = writeln!(out, "Solutions:");
    for solution in &cert.solutions {
        let _ = writeln!(out, "{}", render_solution(solution, &cert.arena));
    }

    let _ = writeln!(out, "Derivations:");
    for derivation in &cert.derivations {
        let constraint = &cert.constraints[derivation.constraint_index];
        let _ = writeln!(
            out,
            "Derivation {} {} last_index {}",
            render_constraint(constraint, &cert.arena),
            render_reason(&derivation.reason, &cert.arena),
            derivation.largest_index
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::io::Cursor;

    #[test]
    fn renders_constraints_with_zero_terms_elided() {
        let cert = parse(Cursor::new(
            "VAR 3\nx y z\nCON 1 0\nc1 L 5 2 0 2 2 -1/2\n".to_string(),
        ))
        .unwrap();
        let text = render_constraint(&cert.constraints[0], &cert.arena);
        assert_eq!(text, "c1: (2 x_0) + (-1/2 x_2) <= 5");
    }

    #[test]
    fn renders_the_full_certificate_sections_in_order() {
        let cert = parse(Cursor::new(
            "VAR 1\nx\nINT 1 0\nOBJ min 1 0 1\nCON 1 0\nc1 G 0 OBJ\nRTP range 0 0\nSOL 1\ns1 1 0 1\nDER 1\nd1 G 0 OBJ { sol } -1\n"
                .to_string(),
        ))
        .unwrap();
        let text = render_certificate(&cert);
        assert!(text.starts_with("x: Integral\n"));
        assert!(text.contains("Objective (min): (1 x_0)"));
        assert!(text.contains("c1: (1 x_0) >= 0"));
        assert!(text.contains("s1: (1 x_0)"));
        assert!(text.contains("{ sol } [ ] [ ] last_index -1"));
    }
}
