//! `vipr2smt`: transform a VIPR certificate into SMT-LIB 2.6 assertions
//! and check them with an external solver runner.
//!
//! Exit code 0 means the observed satisfiability matched the expectation
//! on every dispatched block; anything else is a failure. A one-line
//! machine-grepable summary goes to stderr either way.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use vipr2smt_cert::render::render_certificate;
use vipr2smt_cert::{parser, Certificate};
use vipr2smt_exec::{evaluate, Dispatcher};
use vipr2smt_formula::{effective_block_size, generate, EmitOptions};

#[derive(Debug, Parser)]
#[command(name = "vipr2smt")]
#[command(about = "Transform a VIPR certificate into SMT-LIB and check it with a solver runner")]
#[command(version)]
struct Cli {
    /// Path to the VIPR certificate file.
    input: PathBuf,

    /// Base path for the generated SMT-LIB files.
    output: String,

    /// Expected satisfiability of the generated formulas: sat | unsat.
    expectation: String,

    /// Derived constraints per output file (0 picks the default).
    #[arg(default_value_t = 0)]
    block_size: usize,

    /// Solver runner executable, invoked with one formula file per task.
    #[arg(long, default_value = "./local_runner.sh")]
    runner: PathBuf,

    /// Number of single-slot local worker machines.
    #[arg(long, default_value_t = 3)]
    slots: u32,

    /// Write one output file sequentially instead of per-block files.
    #[arg(long)]
    single_file: bool,

    /// Emit dense forms: every term contributes, no zero-skipping.
    #[arg(long)]
    dense: bool,

    /// Print the parsed certificate human-readably and exit.
    #[arg(long)]
    dump: bool,

    /// Optional JSON report output path.
    #[arg(long)]
    json_report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TimingsReport {
    parse_ms: u64,
    precompute_ms: u64,
    generate_ms: u64,
    total_ms: u64,
}

#[derive(Debug, Serialize)]
struct CertificateReport {
    variables: usize,
    problem_constraints: usize,
    derived_constraints: usize,
    solutions: usize,
    feasible: bool,
    lower_bound_infinite: bool,
    upper_bound_infinite: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    input: String,
    output: String,
    expectation: String,
    verdict: String,
    block_size: usize,
    timings: TimingsReport,
    certificate: CertificateReport,
}

fn parse_expectation(raw: &str) -> Option<bool> {
    match raw {
        "sat" => Some(true),
        "unsat" => Some(false),
        _ => None,
    }
}

/// `Results: <in>|<OK|ERR>|<block_size>|<t_parse>|<t_precompute>|
/// <t_generate>|<t_total>|<n_vars>|<n_prob>|<n_deriv>|<n_sol>|
/// <feasible>|<lb=-inf>|<ub=+inf>`, times in milliseconds.
#[allow(clippy::too_many_arguments)]
fn summary_line(
    input: &str,
    verdict_ok: bool,
    block_size: usize,
    t_parse: Duration,
    t_precompute: Duration,
    t_generate: Duration,
    t_total: Duration,
    cert: &Certificate,
) -> String {
    format!(
        "Results: {}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        input,
        if verdict_ok { "OK" } else { "ERR" },
        block_size,
        t_parse.as_millis(),
        t_precompute.as_millis(),
        t_generate.as_millis(),
        t_total.as_millis(),
        cert.num_variables,
        cert.num_problem_constraints,
        cert.num_derived_constraints,
        cert.solutions.len(),
        u8::from(cert.feasible),
        u8::from(cert.lower_bound.is_negative_infinity()),
        u8::from(cert.upper_bound.is_positive_infinity()),
    )
}

fn main() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(expect_sat) = parse_expectation(&cli.expectation) else {
        miette::bail!(
            "expected satisfiability must be `sat` or `unsat`, got `{}`",
            cli.expectation
        );
    };

    let started = Instant::now();
    let mut cert = parser::parse_file(&cli.input)
        .wrap_err_with(|| format!("while parsing {}", cli.input.display()))?;
    let t_parse = started.elapsed();

    if cli.dump {
        print!("{}", render_certificate(&cert));
        return Ok(ExitCode::SUCCESS);
    }

    let precompute_started = Instant::now();
    cert.precompute()
        .wrap_err("certificate violates a derivation invariant")?;
    let t_precompute = precompute_started.elapsed();

    let block_size = effective_block_size(cli.block_size, cert.num_derived_constraints);
    tracing::info!(
        variables = cert.num_variables,
        problem = cert.num_problem_constraints,
        derived = cert.num_derived_constraints,
        solutions = cert.solutions.len(),
        block_size,
        "certificate loaded"
    );

    let machines = (0..cli.slots.max(1))
        .map(|_| ("localhost".to_string(), 1))
        .collect();
    let dispatcher = Dispatcher::with_machines(cli.runner.clone(), machines);

    let generate_started = Instant::now();
    let options = EmitOptions {
        block_size: cli.block_size,
        dense: cli.dense,
        single_file: cli.single_file,
    };
    generate(&cert, &cli.output, &options, |file| {
        dispatcher.dispatch(file, 0);
    })?;
    let t_generate = generate_started.elapsed();

    let verdict_ok = evaluate(&dispatcher, expect_sat)?;
    // A short-circuited run may still have workers in flight.
    dispatcher.kill_dispatches();

    let t_total = started.elapsed();
    eprintln!(
        "{}",
        summary_line(
            &cli.input.display().to_string(),
            verdict_ok,
            block_size,
            t_parse,
            t_precompute,
            t_generate,
            t_total,
            &cert,
        )
    );

    if let Some(path) = &cli.json_report {
        let report = RunReport {
            input: cli.input.display().to_string(),
            output: cli.output.clone(),
            expectation: cli.expectation.clone(),
            verdict: if verdict_ok { "OK" } else { "ERR" }.to_string(),
            block_size,
            timings: TimingsReport {
                parse_ms: t_parse.as_millis() as u64,
                precompute_ms: t_precompute.as_millis() as u64,
                generate_ms: t_generate.as_millis() as u64,
                total_ms: t_total.as_millis() as u64,
            },
            certificate: CertificateReport {
                variables: cert.num_variables,
                problem_constraints: cert.num_problem_constraints,
                derived_constraints: cert.num_derived_constraints,
                solutions: cert.solutions.len(),
                feasible: cert.feasible,
                lower_bound_infinite: cert.lower_bound.is_negative_infinity(),
                upper_bound_infinite: cert.upper_bound.is_positive_infinity(),
            },
        };
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
        std::fs::write(path, json)
            .into_diagnostic()
            .wrap_err_with(|| format!("while writing report to {}", path.display()))?;
    }

    Ok(if verdict_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn expectation_accepts_exactly_sat_and_unsat() {
        assert_eq!(parse_expectation("sat"), Some(true));
        assert_eq!(parse_expectation("unsat"), Some(false));
        assert_eq!(parse_expectation("SAT"), None);
        assert_eq!(parse_expectation("maybe"), None);
    }

    #[test]
    fn summary_line_has_fourteen_pipe_fields() {
        let mut cert = parser::parse(Cursor::new(
            "VAR 2\nx y\nCON 1 0\nc1 G 0 1 0 1\nRTP range -inf inf\nDER 1\nd1 G 0 1 0 1 { asm } -1\n"
                .to_string(),
        ))
        .unwrap();
        cert.precompute().unwrap();

        let line = summary_line(
            "in.vipr",
            false,
            7,
            Duration::from_millis(12),
            Duration::from_millis(3),
            Duration::from_millis(40),
            Duration::from_millis(60),
            &cert,
        );
        assert_eq!(line, "Results: in.vipr|ERR|7|12|3|40|60|2|1|1|0|1|1|1");
        assert_eq!(line.split('|').count(), 14);
    }
}
