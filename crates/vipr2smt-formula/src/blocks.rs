//! Block partitioning and the file-level emission driver.
//!
//! Derived constraints are split into contiguous blocks of `block_size`
//! per output file; the SOL section and the terminal solution check get
//! files of their own. Every file is self-contained (header, assertions,
//! footer) and handed to the dispatch callback the moment it is closed,
//! so solving overlaps with generation. In single-file mode everything
//! lands in one file that is dispatched once at the end.

use std::fs::File;
use std::io::{BufWriter, Write};

use vipr2smt_cert::Certificate;

use crate::errors::FormulaError;
use crate::writer::FormulaWriter;

/// Derived-constraint count a block size is defaulted against.
const DEFAULT_BLOCK_DIVISOR: usize = 384;

#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Derived constraints per output file; 0 selects the default.
    pub block_size: usize,
    /// Emit dense forms (no zero-skipping, no padding in the skipping
    /// emitters).
    pub dense: bool,
    /// Write one output file sequentially instead of per-block files.
    pub single_file: bool,
}

/// `block_size` with the default rule applied: unset means
/// `max(1, derived / 384)`.
pub fn effective_block_size(requested: usize, num_derived: usize) -> usize {
    if requested == 0 {
        (num_derived / DEFAULT_BLOCK_DIVISOR).max(1)
    } else {
        requested
    }
}

/// Name of a derived-constraint block file. `start` and `end` are
/// 1-based positions within the derived range, inclusive.
pub fn der_block_filename(base: &str, start: usize, end: usize) -> String {
    format!("{base}.DER-{start}-{end}")
}

pub fn sol_filename(base: &str) -> String {
    format!("{base}.SOL")
}

pub fn solcheck_filename(base: &str) -> String {
    format!("{base}.DER-solcheck")
}

fn write_file<F>(
    cert: &Certificate,
    path: &str,
    dense: bool,
    body: F,
) -> Result<(), FormulaError>
where
    F: FnOnce(&mut FormulaWriter<'_, BufWriter<File>>) -> std::io::Result<()>,
{
    let file = File::create(path).map_err(|e| FormulaError::io(path, e))?;
    let mut writer = FormulaWriter::new(cert, BufWriter::new(file)).dense(dense);
    let emit = || -> std::io::Result<()> {
        writer.header()?;
        body(&mut writer)?;
        writer.footer()
    };
    emit().map_err(|e| FormulaError::io(path, e))?;
    writer
        .into_inner()
        .flush()
        .map_err(|e| FormulaError::io(path, e))
}

/// Inclusive global index range of one block.
fn block_range(cert: &Certificate, block_size: usize, block: usize) -> (usize, usize) {
    let start = cert.num_problem_constraints + block * block_size;
    let end = (start + block_size).min(cert.num_total_constraints) - 1;
    (start, end)
}

/// Generate all formula files for `cert` and hand each finished file to
/// `dispatch`. The certificate must have been through
/// [`Certificate::precompute`].
pub fn generate<F>(
    cert: &Certificate,
    base: &str,
    options: &EmitOptions,
    dispatch: F,
) -> Result<(), FormulaError>
where
    F: Fn(String) + Sync,
{
    if options.single_file {
        return generate_single_file(cert, base, options, dispatch);
    }

    let block_size = effective_block_size(options.block_size, cert.num_derived_constraints);
    let num_blocks = cert.num_derived_constraints.div_ceil(block_size);
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(num_blocks)
        .max(1);

    tracing::info!(
        workers,
        block_size,
        blocks = num_blocks,
        "generating DER blocks"
    );

    let dispatch = &dispatch;
    let mut failures: Vec<FormulaError> = Vec::new();

    std::thread::scope(|scope| {
        let mut handles = Vec::new();

        handles.push(scope.spawn(move || -> Result<(), FormulaError> {
            let path = sol_filename(base);
            write_file(cert, &path, options.dense, |w| w.sol_block())?;
            dispatch(path);
            Ok(())
        }));

        for worker in 0..workers {
            handles.push(scope.spawn(move || -> Result<(), FormulaError> {
                let mut block = worker;
                while block < num_blocks {
                    let (start, end) = block_range(cert, block_size, block);
                    let offset = cert.num_problem_constraints;
                    let path = der_block_filename(base, start - offset + 1, end - offset + 1);
                    write_file(cert, &path, options.dense, |w| {
                        for global_index in start..=end {
                            w.derivation_assertion(global_index)?;
                        }
                        Ok(())
                    })?;
                    dispatch(path);
                    block += workers;
                }
                Ok(())
            }));
        }

        handles.push(scope.spawn(move || -> Result<(), FormulaError> {
            let path = solcheck_filename(base);
            write_file(cert, &path, options.dense, |w| w.solution_check_block())?;
            dispatch(path);
            Ok(())
        }));

        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(error)) => failures.push(error),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });

    match failures.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn generate_single_file<F>(
    cert: &Certificate,
    base: &str,
    options: &EmitOptions,
    dispatch: F,
) -> Result<(), FormulaError>
where
    F: Fn(String),
{
    write_file(cert, base, options.dense, |w| {
        w.sol_block()?;
        for global_index in cert.num_problem_constraints..cert.num_total_constraints {
            w.derivation_assertion(global_index)?;
        }
        w.solution_check_block()
    })?;
    dispatch(base.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_block_size_follows_the_default_rule() {
        assert_eq!(effective_block_size(0, 0), 1);
        assert_eq!(effective_block_size(0, 383), 1);
        assert_eq!(effective_block_size(0, 384), 1);
        assert_eq!(effective_block_size(0, 768), 2);
        assert_eq!(effective_block_size(0, 10_000), 26);
    }

    #[test]
    fn explicit_block_size_wins() {
        assert_eq!(effective_block_size(3, 10_000), 3);
        assert_eq!(effective_block_size(1, 0), 1);
    }

    #[test]
    fn filenames_follow_the_suffix_scheme() {
        assert_eq!(der_block_filename("out", 1, 3), "out.DER-1-3");
        assert_eq!(der_block_filename("out", 10, 10), "out.DER-10-10");
        assert_eq!(sol_filename("out"), "out.SOL");
        assert_eq!(solcheck_filename("out"), "out.DER-solcheck");
    }
}
