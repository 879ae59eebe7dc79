use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FormulaError {
    #[error("cannot write formula file {path}: {source}")]
    #[diagnostic(code(vipr2smt::formula::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FormulaError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        FormulaError::Io {
            path: path.to_string(),
            source,
        }
    }
}
