use sa_analysis::AnalysisError;
use sa_model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse model file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),

    #[error("Analysis failed (code {code}): {source}", code = .source.code())]
    Analysis {
        #[from]
        source: AnalysisError,
    },

    #[error("Failed to write results: {0}")]
    Output(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
