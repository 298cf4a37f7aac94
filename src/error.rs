use nvml_wrapper::error::NvmlError;
use std::io;
use thiserror::Error;

/// Everything that can stop a poll. The `Display` text ends up in the report's `error` field.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Nvidia-smi error: {output}")]
    CommandFailed { output: String },

    #[error("{program} produced non UTF-8 output")]
    InvalidOutput { program: String },

    #[error("malformed compute-apps line {line:?}: expected at least 4 fields, found {found}")]
    MalformedLine { line: String, found: usize },

    #[error("NVML error: {0}")]
    Nvml(#[from] NvmlError),
}
