use clap::ValueEnum;

/// Where device and process listings come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Shell out to `nvidia-smi`
    Smi,
    /// Query the NVIDIA Management Library directly
    Nvml,
}

/// How the age of a process is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AgeSource {
    /// Change time of `/proc/<pid>`
    Proc,
    /// Start time from the sysinfo process table
    StartTime,
}
