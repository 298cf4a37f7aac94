use log::debug;
use std::path::PathBuf;
use std::process::Command;
use crate::error::PollError;
use crate::metrics::{aggregate, ComputeApp, GpuMap, GpuUuid, Pid};

const COMPUTE_APPS_ARGS: [&str; 2] = [
    "--query-compute-apps=gpu_uuid,pid,process_name,used_memory",
    "--format=csv,noheader,nounits",
];

const GPU_UUID_ARGS: [&str; 2] = ["--query-gpu=uuid", "--format=csv,noheader"];

/// Runs one `nvidia-smi` query and returns its stdout.
pub trait SmiRunner {
    fn query(&self, args: &[&str]) -> Result<String, PollError>;
}

pub struct NvidiaSmi {
    program: PathBuf,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl SmiRunner for NvidiaSmi {
    fn query(&self, args: &[&str]) -> Result<String, PollError> {
        let program = self.program.display().to_string();
        debug!("running {} {}", program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| PollError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let combined = combined.trim();
            let output = if combined.is_empty() {
                format!("exited with {}", output.status)
            } else {
                combined.to_string()
            };
            return Err(PollError::CommandFailed { output });
        }

        String::from_utf8(output.stdout).map_err(|_| PollError::InvalidOutput { program })
    }
}

/// Lists compute apps and devices, then aggregates per device.
pub fn poll<R, F>(runner: &R, mut age_of: F) -> Result<GpuMap, PollError>
where
    R: SmiRunner,
    F: FnMut(Option<Pid>) -> u64,
{
    let apps = parse_compute_apps(&runner.query(&COMPUTE_APPS_ARGS)?)?;
    debug!("{} compute processes listed", apps.len());

    // Enumerate devices even when apps exist so idle GPUs still get a record.
    let devices = parse_gpu_uuids(&runner.query(&GPU_UUID_ARGS)?);
    debug!("{} devices listed", devices.len());

    Ok(aggregate(devices, &apps, |app| age_of(app.pid)))
}

/// Parses `gpu_uuid, pid, process_name, used_memory` rows. The name may itself contain commas.
pub fn parse_compute_apps(text: &str) -> Result<Vec<ComputeApp>, PollError> {
    let mut apps = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 4 {
            return Err(PollError::MalformedLine {
                line: line.to_string(),
                found: fields.len(),
            });
        }

        let last = fields.len() - 1;
        apps.push(ComputeApp {
            gpu_uuid: fields[0].trim().to_string(),
            pid: fields[1].trim().parse().ok(),
            process_name: fields[2..last].join(",").trim().to_string(),
            used_memory_mib: fields[last].trim().parse().ok(),
        });
    }

    Ok(apps)
}

pub fn parse_gpu_uuids(text: &str) -> Vec<GpuUuid> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
