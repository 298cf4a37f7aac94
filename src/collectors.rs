pub mod age;
pub mod nvml;
pub mod smi;

use log::{debug, warn};
use nvml_wrapper::Nvml;
use std::path::Path;
use crate::backend::{AgeSource, Backend};
use crate::collectors::age::AgeProbe;
use crate::collectors::smi::NvidiaSmi;
use crate::error::PollError;
use crate::metrics::{GpuMap, Report};


/// Runs one poll with the chosen backend. Never fails: errors land in `Report::error`.
pub fn take_report(backend: Backend, age_source: AgeSource, nvidia_smi: &Path) -> Report {
    let result = poll(backend, age_source, nvidia_smi);

    match &result {
        Ok(gpus) => debug!("poll finished with {} devices", gpus.len()),
        Err(e) => warn!("poll failed: {}", e),
    }

    Report::from_poll(result)
}

fn poll(backend: Backend, age_source: AgeSource, nvidia_smi: &Path) -> Result<GpuMap, PollError> {
    let mut ages = AgeProbe::new(age_source);

    match backend {
        Backend::Smi => smi::poll(&NvidiaSmi::new(nvidia_smi), |pid| ages.age_of(pid)),
        Backend::Nvml => {
            let nvml = Nvml::init()?;
            nvml::poll(&nvml, |pid| ages.age_of(pid))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_reported_in_band() {
        let report = take_report(
            Backend::Smi,
            AgeSource::Proc,
            Path::new("/nonexistent/nvidia-smi"),
        );
        assert!(report.gpus.is_empty());
        let error = report.error.unwrap();
        assert!(error.starts_with("failed to run /nonexistent/nvidia-smi"));
    }
}
