use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use crate::error::PollError;

pub type Pid = u32;
pub type GpuUuid = String;

/// Per-device aggregate keyed by UUID in [`Report::gpus`].
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GpuRecord {
    pub proc_count: u64,
    pub max_age: u64,
}

impl GpuRecord {
    pub fn observe(&mut self, age: u64) {
        self.proc_count += 1;
        self.max_age = self.max_age.max(age);
    }
}

pub type GpuMap = BTreeMap<GpuUuid, GpuRecord>;

/// The document printed on stdout.
#[derive(Serialize, Debug, PartialEq)]
pub struct Report {
    pub error: Option<String>,
    pub gpus: GpuMap,
}

impl Report {
    pub fn from_poll(result: Result<GpuMap, PollError>) -> Self {
        match result {
            Ok(gpus) => Report { error: None, gpus },
            Err(e) => Report {
                error: Some(e.to_string()),
                gpus: GpuMap::new(),
            },
        }
    }
}

/// One row of `nvidia-smi --query-compute-apps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeApp {
    pub gpu_uuid: GpuUuid,
    pub pid: Option<Pid>,
    pub process_name: String,
    pub used_memory_mib: Option<u64>,
}

/// Seeds every known device with a zero record, then folds each app into its device.
pub fn aggregate<I, F>(devices: I, apps: &[ComputeApp], mut age_of: F) -> GpuMap
where
    I: IntoIterator<Item = GpuUuid>,
    F: FnMut(&ComputeApp) -> u64,
{
    let mut gpus: GpuMap = devices
        .into_iter()
        .map(|uuid| (uuid, GpuRecord::default()))
        .collect();

    for app in apps {
        let age = age_of(app);
        debug!(
            "{} pid {:?} `{}` using {:?} MiB, age {}s",
            app.gpu_uuid, app.pid, app.process_name, app.used_memory_mib, age
        );
        gpus.entry(app.gpu_uuid.clone()).or_default().observe(age);
    }

    gpus
}
