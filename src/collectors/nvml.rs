use log::debug;
use nvml_wrapper::Nvml;
use nvml_wrapper::enums::device::UsedGpuMemory;
use crate::error::PollError;
use crate::metrics::{aggregate, ComputeApp, GpuMap, GpuUuid, Pid};

/// Same report as the `nvidia-smi` path, read straight from NVML.
pub fn poll<F>(nvml: &Nvml, mut age_of: F) -> Result<GpuMap, PollError>
where
    F: FnMut(Option<Pid>) -> u64,
{
    let device_count = nvml.device_count()?;
    debug!("NVML reports {} devices", device_count);

    let mut devices: Vec<GpuUuid> = Vec::new();
    let mut apps: Vec<ComputeApp> = Vec::new();

    for index in 0..device_count {
        let device = nvml.device_by_index(index)?;
        let uuid = device.uuid()?;

        for process in device.running_compute_processes()? {
            apps.push(ComputeApp {
                gpu_uuid: uuid.clone(),
                pid: Some(process.pid),
                process_name: nvml.sys_process_name(process.pid, 64).unwrap_or_default(),
                used_memory_mib: match process.used_gpu_memory {
                    UsedGpuMemory::Used(bytes) => Some(bytes / (1024 * 1024)),
                    UsedGpuMemory::Unavailable => None,
                },
            });
        }

        devices.push(uuid);
    }

    Ok(aggregate(devices, &apps, |app| age_of(app.pid)))
}
