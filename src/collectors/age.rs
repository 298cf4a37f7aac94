use log::debug;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use crate::backend::AgeSource;
use crate::metrics::Pid;

/// Looks up how long a process has been alive. Failures count as age 0.
pub enum AgeProbe {
    Proc,
    StartTime(System),
}

impl AgeProbe {
    pub fn new(source: AgeSource) -> Self {
        match source {
            AgeSource::Proc => AgeProbe::Proc,
            AgeSource::StartTime => AgeProbe::StartTime(System::new()),
        }
    }

    pub fn age_of(&mut self, pid: Option<Pid>) -> u64 {
        let Some(pid) = pid else {
            debug!("no usable pid, age defaults to 0");
            return 0;
        };

        let created = match self {
            AgeProbe::Proc => proc_ctime(pid),
            AgeProbe::StartTime(system) => sysinfo_start_time(system, pid),
        };

        match created {
            Some(created) => seconds_between(created, SystemTime::now()),
            None => {
                debug!("could not read creation time of pid {pid}, age defaults to 0");
                0
            }
        }
    }
}

fn proc_ctime(pid: Pid) -> Option<SystemTime> {
    let metadata = fs::metadata(format!("/proc/{pid}")).ok()?;
    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    Some(UNIX_EPOCH + Duration::new(secs, nanos))
}

fn sysinfo_start_time(system: &mut System, pid: Pid) -> Option<SystemTime> {
    let pid = sysinfo::Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        false,
        ProcessRefreshKind::nothing(),
    );
    let start = system.process(pid)?.start_time();
    Some(UNIX_EPOCH + Duration::from_secs(start))
}

/// Whole seconds from `created` to `now`, 0 if `created` lies in the future.
fn seconds_between(created: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(created).map(|d| d.as_secs()).unwrap_or(0)
}
