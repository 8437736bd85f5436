use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sysinfo::{Components, Disks, Networks, ProcessesToUpdate, System};
use tracing::{debug, instrument, trace};

use super::{MetricsProvider, NetworkTotals, ProviderError};

/// [`MetricsProvider`] backed by `sysinfo`
///
/// CPU usage is computed by sysinfo as the delta since the previous refresh,
/// so with a fixed collection interval each reading is the average over the
/// last interval.
pub struct SysinfoProvider {
    system: Mutex<System>,
    disk_mount: PathBuf,
}

impl SysinfoProvider {
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        let mut system = System::new();

        // prime the CPU counters so the first reading is meaningful
        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();

        let disk_mount = disk_mount.into();
        debug!("sysinfo provider ready (disk mount: {})", disk_mount.display());

        Self {
            system: Mutex::new(system),
            disk_mount,
        }
    }

    fn system(&self) -> Result<MutexGuard<'_, System>, ProviderError> {
        self.system
            .lock()
            .map_err(|_| ProviderError::ReadFailed("system state lock poisoned".to_string()))
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64) * 100.0
}

/// The disk whose mount point is the longest prefix of `target`.
fn usage_for_mount(disks: &Disks, target: &Path) -> Option<(u64, u64)> {
    disks
        .list()
        .iter()
        .filter(|disk| target.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| {
            let total = disk.total_space();
            (total.saturating_sub(disk.available_space()), total)
        })
}

impl MetricsProvider for SysinfoProvider {
    #[instrument(skip_all)]
    fn cpu_percent(&self) -> Result<f64, ProviderError> {
        let mut system = self.system()?;
        system.refresh_cpu_usage();
        let usage = system.global_cpu_usage() as f64;
        trace!("cpu usage: {usage:.1}%");
        Ok(usage)
    }

    fn memory_percent(&self) -> Result<f64, ProviderError> {
        let mut system = self.system()?;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(ProviderError::Unavailable("total memory reported as 0".to_string()));
        }
        Ok(percent(system.used_memory(), total))
    }

    fn disk_percent(&self) -> Result<f64, ProviderError> {
        let disks = Disks::new_with_refreshed_list();

        let (used, total) = usage_for_mount(&disks, &self.disk_mount).ok_or_else(|| {
            ProviderError::Unavailable(format!("no disk mounted at {}", self.disk_mount.display()))
        })?;
        Ok(percent(used, total))
    }

    fn network_totals(&self) -> Result<NetworkTotals, ProviderError> {
        let networks = Networks::new_with_refreshed_list();

        Ok(networks
            .list()
            .values()
            .fold(NetworkTotals::default(), |acc, data| NetworkTotals {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
            }))
    }

    fn process_count(&self) -> Result<u64, ProviderError> {
        let mut system = self.system()?;
        system.refresh_processes(ProcessesToUpdate::All, true);
        Ok(system.processes().len() as u64)
    }

    fn temperature(&self) -> Result<Option<f64>, ProviderError> {
        let components = Components::new_with_refreshed_list();

        // first sensor that reports a value
        Ok(components
            .iter()
            .find_map(|component| component.temperature())
            .map(f64::from))
    }
}
