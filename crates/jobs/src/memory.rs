//! Memory utilisation of a process tree.

use std::collections::HashMap;

use sysinfo::{Pid, System};

/// One memory sample of a process tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    /// `(pid, resident bytes)` of the root process and every live descendant.
    pub processes: Vec<(u32, u64)>,
}

impl MemoryInfo {
    pub fn used_bytes(&self) -> u64 {
        self.processes.iter().map(|(_, rss)| rss).sum()
    }

    /// Resident memory of the tree as a fraction of total system memory.
    pub fn utilization(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64
    }
}

pub trait MemoryProbe: Send + Sync {
    /// Take a fresh sample; implementations must not cache.
    fn sample(&self, root_pid: u32) -> MemoryInfo;
}

/// Probe backed by `sysinfo`.
#[derive(Debug, Default)]
pub struct SysinfoProbe;

impl MemoryProbe for SysinfoProbe {
    fn sample(&self, root_pid: u32) -> MemoryInfo {
        let sys = System::new_all();

        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for (pid, process) in sys.processes() {
            // Threads are listed as tasks of their process on Linux.
            if process.thread_kind().is_some() {
                continue;
            }
            if let Some(parent) = process.parent() {
                children.entry(parent).or_default().push(*pid);
            }
        }

        let mut processes = Vec::new();
        let mut pending = vec![Pid::from_u32(root_pid)];
        while let Some(pid) = pending.pop() {
            if let Some(process) = sys.process(pid) {
                processes.push((pid.as_u32(), process.memory()));
            }
            if let Some(kids) = children.get(&pid) {
                pending.extend(kids.iter().copied());
            }
        }

        MemoryInfo {
            total_bytes: sys.total_memory(),
            processes,
        }
    }
}
