use std::error::Error;
use std::fmt;
use std::fs::File;

use serde::Deserialize;

/// Per-stage trace switches, mirrored from the YAML config.
#[derive(Clone, Deserialize, Debug, Default)]
pub(crate) struct Trace {
    pub(crate) issue: bool,
    pub(crate) retire: bool,
    pub(crate) replay: bool,
    pub(crate) cycle: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub(crate) struct CoreConfig {
    // the number of instructions the issue stage admits per cycle
    pub(crate) issue_width: usize,
    // the number of instructions the retire stage commits per cycle
    pub(crate) retire_width: usize,
    // the capacity of the reorder buffer
    pub(crate) rob_size: usize,
    // the size of the integer register file
    pub(crate) int_regs: u32,
    // the size of the floating-point register file
    pub(crate) fp_regs: u32,
    // start the core in in-order mode
    pub(crate) inorder: bool,
    // track wrong-path (fake) instructions against a shadow register pool
    pub(crate) track_mispath: bool,
    // the number of instructions fetched per cycle
    pub(crate) fetch_width: usize,
    // fetch buckets the pipeline may hold; fetch pauses at the bound
    pub(crate) inst_queue_size: usize,
    // the size of the shared issue window per cluster
    pub(crate) win_size: u32,
    // issue ports per cluster per cycle
    pub(crate) cluster_ports: u32,
    // bounds on in-flight memory/branch operations
    pub(crate) outs_loads: u32,
    pub(crate) outs_stores: u32,
    pub(crate) outs_branches: u32,
    // cache write ports consumed by retiring stores
    pub(crate) cache_ports: u32,
    // write-buffer entries a retiring store may occupy while draining
    pub(crate) cache_space: u32,
    // cycles for a memory access to complete
    pub(crate) mem_latency: u64,
    // cycles between forward-progress checks on the ROB head; 0 disables
    pub(crate) liveness_window: u64,
    pub(crate) trace: Trace,
}

#[derive(Debug)]
pub(crate) enum ConfigError {
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "{}={} outside the supported range {}..={}",
                       field, value, min, max)
            }
        }
    }
}

impl Error for ConfigError {}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

impl CoreConfig {
    /// Bandwidth semantics are undefined outside these bounds, so the core
    /// refuses to start rather than run with them.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_range("issue_width", self.issue_width as u64, 1, 1024)?;
        check_range("retire_width", self.retire_width as u64, 0, 32700)?;
        check_range("rob_size", self.rob_size as u64, 2, 262144)?;
        check_range("int_regs", self.int_regs as u64, 16, 262144)?;
        check_range("fp_regs", self.fp_regs as u64, 16, 262144)?;
        check_range("fetch_width", self.fetch_width as u64, 1, 1024)?;
        check_range("inst_queue_size", self.inst_queue_size as u64, 1, 1024)?;
        Ok(())
    }

    /// min(issue, retire): the sustainable per-cycle throughput, used to
    /// bound stall-cause accounting.
    pub(crate) fn realistic_width(&self) -> usize {
        if self.retire_width < self.issue_width {
            self.retire_width
        } else {
            self.issue_width
        }
    }

    /// A small baseline configuration for tests; individual tests override
    /// the fields they care about with struct-update syntax.
    #[cfg(test)]
    pub(crate) fn small() -> CoreConfig {
        CoreConfig {
            issue_width: 4,
            retire_width: 4,
            rob_size: 32,
            int_regs: 64,
            fp_regs: 64,
            inorder: false,
            track_mispath: false,
            fetch_width: 4,
            inst_queue_size: 4,
            win_size: 32,
            cluster_ports: 8,
            outs_loads: 16,
            outs_stores: 16,
            outs_branches: 16,
            cache_ports: 4,
            cache_space: 16,
            mem_latency: 2,
            liveness_window: 0,
            trace: Trace::default(),
        }
    }
}

pub(crate) fn load_core_config(file_path: &str) -> Result<CoreConfig, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let config: CoreConfig = serde_yaml::from_reader(file)?;
    config.validate()?;
    Ok(config)
}
