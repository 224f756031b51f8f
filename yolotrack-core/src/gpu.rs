//! Accelerator inventory, captured once per training run.

use crate::error::GpuError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

const BYTES_PER_MIB: u64 = 1024 * 1024;
const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    pub memory_bytes: u64,
}

impl GpuDevice {
    /// Total memory in GiB with two decimals, e.g. `8.00`.
    pub fn memory_gb(&self) -> String {
        format!("{:.2}", self.memory_bytes as f64 / BYTES_PER_GIB)
    }
}

/// Ordered snapshot of the visible accelerators. Empty when none are
/// available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInventory {
    pub devices: Vec<GpuDevice>,
}

impl GpuInventory {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.devices.len()
    }

    /// Run parameters describing the inventory: `gpu_count`, then
    /// `gpu_{i}_name` and `gpu_{i}_memory_gb` per device.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("gpu_count".to_string(), self.count().to_string())];
        for (i, device) in self.devices.iter().enumerate() {
            params.push((format!("gpu_{i}_name"), device.name.clone()));
            params.push((format!("gpu_{i}_memory_gb"), device.memory_gb()));
        }
        params
    }
}

#[async_trait]
pub trait GpuProbe: Send + Sync {
    async fn inventory(&self) -> Result<GpuInventory, GpuError>;
}

/// Queries NVIDIA devices through `nvidia-smi`.
///
/// A missing binary or a failing query means no usable accelerator and
/// yields an empty inventory. Output that cannot be parsed is an error.
pub struct NvidiaSmiProbe {
    program: PathBuf,
}

impl NvidiaSmiProbe {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("nvidia-smi"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GpuProbe for NvidiaSmiProbe {
    async fn inventory(&self) -> Result<GpuInventory, GpuError> {
        let output = Command::new(&self.program)
            .args([
                "--query-gpu=index,name,memory.total",
                "--format=csv,noheader,nounits",
            ])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "nvidia-smi unavailable, assuming no accelerators");
                return Ok(GpuInventory::none());
            }
        };
        if !output.status.success() {
            debug!(status = %output.status, "nvidia-smi query failed, assuming no accelerators");
            return Ok(GpuInventory::none());
        }

        parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse `index, name, memory.total [MiB]` CSV rows.
pub fn parse_nvidia_smi(output: &str) -> Result<GpuInventory, GpuError> {
    let mut devices = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parse_err = |message: &str| GpuError::Parse {
            line: line.to_string(),
            message: message.to_string(),
        };

        // Device names may contain commas; index is first and memory last.
        let (index, rest) = line
            .split_once(',')
            .ok_or_else(|| parse_err("expected 3 columns"))?;
        let (name, memory) = rest
            .rsplit_once(',')
            .ok_or_else(|| parse_err("expected 3 columns"))?;

        let index = index
            .trim()
            .parse::<u32>()
            .map_err(|_| parse_err("index is not an integer"))?;
        let memory_mib = memory
            .trim()
            .parse::<u64>()
            .map_err(|_| parse_err("memory is not an integer"))?;

        devices.push(GpuDevice {
            index,
            name: name.trim().to_string(),
            memory_bytes: memory_mib * BYTES_PER_MIB,
        });
    }
    devices.sort_by_key(|d| d.index);
    Ok(GpuInventory { devices })
}
