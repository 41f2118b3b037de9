//! Synthetic load generators
//!
//! Each generator runs synchronously to completion; callers put it on a
//! blocking worker. Results of the arithmetic are discarded through
//! `black_box` so the optimizer cannot drop the work.

use std::fs::{self, File, OpenOptions};
use std::hint::black_box;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::{BenchmarkError, BenchmarkKind};

pub const MEGABYTE: usize = 1024 * 1024;

/// Sizes of each load generator
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadProfile {
    /// sqrt * sin * cos iterations
    pub cpu_iterations: u64,
    /// Buffers allocated and then released
    pub ram_buffers: usize,
    /// Buffers written to the scratch file
    pub disk_write_buffers: usize,
    /// Read calls issued against the one-buffer scratch file
    pub disk_read_calls: usize,
    /// sin * cos iterations
    pub gpu_iterations: u64,
    pub buffer_size: usize,
    /// Where disk scratch files are created
    pub scratch_dir: PathBuf,
}

impl Default for WorkloadProfile {
    fn default() -> Self {
        Self {
            cpu_iterations: 150_000_000,
            ram_buffers: 1_500,
            disk_write_buffers: 2_800,
            disk_read_calls: 200_000,
            gpu_iterations: 150_000_000,
            buffer_size: MEGABYTE,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl WorkloadProfile {
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Execute the load generator for `kind`
    pub fn run(&self, kind: BenchmarkKind) -> Result<(), BenchmarkError> {
        match kind {
            BenchmarkKind::Cpu => {
                cpu_load(self.cpu_iterations);
                Ok(())
            }
            BenchmarkKind::Ram => ram_load(self.ram_buffers, self.buffer_size),
            BenchmarkKind::DiskWrite => {
                disk_write_load(&self.scratch_dir, self.disk_write_buffers, self.buffer_size)
            }
            BenchmarkKind::DiskRead => {
                disk_read_load(&self.scratch_dir, self.disk_read_calls, self.buffer_size)
            }
            BenchmarkKind::Gpu => {
                gpu_proxy_load(self.gpu_iterations);
                Ok(())
            }
        }
    }
}

fn cpu_load(iterations: u64) {
    let mut result = 0.0f64;
    for i in 0..iterations {
        let x = i as f64;
        result += x.sqrt() * x.sin() * x.cos();
    }
    black_box(result);
}

fn gpu_proxy_load(iterations: u64) {
    for i in 0..iterations {
        let x = (i as f64).sin();
        let y = (i as f64).cos();
        black_box(x * y);
    }
}

/// Allocate `buffers` zeroed buffers one after another, then free them all
fn ram_load(buffers: usize, buffer_size: usize) -> Result<(), BenchmarkError> {
    let mut data: Vec<Vec<u8>> = Vec::new();
    data.try_reserve_exact(buffers).map_err(|err| {
        BenchmarkError::ResourceExhaustion(format!("buffer table for {} entries: {}", buffers, err))
    })?;

    for _ in 0..buffers {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(buffer_size).map_err(|err| {
            BenchmarkError::ResourceExhaustion(format!(
                "allocation of {} bytes failed after {} buffers: {}",
                buffer_size,
                data.len(),
                err
            ))
        })?;
        buffer.resize(buffer_size, 0);
        data.push(black_box(buffer));
    }

    data.clear();
    Ok(())
}

/// Scratch file removed on drop, including on error paths
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(dir: &Path, label: &str) -> Self {
        Self {
            path: dir.join(format!("heartpc-{}-{}.tmp", label, uuid::Uuid::new_v4())),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn disk_write_load(dir: &Path, buffers: usize, buffer_size: usize) -> Result<(), BenchmarkError> {
    let scratch = ScratchFile::new(dir, "disk-write");
    let data = vec![0u8; buffer_size];

    let mut file = File::create(&scratch.path)?;
    for _ in 0..buffers {
        file.write_all(&data)?;
    }
    file.flush()?;
    Ok(())
}

/// Write one buffer, then issue `reads` sequential reads on the same handle
///
/// Only the first read returns data; the rest hit end of file and exercise
/// the read-call path against the cached file.
fn disk_read_load(dir: &Path, reads: usize, buffer_size: usize) -> Result<(), BenchmarkError> {
    let scratch = ScratchFile::new(dir, "disk-read");

    {
        let mut file = File::create(&scratch.path)?;
        file.write_all(&vec![0u8; buffer_size])?;
    }

    let mut file = OpenOptions::new().read(true).open(&scratch.path)?;
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0usize;
    for _ in 0..reads {
        total += file.read(&mut buffer)?;
    }
    black_box(total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tiny(dir: &Path) -> WorkloadProfile {
        WorkloadProfile {
            cpu_iterations: 1_000,
            ram_buffers: 8,
            disk_write_buffers: 4,
            disk_read_calls: 16,
            gpu_iterations: 1_000,
            buffer_size: 4096,
            scratch_dir: dir.to_path_buf(),
        }
    }

    fn leftover_files(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn default_profile_matches_fixed_workload_sizes() {
        let profile = WorkloadProfile::default();
        assert_eq!(profile.cpu_iterations, 150_000_000);
        assert_eq!(profile.ram_buffers, 1_500);
        assert_eq!(profile.disk_write_buffers, 2_800);
        assert_eq!(profile.disk_read_calls, 200_000);
        assert_eq!(profile.gpu_iterations, 150_000_000);
        assert_eq!(profile.buffer_size, MEGABYTE);
    }

    #[test]
    fn every_kind_runs_and_cleans_up_scratch_files() {
        let dir = TempDir::new().unwrap();
        let profile = tiny(dir.path());

        for kind in BenchmarkKind::ALL {
            profile.run(kind).unwrap();
        }

        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn disk_write_fails_cleanly_on_missing_directory() {
        let dir = TempDir::new().unwrap();
        let profile = tiny(&dir.path().join("does-not-exist"));

        let err = profile.run(BenchmarkKind::DiskWrite).unwrap_err();
        assert!(matches!(err, BenchmarkError::Io(_)));
    }

    #[test]
    fn impossible_allocation_reports_exhaustion() {
        let err = ram_load(1, usize::MAX).unwrap_err();
        assert!(matches!(err, BenchmarkError::ResourceExhaustion(_)));
        assert!(err.to_string().starts_with("Out of memory. "));
    }
}
