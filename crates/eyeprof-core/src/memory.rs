//! Process memory readers and memory ceiling parsing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current process memory usage, in bytes.
pub trait MemoryReader: Send + Sync {
    fn current_usage(&self) -> u64;
}

/// Reads resident set size (`VmRSS`) from a `/proc/<pid>/status` file.
///
/// Returns 0 when the file is missing or unparsable (e.g. non-Linux hosts).
#[derive(Debug, Clone)]
pub struct ProcStatusReader {
    path: PathBuf,
}

impl ProcStatusReader {
    /// Reader for the current process (`/proc/self/status`).
    pub fn new() -> Self {
        Self::with_path("/proc/self/status")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcStatusReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReader for ProcStatusReader {
    fn current_usage(&self) -> u64 {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| parse_vm_rss(&content))
            .unwrap_or(0)
    }
}

/// Extracts `VmRSS` from `/proc/<pid>/status` content, converted to bytes.
pub fn parse_vm_rss(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() != "VmRSS" {
            return None;
        }
        let kb: u64 = value.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

/// Memory reader returning a settable fixed value.
#[derive(Debug, Default)]
pub struct FixedMemoryReader(AtomicU64);

impl FixedMemoryReader {
    pub fn new(bytes: u64) -> Self {
        Self(AtomicU64::new(bytes))
    }

    pub fn set(&self, bytes: u64) {
        self.0.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryReader for FixedMemoryReader {
    fn current_usage(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Parses a memory ceiling given as an integer count of megabytes into bytes.
///
/// Only the leading (optionally signed) integer is read, so `"128M"` and
/// `"128"` both mean 128 MB. Text without a leading integer yields 0 and
/// `"-1"` (unlimited) yields a negative ceiling.
pub fn parse_memory_limit(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut megabytes: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        megabytes = megabytes
            .saturating_mul(10)
            .saturating_add(i64::from(b - b'0'));
    }
    if negative {
        megabytes = -megabytes;
    }
    megabytes.saturating_mul(1024 * 1024)
}
