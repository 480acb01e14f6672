//! Memory readers backed by the process allocator.

use std::sync::Arc;

use eyeprof_core::memory::{MemoryReader, ProcStatusReader};

/// Bytes currently allocated through jemalloc (`stats.allocated`).
#[cfg(not(target_env = "msvc"))]
pub(crate) struct JemallocReader;

#[cfg(not(target_env = "msvc"))]
impl MemoryReader for JemallocReader {
    fn current_usage(&self) -> u64 {
        use std::ffi::c_void;
        use std::ptr;

        // Statistics are cached by jemalloc until the epoch is advanced.
        let mut epoch: u64 = 1;
        let mut epoch_len = size_of::<u64>();
        let mut allocated: usize = 0;
        let mut allocated_len = size_of::<usize>();
        // SAFETY: both mallctl names are valid and the out-pointers match the
        // documented value types (u64 for epoch, size_t for stats.allocated).
        let rc = unsafe {
            tikv_jemalloc_sys::mallctl(
                c"epoch".as_ptr().cast(),
                (&mut epoch as *mut u64).cast::<c_void>(),
                &mut epoch_len,
                (&mut epoch as *mut u64).cast::<c_void>(),
                size_of::<u64>(),
            );
            tikv_jemalloc_sys::mallctl(
                c"stats.allocated".as_ptr().cast(),
                (&mut allocated as *mut usize).cast::<c_void>(),
                &mut allocated_len,
                ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return 0;
        }
        allocated as u64
    }
}

/// The allocator-backed reader where available, `/proc/self/status` otherwise.
pub(crate) fn default_reader() -> Arc<dyn MemoryReader> {
    #[cfg(not(target_env = "msvc"))]
    {
        Arc::new(JemallocReader)
    }
    #[cfg(target_env = "msvc")]
    {
        Arc::new(ProcStatusReader::new())
    }
}

/// Reader selected by name: `jemalloc` or `rss`.
pub(crate) fn reader_by_name(name: &str) -> Option<Arc<dyn MemoryReader>> {
    match name {
        "jemalloc" => Some(default_reader()),
        "rss" => Some(Arc::new(ProcStatusReader::new())),
        _ => None,
    }
}
