//! Ephemeral scratch directories for downloaded snapshots.
//!
//! Downloads land in process-scoped directories under the OS temp root so
//! concurrent runs never share state. Directories left behind by crashed
//! runs are reclaimed conservatively at startup.

pub mod allocator;
pub mod liveness;

pub use allocator::{
    directory_info, parse_scratch_name, CacheAllocator, CacheHandle, CacheInfo, ReclaimReport,
    ScratchEntry, DEFAULT_PREFIX,
};
pub use liveness::{platform_probe, Liveness, ProcessProbe};

/// Format a byte count for display (e.g. `1.5 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
