//! Disk-space guard (spec §4.6): refuse writes when headroom is too thin.

use std::path::Path;

use sysinfo::Disks;

/// Minimum headroom the guard always enforces, regardless of payload size.
pub const MIN_FREE_BYTES: u64 = 10 * 1024 * 1024; // 10 MiB

/// Returns the bytes available on the filesystem backing `path`, or `None`
/// if no matching mount point could be found (e.g. unusual mounts).
pub fn available_bytes(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    let path = path.canonicalize().ok()?;

    let mut best: Option<(&Path, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let depth = mount.components().count();
            match best {
                Some((cur, _)) if cur.components().count() >= depth => {}
                _ => best = Some((mount, disk.available_space())),
            }
        }
    }
    best.map(|(_, avail)| avail)
}

/// The threshold a write of `payload_bytes` must clear: `max(10 MiB, 2 *
/// payload_bytes)`.
pub fn required_bytes(payload_bytes: u64) -> u64 {
    MIN_FREE_BYTES.max(payload_bytes.saturating_mul(2))
}

/// `true` if the guard should refuse a write of `payload_bytes` to the
/// filesystem backing `path`. Unknown free space is treated as sufficient
/// (best effort, with the caller expected to log a warning).
pub fn insufficient_for(path: &Path, payload_bytes: u64) -> Option<(u64, u64)> {
    let needed = required_bytes(payload_bytes);
    match available_bytes(path) {
        Some(avail) if avail < needed => Some((needed, avail)),
        _ => None,
    }
}

/// `true` if the filesystem backing `path` is at or above 90% utilization.
/// Non-blocking — used only to surface an operator warning.
pub fn is_nearly_full(path: &Path) -> bool {
    let disks = Disks::new_with_refreshed_list();
    let Ok(path) = path.canonicalize() else {
        return false;
    };

    for disk in disks.list() {
        if path.starts_with(disk.mount_point()) {
            let total = disk.total_space();
            if total == 0 {
                return false;
            }
            let used = total.saturating_sub(disk.available_space());
            return (used as f64 / total as f64) >= 0.90;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_bytes_enforces_floor() {
        assert_eq!(required_bytes(0), MIN_FREE_BYTES);
        assert_eq!(required_bytes(1), MIN_FREE_BYTES);
    }

    #[test]
    fn required_bytes_scales_with_payload() {
        let big = 50 * 1024 * 1024;
        assert_eq!(required_bytes(big), big * 2);
    }

    #[test]
    fn available_bytes_resolves_for_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        // Best effort: on most CI/dev hosts a mount point is found.
        let _ = available_bytes(dir.path());
    }
}
