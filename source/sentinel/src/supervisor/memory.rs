//! RSS memory watchdog for supervised children (spec.md §4.6). Reading the
//! process table is behind a trait so the watchdog's trigger logic is
//! testable within one tick without waiting on a real over-budget child.

pub trait ProcessMemoryReader: Send + Sync {
    /// Returns the resident set size of `pid` in bytes, or `None` if the
    /// process is gone or unreadable.
    fn read_rss_bytes(&self, pid: u32) -> Option<u64>;
}

/// Reads `VmRSS` from `/proc/<pid>/status`, the mechanism available on the
/// platform the test suite runs on.
#[derive(Debug, Clone, Default)]
pub struct ProcStatusMemoryReader;

impl ProcessMemoryReader for ProcStatusMemoryReader {
    fn read_rss_bytes(&self, pid: u32) -> Option<u64> {
        let contents = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: u64 = rest.trim().split_whitespace().next()?.parse().ok()?;
                return Some(kb * 1024);
            }
        }
        None
    }
}

/// True if the child's current RSS is over `limit_bytes`. A read failure
/// (process already gone) never triggers a restart on its own.
pub fn over_memory_limit(reader: &dyn ProcessMemoryReader, pid: u32, limit_bytes: u64) -> bool {
    reader.read_rss_bytes(pid).is_some_and(|rss| rss > limit_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeMemoryReader(Option<u64>);

    impl ProcessMemoryReader for FakeMemoryReader {
        fn read_rss_bytes(&self, _pid: u32) -> Option<u64> {
            self.0
        }
    }

    #[test]
    fn over_limit_when_rss_exceeds_bound() {
        let reader = FakeMemoryReader(Some(200 * 1024 * 1024));
        assert!(over_memory_limit(&reader, 1234, 100 * 1024 * 1024));
    }

    #[test]
    fn under_limit_does_not_trigger() {
        let reader = FakeMemoryReader(Some(50 * 1024 * 1024));
        assert!(!over_memory_limit(&reader, 1234, 100 * 1024 * 1024));
    }

    #[test]
    fn unreadable_process_does_not_trigger() {
        let reader = FakeMemoryReader(None);
        assert!(!over_memory_limit(&reader, 1234, 100 * 1024 * 1024));
    }
}
