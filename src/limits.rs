//! Applies CPU-time, address-space, and file-size rlimits to a child process
//! before it execs.
//!
//! Invoked inside the child between `fork` and `exec` via
//! [`std::os::unix::process::CommandExt::pre_exec`], using
//! `nix::sys::resource::setrlimit`.

use nix::sys::resource::{setrlimit, Resource};

const RUN_FILE_SIZE_LIMIT_BYTES: u64 = 16 * 1024 * 1024;
const COMPILE_FILE_SIZE_LIMIT_BYTES: u64 = 64 * 1024 * 1024;

/// Bits set in [`Limits::install`]'s return value, one per rlimit that
/// failed to apply. Kept as a plain bitmask rather than logged from inside
/// `install` itself, since that function runs in a forked child between
/// `fork` and `exec` where taking `tracing`'s subscriber lock could
/// deadlock the child if another thread held it at fork time; the caller
/// reports these bits from the parent process instead.
pub const FAILED_CPU: u8 = 1 << 0;
pub const FAILED_ADDRESS_SPACE: u8 = 1 << 1;
pub const FAILED_FSIZE: u8 = 1 << 2;

/// Caps applied to a child immediately before it execs.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub cpu_time_secs: u64,
    pub address_space_bytes: u64,
    pub is_compilation: bool,
}

impl Limits {
    pub fn for_run(time_limit_secs: u32, memory_limit_mb: u32) -> Self {
        Limits {
            cpu_time_secs: time_limit_secs as u64,
            address_space_bytes: memory_limit_mb as u64 * 1024 * 1024,
            is_compilation: false,
        }
    }

    pub fn for_compilation(memory_limit_mb: u32) -> Self {
        Limits {
            cpu_time_secs: crate::profile::COMPILATION_TIME_LIMIT_SECS as u64,
            address_space_bytes: memory_limit_mb as u64 * 1024 * 1024,
            is_compilation: true,
        }
    }

    /// Install CPU, address-space, and file-size rlimits on the calling
    /// process. Meant to run inside a `pre_exec` hook between `fork` and
    /// `exec` — an individual `setrlimit` failure is swallowed rather than
    /// aborting the exec, so a kernel that refuses one limit (e.g.
    /// address-space caps on some container runtimes) still lets the child
    /// start; the wall-clock poller and RSS sampler in the supervisor are
    /// the fallback enforcement when a limit fails to install. The return
    /// value reports which limits failed via the `FAILED_*` bit constants,
    /// for the caller to log outside the forked child.
    pub fn install(&self) -> u8 {
        let mut failed = 0u8;

        if setrlimit(Resource::RLIMIT_CPU, self.cpu_time_secs, self.cpu_time_secs).is_err() {
            failed |= FAILED_CPU;
        }

        let as_failed = setrlimit(
            Resource::RLIMIT_AS,
            self.address_space_bytes,
            self.address_space_bytes,
        )
        .is_err();
        if as_failed
            && setrlimit(
                Resource::RLIMIT_DATA,
                self.address_space_bytes,
                self.address_space_bytes,
            )
            .is_err()
        {
            failed |= FAILED_ADDRESS_SPACE;
        }

        let fsize = if self.is_compilation {
            COMPILE_FILE_SIZE_LIMIT_BYTES
        } else {
            RUN_FILE_SIZE_LIMIT_BYTES
        };
        if setrlimit(Resource::RLIMIT_FSIZE, fsize, fsize).is_err() {
            failed |= FAILED_FSIZE;
        }

        failed
    }
}

/// Logs which rlimits failed to install, decoded from [`Limits::install`]'s
/// return value. Called from the parent process after the child has been
/// spawned, never from inside the forked child itself.
pub fn log_install_failures(failed: u8) {
    if failed & FAILED_CPU != 0 {
        tracing::warn!("failed to set RLIMIT_CPU on child");
    }
    if failed & FAILED_ADDRESS_SPACE != 0 {
        tracing::warn!("failed to set RLIMIT_AS and fallback RLIMIT_DATA on child");
    }
    if failed & FAILED_FSIZE != 0 {
        tracing::warn!("failed to set RLIMIT_FSIZE on child");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_limits_convert_mb_to_bytes() {
        let l = Limits::for_run(5, 64);
        assert_eq!(l.cpu_time_secs, 5);
        assert_eq!(l.address_space_bytes, 64 * 1024 * 1024);
        assert!(!l.is_compilation);
    }

    #[test]
    fn compilation_limits_use_fixed_deadline() {
        let l = Limits::for_compilation(2048);
        assert_eq!(l.cpu_time_secs, 60);
        assert!(l.is_compilation);
    }
}
