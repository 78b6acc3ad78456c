//! Cross-platform process liveness probing.
//!
//! Orphan reclamation only deletes a scratch directory when its owner is
//! known to be gone. Anything short of that (no permission to probe, probe
//! tool missing, unsupported platform) is reported as [`Liveness::Unknown`]
//! and callers must treat it as alive.

/// Result of probing a process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists.
    Alive,
    /// The process does not exist.
    Dead,
    /// Could not tell.
    Unknown,
}

impl Liveness {
    /// Whether the owner may still be using its directory.
    pub fn may_be_alive(self) -> bool {
        !matches!(self, Liveness::Dead)
    }

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Liveness::Alive => "alive",
            Liveness::Dead => "dead",
            Liveness::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability for checking whether a process is running.
pub trait ProcessProbe {
    /// Probe a process id without affecting it.
    fn probe(&self, pid: u32) -> Liveness;
}

/// POSIX probe using a null signal (`kill(pid, 0)`).
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixProbe;

#[cfg(unix)]
impl ProcessProbe for PosixProbe {
    fn probe(&self, pid: u32) -> Liveness {
        let Ok(raw) = libc::pid_t::try_from(pid) else {
            return Liveness::Unknown;
        };
        if raw <= 0 {
            // 0 and negatives address process groups
            return Liveness::Unknown;
        }

        // SAFETY: signal 0 performs only the existence and permission check
        let rc = unsafe { libc::kill(raw, 0) };
        if rc == 0 {
            return Liveness::Alive;
        }

        // EPERM means the pid exists under another user
        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::ESRCH) => Liveness::Dead,
            _ => Liveness::Unknown,
        }
    }
}

/// Windows probe that asks `tasklist` for the pid.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsProbe;

#[cfg(windows)]
impl ProcessProbe for WindowsProbe {
    fn probe(&self, pid: u32) -> Liveness {
        let output = std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH", "/FO", "CSV"])
            .output();

        match output {
            Ok(out) if out.status.success() => {
                parse_tasklist(&String::from_utf8_lossy(&out.stdout), pid)
            }
            _ => Liveness::Unknown,
        }
    }
}

/// Interpret `tasklist /NH /FO CSV` output for a single pid filter.
///
/// Matching rows look like `"name.exe","1234","Console","1","10,000 K"`;
/// when nothing matches, tasklist prints an informational line instead.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_tasklist(stdout: &str, pid: u32) -> Liveness {
    let needle = format!("\"{}\"", pid);
    if stdout.lines().any(|line| {
        line.split(',')
            .nth(1)
            .is_some_and(|field| field.trim() == needle)
    }) {
        return Liveness::Alive;
    }

    if stdout.trim().is_empty() || stdout.contains("INFO:") {
        Liveness::Dead
    } else {
        Liveness::Unknown
    }
}

/// Probe for platforms with no supported mechanism.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProbe;

impl ProcessProbe for UnsupportedProbe {
    fn probe(&self, _pid: u32) -> Liveness {
        Liveness::Unknown
    }
}

/// Select the probe for the current platform.
pub fn platform_probe() -> Box<dyn ProcessProbe> {
    #[cfg(unix)]
    {
        Box::new(PosixProbe)
    }

    #[cfg(windows)]
    {
        Box::new(WindowsProbe)
    }

    #[cfg(not(any(unix, windows)))]
    {
        Box::new(UnsupportedProbe)
    }
}
