//! Sandbox Orchestrator.
//!
//! Owns the cross-component protocol: creates namespaces, forks, applies
//! bind mounts, applies capabilities, installs the BPF filter, execs the
//! target. In the parent, waits for the child and translates its
//! termination into a structured [`ExitClassification`].
//!
//! Single-threaded, single-fork, no cancellation. Every step below runs
//! to completion before the next begins in the same process.

use std::os::unix::process::CommandExt;
use std::process::Command;

use cagebox_shared::{CageError, CageResult};
use nix::sched::{unshare, CloneFlags};
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};

use crate::bind_mount::{self, BindMount};
use crate::bpf::{self, Instruction};
use crate::capabilities;
use crate::profile::Profile;
use crate::syscall_table::SyscallTable;

/// Everything the orchestrator needs for one run: owned exclusively by it,
/// consumed once, discarded after exec or child failure.
pub struct SandboxConfig {
    pub profile: Profile,
    pub binds: Vec<BindMount>,
    /// `argv[0]` is the program to exec; the rest are its arguments.
    pub argv: Vec<String>,
}

/// How the sandboxed child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// Exited with status 0.
    Clean,
    /// Exited with a nonzero status `c` (either the target program's own
    /// exit, or a child-side setup failure encoded as a reserved code --
    /// see [`child_setup_failure_reason`]).
    ProgramExit(i32),
    /// Killed by a signal other than `SIGSYS`.
    SignalTerminated(i32),
    /// Killed by `SIGSYS`: the child attempted a syscall denied under the
    /// `Kill` default action. Expected behavior, not a launcher bug.
    SeccompViolation,
}

impl ExitClassification {
    /// The launcher's own process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitClassification::Clean => 0,
            ExitClassification::ProgramExit(c) => *c,
            ExitClassification::SignalTerminated(s) => 128 + s,
            ExitClassification::SeccompViolation => 128 + Signal::SIGSYS as i32,
        }
    }
}

// Reserved child exit codes: distinct from ordinary program exit codes, so
// a nonzero status in this range tells the parent's log (not its control
// flow) which setup step failed.
const EXIT_BIND_MOUNT_FAILED: i32 = 101;
const EXIT_CAPABILITY_FAILED: i32 = 102;
const EXIT_SECCOMP_PREP_FAILED: i32 = 103;
const EXIT_EXEC_FAILED: i32 = 104;

fn child_setup_failure_reason(code: i32) -> Option<&'static str> {
    match code {
        EXIT_BIND_MOUNT_FAILED => Some("bind-mount setup failed"),
        EXIT_CAPABILITY_FAILED => Some("capability setup failed"),
        EXIT_SECCOMP_PREP_FAILED => Some("no_new_privs or seccomp filter install failed"),
        EXIT_EXEC_FAILED => Some("execve failed"),
        _ => None,
    }
}

/// Run the full sandbox lifecycle. Single entry point.
pub fn run(config: SandboxConfig) -> CageResult<ExitClassification> {
    // 1. Validate.
    validate_bind_mounts(&config.binds)?;

    // 2. Compile.
    let table = SyscallTable::for_host()?;
    let program = bpf::compile(&config.profile, &table)?;
    tracing::debug!(instructions = program.len(), "compiled seccomp filter");

    // 3. Unshare (parent). Only needed if there is anything to mount.
    if !config.binds.is_empty() {
        unshare(CloneFlags::CLONE_NEWNS).map_err(|errno| CageError::NamespaceSetupFailed {
            source_errno: errno,
        })?;
        tracing::debug!("created new mount namespace");
    }

    // 4. Fork.
    // SAFETY: single-threaded process; the child path below performs no
    // allocation-unsafe work before settling into ordinary single-threaded
    // execution.
    match unsafe { fork() }.map_err(|errno| CageError::ForkFailed { source_errno: errno })? {
        ForkResult::Child => {
            // Never returns: either execve succeeds and this process image
            // is replaced, or child_main exits explicitly.
            child_main(&config, &program);
        }
        ForkResult::Parent { child } => {
            tracing::info!(pid = child.as_raw(), "forked sandboxed child");
            let status =
                waitpid(child, None).map_err(|errno| CageError::WaitFailed { source_errno: errno })?;
            Ok(classify(status))
        }
    }
}

fn validate_bind_mounts(binds: &[BindMount]) -> CageResult<()> {
    for bind in binds {
        if !bind.source.is_absolute() || !bind.target.is_absolute() {
            return Err(CageError::InvalidBindMount {
                spec: format!("{}:{}", bind.source.display(), bind.target.display()),
                reason: "both source and target must be absolute paths".to_string(),
            });
        }
        if !bind.source.exists() {
            return Err(CageError::SourceMissing {
                path: bind.source.clone(),
            });
        }
    }
    Ok(())
}

/// Child-side continuation. Linear by construction: each step either
/// succeeds and falls through, or exits with a reserved code. Does not
/// return.
fn child_main(config: &SandboxConfig, program: &[Instruction]) -> ! {
    if let Err(e) = bind_mount::apply(&config.binds) {
        tracing::error!(error = %e, "bind-mount setup failed in sandboxed child");
        std::process::exit(EXIT_BIND_MOUNT_FAILED);
    }

    if let Some(cap_policy) = &config.profile.capabilities {
        if let Err(e) = capabilities::apply(cap_policy) {
            tracing::error!(error = %e, "capability setup failed in sandboxed child");
            std::process::exit(EXIT_CAPABILITY_FAILED);
        }
    }

    if let Err(e) = set_no_new_privs().and_then(|_| install_seccomp_filter(program)) {
        tracing::error!(error = %e, "seccomp preparation failed in sandboxed child");
        std::process::exit(EXIT_SECCOMP_PREP_FAILED);
    }

    let exec_err = Command::new(&config.argv[0]).args(&config.argv[1..]).exec();
    tracing::error!(error = %exec_err, program = %config.argv[0], "execve failed");
    std::process::exit(EXIT_EXEC_FAILED);
}

/// Sets `PR_SET_NO_NEW_PRIVS`, the prerequisite for unprivileged seccomp
/// filter installation: it permanently prevents any future `execve` from
/// granting additional privileges via setuid binaries or file capabilities.
fn set_no_new_privs() -> CageResult<()> {
    // SAFETY: prctl with PR_SET_NO_NEW_PRIVS takes no pointer arguments.
    let ret = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if ret != 0 {
        return Err(CageError::SeccompInstallFailed {
            reason: format!("PR_SET_NO_NEW_PRIVS failed: {}", std::io::Error::last_os_error()),
        });
    }
    Ok(())
}

/// Installs the compiled BPF program via `prctl(PR_SET_SECCOMP,
/// SECCOMP_MODE_FILTER, ...)`. `Instruction`'s layout matches
/// `libc::sock_filter` exactly, so the program is handed to the kernel
/// without an intermediate copy.
fn install_seccomp_filter(program: &[Instruction]) -> CageResult<()> {
    let fprog = libc::sock_fprog {
        len: program.len() as u16,
        filter: program.as_ptr() as *mut libc::sock_filter,
    };
    // SAFETY: `fprog` borrows `program`'s storage for the duration of this
    // call only; the kernel copies the instruction array before returning.
    let ret = unsafe {
        libc::prctl(
            libc::PR_SET_SECCOMP,
            libc::SECCOMP_MODE_FILTER,
            &fprog as *const libc::sock_fprog,
        )
    };
    if ret != 0 {
        return Err(CageError::SeccompInstallFailed {
            reason: format!("PR_SET_SECCOMP failed: {}", std::io::Error::last_os_error()),
        });
    }
    Ok(())
}

fn classify(status: WaitStatus) -> ExitClassification {
    match status {
        WaitStatus::Exited(_, 0) => ExitClassification::Clean,
        WaitStatus::Exited(_, code) => {
            if let Some(reason) = child_setup_failure_reason(code) {
                tracing::warn!(code, reason, "sandboxed child exited with a reserved setup-failure code");
            }
            ExitClassification::ProgramExit(code)
        }
        WaitStatus::Signaled(_, Signal::SIGSYS, _) => {
            tracing::warn!("sandboxed child was killed by SIGSYS: seccomp policy enforcement, not a crash");
            ExitClassification::SeccompViolation
        }
        WaitStatus::Signaled(_, signal, _) => ExitClassification::SignalTerminated(signal as i32),
        other => {
            tracing::warn!(?other, "unexpected wait status, treating as a generic failure");
            ExitClassification::ProgramExit(1)
        }
    }
}
