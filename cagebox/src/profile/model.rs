//! In-memory representation of a loaded, validated profile.
//!
//! Everything in this module is produced by [`super::loader::ProfileLoader`]
//! and is immutable thereafter -- a `Profile` has no setters.

use std::collections::BTreeSet;

/// What happens to a syscall not present in `allowed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    /// Terminate the process (`SECCOMP_RET_KILL_PROCESS`).
    Kill,
    /// Deny with the given errno (`SECCOMP_RET_ERRNO | code`). `1..=4095`.
    Errno(u16),
    /// Allow everything not otherwise named (`SECCOMP_RET_ALLOW`).
    Allow,
}

/// Syscall policy: what is allowed, what happens to everything else.
///
/// `blocked` is informational only when `default_action` already denies
/// anything outside `allowed` -- it only changes generated behavior when
/// `default_action == Allow`, in which case names in `blocked` must be
/// explicitly denied. Its semantics under `Kill` are redundant and
/// intentionally left ambiguous; see DESIGN.md.
#[derive(Debug, Clone)]
pub struct SyscallPolicy {
    pub default_action: DefaultAction,
    pub allowed: BTreeSet<String>,
    pub blocked: BTreeSet<String>,
}

/// Capability policy: the process's ambient set after `apply`.
#[derive(Debug, Clone)]
pub struct CapabilityPolicy {
    pub drop_all: bool,
    pub keep: Vec<String>,
}

/// A fully validated, loaded profile. Created by the loader, consumed by
/// the BPF compiler and capability engine, discarded when the orchestrator
/// that owns it goes out of scope.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub version: String,
    pub syscalls: SyscallPolicy,
    pub capabilities: Option<CapabilityPolicy>,
}
