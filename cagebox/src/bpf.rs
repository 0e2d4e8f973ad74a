//! BPF Filter Compiler.
//!
//! Hand-rolled classic BPF (cBPF) synthesis: `compile` turns a `Profile`
//! and a `SyscallTable` into a straight-line instruction stream the kernel
//! can load via `seccomp(2)` in filter mode. No external seccomp crate is
//! involved -- the exact offset arithmetic here is the deliverable this
//! module exists to get right.

use cagebox_shared::{CageError, CageResult};

use crate::profile::{DefaultAction, Profile};
use crate::syscall_table::SyscallTable;

/// One classic BPF instruction: `(opcode, jt, jf, k)`. Field layout matches
/// the kernel's `struct sock_filter` exactly, so a compiled `Instruction`
/// can be transmuted into one for `seccomp(2)`/`setsockopt` without copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Instruction {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

// BPF instruction classes and addressing modes (linux/bpf_common.h).
const BPF_LD: u16 = 0x00;
const BPF_JMP: u16 = 0x05;
const BPF_RET: u16 = 0x06;
const BPF_W: u16 = 0x00;
const BPF_ABS: u16 = 0x20;
const BPF_JEQ: u16 = 0x10;
const BPF_K: u16 = 0x00;

const OP_LOAD_ABS_W: u16 = BPF_LD | BPF_W | BPF_ABS;
const OP_JEQ_K: u16 = BPF_JMP | BPF_JEQ | BPF_K;
const OP_RET_K: u16 = BPF_RET | BPF_K;

/// `struct seccomp_data` field offsets: syscall number first, then the
/// architecture identifier.
const OFFSET_NR: u32 = 0;
const OFFSET_ARCH: u32 = 4;

/// Seccomp filter return codes, per the kernel's seccomp ABI. Emitted
/// verbatim; these are not derived from anything, they are the contract.
pub const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;
pub const SECCOMP_RET_ERRNO: u32 = 0x0005_0000;
pub const SECCOMP_RET_ALLOW: u32 = 0x7FFF_0000;

/// `AUDIT_ARCH_*` identifiers from `linux/audit.h`, used for the
/// architecture gate at the top of every compiled program.
#[cfg(target_arch = "x86_64")]
const TARGET_ARCH_ID: u32 = 0xC000_003E;
#[cfg(target_arch = "aarch64")]
const TARGET_ARCH_ID: u32 = 0xC000_00B7;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("cagebox's BPF compiler only knows the x86_64 and aarch64 AUDIT_ARCH identifiers");

/// The maximum number of allowed-syscall comparisons a program can hold
/// while keeping every forward branch offset within the 8-bit `jt`/`jf`
/// field. V1 fails rather than reorganizing into a jump table.
const MAX_ALLOWED_SYSCALLS: usize = 255;

fn stmt(code: u16, k: u32) -> Instruction {
    Instruction { code, jt: 0, jf: 0, k }
}

fn jump(code: u16, jt: u8, jf: u8, k: u32) -> Instruction {
    Instruction { code, jt, jf, k }
}

/// Every allowed-syscall comparison's true-branch offset is `N - i`, which
/// must fit in the 8-bit `jt` field. V1 fails outright past this bound
/// rather than restructuring into a jump table.
fn enforce_size_bound(n: usize) -> CageResult<()> {
    if n > MAX_ALLOWED_SYSCALLS {
        return Err(CageError::FilterTooLarge {
            instruction_count: 4 + n + 2,
        });
    }
    Ok(())
}

fn default_action_return_code(action: DefaultAction) -> u32 {
    match action {
        DefaultAction::Kill => SECCOMP_RET_KILL_PROCESS,
        DefaultAction::Errno(code) => SECCOMP_RET_ERRNO | (code as u32 & 0xFFFF),
        DefaultAction::Allow => SECCOMP_RET_ALLOW,
    }
}

/// Resolve a sorted name set to ordinals, warning on and skipping names
/// absent from the table rather than failing the whole compile.
fn resolve_names(names: &std::collections::BTreeSet<String>, table: &SyscallTable) -> Vec<u32> {
    let mut ordinals = Vec::with_capacity(names.len());
    for name in names {
        match table.lookup(name) {
            Some(nr) => ordinals.push(nr),
            None => tracing::warn!(syscall = %name, "unknown syscall name, skipping"),
        }
    }
    ordinals
}

/// Compile `profile`'s syscall policy into a BPF program.
///
/// Under `Kill`/`Errno` defaults, `allowed` is the exception list: each
/// name gets a comparison whose true branch lands on an ALLOW terminator,
/// and anything that falls through every comparison hits the default
/// terminator. Under `Allow`, permitting the rest is already the default,
/// so `allowed` contributes nothing and `blocked` becomes the exception
/// list instead, with matches landing on a KILL terminator.
///
/// Pure and deterministic: the same profile always produces byte-identical
/// output, since both sets are `BTreeSet`s (sorted iteration order) and
/// unknown names are skipped rather than reordering the rest.
///
/// Unknown syscall names are a soft failure -- logged via `tracing::warn!`
/// and excluded from the comparison count, not a compile error. The
/// compiler itself is total over any validated `Profile`, failing only
/// when the exception set would push a branch offset past the 8-bit bound.
pub fn compile(profile: &Profile, table: &SyscallTable) -> CageResult<Vec<Instruction>> {
    let is_allow_default = matches!(profile.syscalls.default_action, DefaultAction::Allow);
    let (ordinals, exception_return) = if is_allow_default {
        (resolve_names(&profile.syscalls.blocked, table), SECCOMP_RET_KILL_PROCESS)
    } else {
        (resolve_names(&profile.syscalls.allowed, table), SECCOMP_RET_ALLOW)
    };

    let n = ordinals.len();
    enforce_size_bound(n)?;

    let total = 4 + n + 2;
    let mut program = Vec::with_capacity(total);

    // 1-3: architecture gate.
    program.push(stmt(OP_LOAD_ABS_W, OFFSET_ARCH));
    program.push(jump(OP_JEQ_K, 1, 0, TARGET_ARCH_ID));
    program.push(stmt(OP_RET_K, SECCOMP_RET_KILL_PROCESS));

    // 4: load the syscall number.
    program.push(stmt(OP_LOAD_ABS_W, OFFSET_NR));

    // 5: one comparison per exception-list syscall. jt = N - i counts
    // forward to the exception terminator at position T - 1; jf = 0 falls
    // through to the next comparison (or the default terminator after the
    // last one).
    for (i, nr) in ordinals.iter().enumerate() {
        let jt = (n - i) as u8;
        program.push(jump(OP_JEQ_K, jt, 0, *nr));
    }

    // 6: default-action terminator.
    program.push(stmt(OP_RET_K, default_action_return_code(profile.syscalls.default_action)));

    // 7: exception terminator.
    program.push(stmt(OP_RET_K, exception_return));

    debug_assert_eq!(program.len(), total);
    Ok(program)
}
