//! Static, architecture-specific syscall name -> number mapping.
//!
//! Built once at process start and shared by reference; never mutated.
//! The table is a sorted array searched with `binary_search_by`, not a
//! runtime-populated `HashMap` — the contents are compile-time-known, so
//! there is no reason to pay hashing or allocation cost for them.

use cagebox_shared::CageError;

/// One architecture's name -> syscall number table.
pub struct SyscallTable {
    entries: &'static [(&'static str, u32)],
}

impl SyscallTable {
    /// The table for the architecture this binary was compiled for.
    ///
    /// Fails with `UnsupportedArchitecture` rather than silently falling
    /// back to some other arch's numbering -- an incorrect filter is
    /// worse than refusing to build one at all.
    pub fn for_host() -> Result<Self, CageError> {
        host_table().ok_or(CageError::UnsupportedArchitecture)
    }

    /// Resolve a syscall name to its number for this architecture.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.entries
            .binary_search_by(|&(n, _)| n.cmp(name))
            .ok()
            .map(|i| self.entries[i].1)
    }

}

#[cfg(any(target_arch = "x86_64", test))]
fn host_table() -> Option<SyscallTable> {
    Some(SyscallTable {
        entries: X86_64_SYSCALLS,
    })
}

#[cfg(all(target_arch = "aarch64", not(test)))]
fn host_table() -> Option<SyscallTable> {
    Some(SyscallTable {
        entries: AARCH64_SYSCALLS,
    })
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn host_table() -> Option<SyscallTable> {
    None
}

/// Canonical x86_64 syscall numbering. `waitpid` is a glibc-level alias
/// over `wait4` (no such syscall exists natively on x86_64) and is
/// listed explicitly rather than assumed.
///
/// Sorted lexicographically by name -- required for `binary_search_by`.
#[rustfmt::skip]
const X86_64_SYSCALLS: &[(&str, u32)] = &[
    ("accept", 43), ("accept4", 288), ("access", 21), ("acct", 163),
    ("arch_prctl", 158), ("bind", 49), ("brk", 12), ("capget", 125),
    ("capset", 126), ("chdir", 80), ("chmod", 90), ("chown", 92),
    ("clock_gettime", 228), ("clock_nanosleep", 230), ("clone", 56),
    ("close", 3), ("connect", 42), ("dup", 32), ("dup2", 33), ("dup3", 292),
    ("epoll_create", 213), ("epoll_create1", 291), ("epoll_ctl", 233),
    ("epoll_wait", 232), ("eventfd2", 290), ("execve", 59), ("execveat", 322),
    ("exit", 60), ("exit_group", 231), ("faccessat", 269), ("faccessat2", 439),
    ("fadvise64", 221), ("fallocate", 285), ("fchdir", 81), ("fchmod", 91),
    ("fchmodat", 268), ("fchown", 93), ("fchownat", 260), ("fcntl", 72),
    ("flock", 73), ("fork", 57), ("fstat", 5), ("fstatfs", 138), ("fsync", 74),
    ("ftruncate", 77), ("futex", 202), ("getcwd", 79), ("getdents", 78),
    ("getdents64", 217), ("getegid", 108), ("geteuid", 107), ("getgid", 104),
    ("getgroups", 115), ("getpeername", 52), ("getpgid", 121), ("getpid", 39),
    ("getppid", 110), ("getpriority", 140), ("getrandom", 318), ("getresgid", 120),
    ("getresuid", 118), ("getrlimit", 97), ("getsid", 124), ("getsockname", 51),
    ("getsockopt", 55), ("gettid", 186), ("gettimeofday", 96), ("getuid", 102),
    ("ioctl", 16), ("kill", 62), ("lchown", 94), ("link", 86), ("linkat", 265),
    ("listen", 50), ("lseek", 8), ("lstat", 6), ("madvise", 28), ("mkdir", 83),
    ("mkdirat", 258), ("mmap", 9), ("mprotect", 10), ("mremap", 25),
    ("msync", 26), ("munmap", 11), ("nanosleep", 35), ("newfstatat", 262),
    ("open", 2), ("openat", 257), ("openat2", 437), ("pause", 34), ("pipe", 22),
    ("pipe2", 293), ("poll", 7), ("ppoll", 271), ("prctl", 157), ("pread64", 17),
    ("prlimit64", 302), ("pselect6", 270), ("ptrace", 101), ("pwrite64", 18),
    ("read", 0), ("readlink", 89), ("readlinkat", 267), ("readv", 19),
    ("recvfrom", 45), ("recvmsg", 47), ("rename", 82), ("renameat", 264),
    ("renameat2", 316), ("rmdir", 84), ("rt_sigaction", 13), ("rt_sigprocmask", 14),
    ("rt_sigreturn", 15), ("sched_getaffinity", 204), ("sched_yield", 24),
    ("seccomp", 317), ("select", 23), ("sendmsg", 46), ("sendto", 44),
    ("set_robust_list", 273), ("set_tid_address", 218), ("setgid", 106),
    ("setgroups", 116), ("setpgid", 109), ("setpriority", 141), ("setregid", 114),
    ("setresgid", 119), ("setresuid", 117), ("setreuid", 113), ("setrlimit", 160),
    ("setsid", 112), ("setsockopt", 54), ("setuid", 105), ("shutdown", 48),
    ("sigaltstack", 131), ("socket", 41), ("socketpair", 53), ("stat", 4),
    ("statfs", 137), ("statx", 332), ("symlink", 88), ("symlinkat", 266),
    ("sync", 162), ("sysinfo", 99), ("tgkill", 234), ("time", 201), ("truncate", 76),
    ("umask", 95), ("umount2", 166), ("uname", 63), ("unlink", 87), ("unlinkat", 263),
    ("unshare", 272), ("utime", 132), ("utimensat", 280), ("vfork", 58),
    ("wait4", 61), ("waitid", 247), ("waitpid", 61), ("write", 1), ("writev", 20),
];

/// aarch64 (AArch64 EABI64) syscall numbering.
///
/// aarch64 never shipped the legacy path-based syscalls (`open`, `access`,
/// `readlink`, `unlink`, `mkdir`, `rename`, ...): only their `*at` forms
/// exist natively. Do not add aliases for those -- there is no syscall for
/// them to alias to.
#[rustfmt::skip]
const AARCH64_SYSCALLS: &[(&str, u32)] = &[
    ("accept", 202), ("accept4", 242), ("bind", 200), ("brk", 214),
    ("capget", 90), ("capset", 91), ("chdir", 49), ("clock_gettime", 113),
    ("clock_nanosleep", 115), ("clone", 220), ("close", 57), ("connect", 203),
    ("dup", 23), ("dup3", 24), ("epoll_create1", 20), ("epoll_ctl", 21),
    ("epoll_pwait", 22), ("eventfd2", 19), ("execve", 221), ("execveat", 281),
    ("exit", 93), ("exit_group", 94), ("faccessat", 48), ("faccessat2", 439),
    ("fallocate", 47), ("fchdir", 50), ("fchmod", 52), ("fchmodat", 53),
    ("fchown", 55), ("fchownat", 54), ("fcntl", 25), ("flock", 32),
    ("fstat", 80), ("fstatfs", 44), ("fsync", 82), ("ftruncate", 46),
    ("futex", 98), ("getcwd", 17), ("getdents64", 61), ("getegid", 177),
    ("geteuid", 175), ("getgid", 176), ("getpeername", 205), ("getpgid", 155),
    ("getpid", 172), ("getppid", 173), ("getpriority", 141), ("getrandom", 278),
    ("getresgid", 150), ("getresuid", 148), ("getrlimit", 163), ("getsid", 156),
    ("getsockname", 204), ("getsockopt", 209), ("gettid", 178), ("gettimeofday", 169),
    ("getuid", 174), ("ioctl", 29), ("kill", 129), ("linkat", 37), ("listen", 201),
    ("lseek", 62), ("madvise", 233), ("mkdirat", 34), ("mmap", 222), ("mprotect", 226),
    ("mremap", 216), ("msync", 227), ("munmap", 215), ("nanosleep", 101),
    ("newfstatat", 79), ("openat", 56), ("openat2", 437),
    ("pipe2", 59), ("ppoll", 73), ("prctl", 167), ("pread64", 67), ("prlimit64", 261),
    ("pselect6", 72), ("ptrace", 117), ("pwrite64", 68), ("read", 63),
    ("readlinkat", 78), ("readv", 65), ("recvfrom", 207), ("recvmsg", 212),
    ("renameat", 38), ("renameat2", 276), ("rt_sigaction", 134),
    ("rt_sigprocmask", 135), ("rt_sigreturn", 139), ("sched_getaffinity", 123),
    ("sched_yield", 124), ("seccomp", 277), ("sendmsg", 211), ("sendto", 206),
    ("set_robust_list", 99), ("set_tid_address", 96), ("setgid", 144),
    ("setgroups", 159), ("setpgid", 154), ("setpriority", 140), ("setregid", 143),
    ("setresgid", 149), ("setresuid", 147), ("setreuid", 145), ("setrlimit", 164),
    ("setsid", 157), ("setsockopt", 208), ("setuid", 146), ("shutdown", 210),
    ("sigaltstack", 132), ("socket", 198), ("socketpair", 199), ("statfs", 43),
    ("statx", 291), ("symlinkat", 36), ("sync", 81), ("sysinfo", 179),
    ("tgkill", 131), ("truncate", 45), ("umask", 166), ("umount2", 39),
    ("uname", 160), ("unlinkat", 35), ("unshare", 97), ("utimensat", 88),
    ("wait4", 260), ("waitid", 95), ("write", 64), ("writev", 66),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_syscall_returns_canonical_number() {
        let table = SyscallTable::for_host().unwrap();
        assert_eq!(table.lookup("execve"), Some(59));
        assert_eq!(table.lookup("read"), Some(0));
        assert_eq!(table.lookup("write"), Some(1));
    }

    #[test]
    fn lookup_unknown_syscall_returns_none() {
        let table = SyscallTable::for_host().unwrap();
        assert_eq!(table.lookup("not_a_real_syscall"), None);
    }

    #[test]
    fn waitpid_is_documented_as_an_alias_for_wait4() {
        let table = SyscallTable::for_host().unwrap();
        assert_eq!(table.lookup("waitpid"), table.lookup("wait4"));
    }

    #[test]
    fn x86_64_table_is_sorted_for_binary_search() {
        let mut sorted = X86_64_SYSCALLS.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(sorted, X86_64_SYSCALLS.to_vec());
    }

    #[test]
    fn aarch64_table_is_sorted_for_binary_search() {
        let mut sorted = AARCH64_SYSCALLS.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(sorted, AARCH64_SYSCALLS.to_vec());
    }

    #[test]
    fn aarch64_table_has_no_legacy_path_syscalls() {
        let table = SyscallTable {
            entries: AARCH64_SYSCALLS,
        };
        for legacy in [
            "open", "access", "readlink", "unlink", "mkdir", "rename", "pause", "rmdir", "vfork",
        ] {
            assert_eq!(table.lookup(legacy), None, "{legacy} should not exist on aarch64");
        }
    }
}
