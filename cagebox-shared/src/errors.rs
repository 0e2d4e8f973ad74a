//! Error types used across the cagebox sandbox launcher.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for cagebox operations.
pub type CageResult<T> = Result<T, CageError>;

#[derive(Debug, Error)]
pub enum CageError {
    #[error("profile {name:?} not found in any of: {searched:?}")]
    ProfileNotFound { name: String, searched: Vec<PathBuf> },

    #[error("profile {path:?} is not valid JSON: {source}")]
    ProfileMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("profile invalid: {reason}")]
    ProfileInvalid { reason: String },

    #[error("bind-mount spec {spec:?} rejected: {reason}")]
    InvalidBindMount { spec: String, reason: String },

    #[error("bind-mount source {path:?} does not exist")]
    SourceMissing { path: PathBuf },

    #[error("failed to bind mount {mount_source:?} onto {target:?}: {source_errno}")]
    MountFailed {
        mount_source: PathBuf,
        target: PathBuf,
        source_errno: nix::Error,
    },

    #[error("failed to remount {target:?} read-only: {source_errno}")]
    RemountFailed {
        target: PathBuf,
        source_errno: nix::Error,
    },

    #[error("capability setup failed: {reason}")]
    CapabilitySetupFailed { reason: String },

    #[error("seccomp filter install failed: {reason}")]
    SeccompInstallFailed { reason: String },

    #[error("fork failed: {source_errno}")]
    ForkFailed { source_errno: nix::Error },

    #[error("failed to create a new mount namespace: {source_errno}")]
    NamespaceSetupFailed { source_errno: nix::Error },

    #[error("waiting on the sandboxed child failed: {source_errno}")]
    WaitFailed { source_errno: nix::Error },

    #[error("compiled filter has {instruction_count} instructions, exceeding the 255-offset bound")]
    FilterTooLarge { instruction_count: usize },

    #[error("host architecture has no entry in the syscall table")]
    UnsupportedArchitecture,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
