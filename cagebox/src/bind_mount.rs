//! Bind-Mount Engine.
//!
//! Applies an ordered list of bind mounts inside the current mount
//! namespace. Called from the child, after the mount namespace has been
//! created in the parent and inherited across `fork`.

use std::path::{Path, PathBuf};

use cagebox_shared::{CageError, CageResult};
use nix::mount::{mount, MsFlags};

/// One `(source, target, readonly)` triple. `recursive` defaults to true.
#[derive(Debug, Clone)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: PathBuf,
    pub readonly: bool,
    pub recursive: bool,
}

impl BindMount {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            readonly: false,
            recursive: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Parse `<absolute-source>:<absolute-target>[:ro]`.
    /// Both paths must be absolute; relative paths are rejected.
    pub fn parse(spec: &str) -> CageResult<Self> {
        let mut parts = spec.splitn(3, ':');
        let source = parts.next().filter(|s| !s.is_empty());
        let target = parts.next().filter(|s| !s.is_empty());
        let suffix = parts.next();

        let (source, target) = match (source, target) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                return Err(CageError::InvalidBindMount {
                    spec: spec.to_string(),
                    reason: "expected <source>:<target>[:ro]".to_string(),
                });
            }
        };

        let readonly = match suffix {
            None => false,
            Some("ro") => true,
            Some(other) => {
                return Err(CageError::InvalidBindMount {
                    spec: spec.to_string(),
                    reason: format!("unrecognized suffix {other:?}, expected \"ro\""),
                });
            }
        };

        if !source.starts_with('/') || !target.starts_with('/') {
            return Err(CageError::InvalidBindMount {
                spec: spec.to_string(),
                reason: "both source and target must be absolute paths".to_string(),
            });
        }

        let mut bind = BindMount::new(source, target);
        bind.readonly = readonly;
        Ok(bind)
    }
}

/// Apply every mount in order. An empty list is a no-op: no mount syscall
/// is issued, and the call cannot fail.
///
/// Per mount: verify the source exists, create the target directory chain,
/// bind mount, and (if `readonly`) remount with `nosuid`/`nodev` hardening.
/// Failure at any step aborts here -- no rollback of mounts already
/// applied is attempted, since the sandbox itself is being aborted.
pub fn apply(mounts: &[BindMount]) -> CageResult<()> {
    for bind in mounts {
        apply_one(bind)?;
    }
    Ok(())
}

fn apply_one(bind: &BindMount) -> CageResult<()> {
    if !bind.source.exists() {
        return Err(CageError::SourceMissing {
            path: bind.source.clone(),
        });
    }

    std::fs::create_dir_all(&bind.target)?;

    bind_mount(&bind.source, &bind.target, bind.recursive)?;

    if bind.readonly {
        remount_readonly(&bind.target)?;
    }

    Ok(())
}

fn bind_mount(source: &Path, target: &Path, recursive: bool) -> CageResult<()> {
    let mut flags = MsFlags::MS_BIND;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    mount(Some(source), target, None::<&str>, flags, None::<&str>).map_err(|errno| {
        CageError::MountFailed {
            mount_source: source.to_path_buf(),
            target: target.to_path_buf(),
            source_errno: errno,
        }
    })
}

fn remount_readonly(target: &Path) -> CageResult<()> {
    let flags = MsFlags::MS_BIND
        | MsFlags::MS_REMOUNT
        | MsFlags::MS_RDONLY
        | MsFlags::MS_NOSUID
        | MsFlags::MS_NODEV;
    mount(None::<&str>, target, None::<&str>, flags, None::<&str>).map_err(|errno| {
        CageError::RemountFailed {
            target: target.to_path_buf(),
            source_errno: errno,
        }
    })
}
