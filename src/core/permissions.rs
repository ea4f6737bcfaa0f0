// FILE: src/core/permissions.rs
//! Identity capture for synthetic attributes and mount options.

/// The uid/gid the overlay reports on synthetic directories.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    pub is_root: bool,
}

impl Identity {
    /// Capture the invoking user's identity.
    pub fn capture() -> Self {
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };
        let is_root = uid == 0;

        if is_root {
            tracing::warn!("Running as root; other users will see the mount");
        }

        Self { uid, gid, is_root }
    }

    /// Get mount options based on identity
    pub fn get_mount_options(&self) -> Vec<fuser::MountOption> {
        let mut options = vec![
            fuser::MountOption::FSName("magicfolder".to_string()),
            fuser::MountOption::AutoUnmount,
        ];
        if self.is_root {
            options.push(fuser::MountOption::AllowOther);
        }
        options
    }
}
