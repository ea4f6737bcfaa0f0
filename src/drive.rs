// FILE: src/drive.rs
//! Magic Drive: The Synchronous FUSE Loop (The Face)
//!
//! Translates the kernel's inode-addressed callbacks into the overlay's
//! virtual namespace: the root shows non-empty categories plus whatever
//! real entries are neither hidden nor categorized; category directories
//! are synthetic; every file's bytes live flat in the backing store.
//! Attribute TTLs are zero so index changes reach readers promptly.

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow, FUSE_ROOT_ID,
};

use crate::core::{Bouncer, Node};
use crate::state::SharedState;

use dashmap::DashMap;
use std::ffi::CString;
use std::fs::{File, Metadata, OpenOptions};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, FileExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Zero TTL: the kernel re-asks on every access, per the no-attr-cache rule.
const TTL: Duration = Duration::new(0, 0);

pub struct MagicDrive {
    pub state: SharedState,
    /// Backing descriptors, one per kernel open, closed in `release`.
    handles: DashMap<u64, OpenHandle>,
    next_fh: AtomicU64,
}

struct OpenHandle {
    file: File,
    filename: String,
    /// Opened through the root namespace; only these feed the vanish trick.
    root_origin: bool,
}

impl MagicDrive {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            handles: DashMap::new(),
            next_fh: AtomicU64::new(1),
        }
    }

    fn errno(err: &std::io::Error) -> i32 {
        err.raw_os_error().unwrap_or(libc::EIO)
    }

    fn register_handle(&self, file: File, filename: &str, root_origin: bool) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(
            fh,
            OpenHandle {
                file,
                filename: filename.to_string(),
                root_origin,
            },
        );
        fh
    }

    fn synthetic_dir_attr(&self, ino: u64) -> FileAttr {
        let now = SystemTime::now();
        FileAttr {
            ino,
            size: 4096,
            blocks: 8,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: self.state.identity.uid,
            gid: self.state.identity.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }

    fn root_attr(&self) -> FileAttr {
        self.synthetic_dir_attr(FUSE_ROOT_ID)
    }

    fn attr_from_metadata(&self, ino: u64, meta: &Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::RegularFile
        };
        let epoch = |secs: i64, nsecs: i64| {
            UNIX_EPOCH + Duration::new(secs.max(0) as u64, nsecs.max(0) as u32)
        };
        FileAttr {
            ino,
            size: meta.len(),
            blocks: meta.blocks(),
            atime: meta.accessed().unwrap_or(UNIX_EPOCH),
            mtime: meta.modified().unwrap_or(UNIX_EPOCH),
            ctime: epoch(meta.ctime(), meta.ctime_nsec()),
            crtime: meta.created().unwrap_or(UNIX_EPOCH),
            kind,
            perm: (meta.mode() & 0o7777) as u16,
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev() as u32,
            blksize: meta.blksize() as u32,
            flags: 0,
        }
    }

    /// Stat a backing entry and build its attr under the given inode.
    fn stat_backing(&self, ino: u64, name: &str) -> Option<FileAttr> {
        let meta = std::fs::metadata(self.state.backing_path(name)).ok()?;
        Some(self.attr_from_metadata(ino, &meta))
    }

    fn open_options(flags: i32) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => {
                opts.write(true);
            }
            libc::O_RDWR => {
                opts.read(true).write(true);
            }
            _ => {
                opts.read(true);
            }
        }
        if flags & libc::O_APPEND != 0 {
            opts.append(true);
        }
        if flags & libc::O_TRUNC != 0 {
            opts.write(true).truncate(true);
        }
        opts
    }

    fn c_path(path: &Path) -> Option<CString> {
        CString::new(path.as_os_str().as_bytes()).ok()
    }

    /// The vanish trick, release edition: a closed root file gets hidden
    /// (if it is not already spoken for) and handed to the Courier.
    fn vanish_on_release(&self, filename: &str) {
        if Bouncer::is_noise(filename) {
            return;
        }

        {
            let mut registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
            if !registry.is_hidden(filename) && !registry.is_categorized(filename) {
                registry.observe(filename);
                tracing::info!("[Drive] File queued for classification: {}", filename);
            }
            if let Ok(meta) = std::fs::metadata(self.state.backing_path(filename)) {
                registry.note_size(filename, meta.len());
            }
        }

        tracing::info!("[Drive] File closed, triggering classification: {}", filename);
        self.state.enqueue_for_classification(filename);
    }
}

impl Filesystem for MagicDrive {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> Result<(), i32> {
        tracing::info!("[Drive] Filesystem initialized");
        tracing::info!(
            "[Drive] Backing store: {}",
            self.state.backing_store.display()
        );
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!("[Drive] Filesystem unmounted");
        self.state.begin_shutdown();
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &std::ffi::OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        if parent == FUSE_ROOT_ID {
            if name == "." || name == ".." {
                reply.entry(&TTL, &self.root_attr(), 0);
                return;
            }

            // Categories shadow same-named backing entries.
            let is_category = {
                let registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                registry.has_category(name)
            };
            if is_category {
                let ino = self.state.inodes.category_inode(name);
                reply.entry(&TTL, &self.synthetic_dir_attr(ino), 0);
                return;
            }

            // THE VANISH TRICK: hidden and categorized names have no root
            // presence.
            let suppressed = {
                let registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                !registry.visible_in_root(name)
            };
            if suppressed {
                reply.error(libc::ENOENT);
                return;
            }

            let ino = self.state.inodes.entry_inode(name);
            match self.stat_backing(ino, name) {
                Some(attr) => reply.entry(&TTL, &attr, 0),
                None => reply.error(libc::ENOENT),
            }
            return;
        }

        match self.state.inodes.resolve(parent) {
            Some(Node::Category(category)) => {
                if name == "." {
                    reply.entry(&TTL, &self.synthetic_dir_attr(parent), 0);
                    return;
                }
                if name == ".." {
                    reply.entry(&TTL, &self.root_attr(), 0);
                    return;
                }

                let bound = {
                    let registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.category_of(name) == Some(category.as_str())
                };
                if !bound {
                    reply.error(libc::ENOENT);
                    return;
                }

                let ino = self.state.inodes.category_entry_inode(&category, name);
                match self.stat_backing(ino, name) {
                    Some(attr) => reply.entry(&TTL, &attr, 0),
                    None => reply.error(libc::ENOENT),
                }
            }
            // Depth beyond two segments is not part of the namespace.
            Some(Node::Entry(_)) => reply.error(libc::ENOENT),
            Some(Node::CategoryEntry { .. }) => reply.error(libc::ENOTDIR),
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        if ino == FUSE_ROOT_ID {
            reply.attr(&TTL, &self.root_attr());
            return;
        }

        match self.state.inodes.resolve(ino) {
            Some(Node::Category(category)) => {
                let exists = {
                    let registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.has_category(&category)
                };
                if exists {
                    reply.attr(&TTL, &self.synthetic_dir_attr(ino));
                } else {
                    reply.error(libc::ENOENT);
                }
            }
            Some(node) => {
                // Entry or CategoryEntry: the backing file is the truth.
                // Path-level visibility was enforced at lookup time.
                let name = node.filename().unwrap_or_default().to_string();
                match self.stat_backing(ino, &name) {
                    Some(attr) => reply.attr(&TTL, &attr),
                    None => reply.error(libc::ENOENT),
                }
            }
            None => reply.error(libc::ENOENT),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        if ino == FUSE_ROOT_ID {
            reply.error(libc::EPERM);
            return;
        }
        let name = match self.state.inodes.resolve(ino) {
            Some(Node::Category(_)) => {
                reply.error(libc::EPERM);
                return;
            }
            Some(node) => node.filename().unwrap_or_default().to_string(),
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };
        let real_path = self.state.backing_path(&name);

        if let Some(new_size) = size {
            let result = OpenOptions::new()
                .write(true)
                .open(&real_path)
                .and_then(|f| f.set_len(new_size));
            if let Err(e) = result {
                reply.error(Self::errno(&e));
                return;
            }
        }

        if let Some(new_mode) = mode {
            let perms = std::fs::Permissions::from_mode(new_mode);
            if let Err(e) = std::fs::set_permissions(&real_path, perms) {
                reply.error(Self::errno(&e));
                return;
            }
        }

        if uid.is_some() || gid.is_some() {
            let Some(c_path) = Self::c_path(&real_path) else {
                reply.error(libc::EINVAL);
                return;
            };
            let rc = unsafe {
                libc::chown(
                    c_path.as_ptr(),
                    uid.unwrap_or(u32::MAX),
                    gid.unwrap_or(u32::MAX),
                )
            };
            if rc != 0 {
                reply.error(Self::errno(&std::io::Error::last_os_error()));
                return;
            }
        }

        if atime.is_some() || mtime.is_some() {
            let resolve = |t: TimeOrNow| match t {
                TimeOrNow::SpecificTime(t) => t,
                TimeOrNow::Now => SystemTime::now(),
            };
            let mut times = std::fs::FileTimes::new();
            if let Some(t) = atime {
                times = times.set_accessed(resolve(t));
            }
            if let Some(t) = mtime {
                times = times.set_modified(resolve(t));
            }
            let result = OpenOptions::new()
                .write(true)
                .open(&real_path)
                .and_then(|f| f.set_times(times));
            if let Err(e) = result {
                reply.error(Self::errno(&e));
                return;
            }
        }

        match self.stat_backing(ino, &name) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &std::ffi::OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        if parent != FUSE_ROOT_ID {
            // No real directories inside synthetic ones.
            match self.state.inodes.resolve(parent) {
                Some(Node::Category(_)) => reply.error(libc::EPERM),
                _ => reply.error(libc::ENOENT),
            }
            return;
        }

        let exists_as_category = {
            let registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.has_category(name)
        };
        if exists_as_category {
            reply.error(libc::EEXIST);
            return;
        }

        let real_path = self.state.backing_path(name);
        if let Err(e) = std::fs::DirBuilder::new().mode(mode).create(&real_path) {
            reply.error(Self::errno(&e));
            return;
        }

        let ino = self.state.inodes.entry_inode(name);
        match self.stat_backing(ino, name) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::EIO),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &std::ffi::OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        let in_namespace = parent == FUSE_ROOT_ID
            || matches!(self.state.inodes.resolve(parent), Some(Node::Category(_)));
        if !in_namespace {
            reply.error(libc::ENOENT);
            return;
        }

        match std::fs::remove_file(self.state.backing_path(name)) {
            Ok(()) => {
                let mut registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                registry.forget(name);
                reply.ok();
            }
            Err(e) => reply.error(Self::errno(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &std::ffi::OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        if parent != FUSE_ROOT_ID {
            reply.error(libc::ENOENT);
            return;
        }

        use crate::registry::CategoryRemoval;
        let removal = {
            let mut registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.remove_category(name)
        };
        match removal {
            CategoryRemoval::Removed => reply.ok(),
            CategoryRemoval::NotEmpty => reply.error(libc::ENOTEMPTY),
            CategoryRemoval::NotFound => {
                match std::fs::remove_dir(self.state.backing_path(name)) {
                    Ok(()) => reply.ok(),
                    Err(e) => reply.error(Self::errno(&e)),
                }
            }
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &std::ffi::OsStr,
        newparent: u64,
        newname: &std::ffi::OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        if flags != 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let (Some(name), Some(newname)) = (name.to_str(), newname.to_str()) else {
            reply.error(libc::EINVAL);
            return;
        };

        let in_namespace = |ino: u64, inodes: &crate::core::InodeStore| {
            ino == FUSE_ROOT_ID || matches!(inodes.resolve(ino), Some(Node::Category(_)))
        };
        if !in_namespace(parent, &self.state.inodes) || !in_namespace(newparent, &self.state.inodes)
        {
            reply.error(libc::ENOENT);
            return;
        }

        match std::fs::rename(
            self.state.backing_path(name),
            self.state.backing_path(newname),
        ) {
            Ok(()) => {
                // Both the source and any overwritten target lose their
                // bindings; the renamed file surfaces at the root until its
                // next release re-enqueues it.
                let mut registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                registry.forget(name);
                registry.forget(newname);
                reply.ok();
            }
            Err(e) => reply.error(Self::errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        let (filename, root_origin) = match self.state.inodes.resolve(ino) {
            Some(Node::Entry(name)) => (name, true),
            Some(Node::CategoryEntry { name, .. }) => (name, false),
            Some(Node::Category(_)) => {
                reply.error(libc::EISDIR);
                return;
            }
            None => {
                reply.error(if ino == FUSE_ROOT_ID {
                    libc::EISDIR
                } else {
                    libc::ENOENT
                });
                return;
            }
        };

        match Self::open_options(flags).open(self.state.backing_path(&filename)) {
            Ok(file) => {
                let fh = self.register_handle(file, &filename, root_origin);
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(Self::errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &std::ffi::OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };

        let (ino, root_origin) = if parent == FUSE_ROOT_ID {
            (self.state.inodes.entry_inode(name), true)
        } else {
            match self.state.inodes.resolve(parent) {
                // Passthrough write from external tooling; the index is
                // not consulted and not altered.
                Some(Node::Category(category)) => {
                    (self.state.inodes.category_entry_inode(&category, name), false)
                }
                _ => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        };

        let file = match Self::open_options(flags)
            .create(true)
            .mode(mode & !umask)
            .open(self.state.backing_path(name))
        {
            Ok(file) => file,
            Err(e) => {
                reply.error(Self::errno(&e));
                return;
            }
        };

        // Root files join the vanish pipeline at creation time.
        if root_origin && !Bouncer::is_noise(name) {
            self.state.observe(name);
        }

        let attr = match file.metadata() {
            Ok(meta) => self.attr_from_metadata(ino, &meta),
            Err(e) => {
                reply.error(Self::errno(&e));
                return;
            }
        };
        let fh = self.register_handle(file, name, root_origin);
        reply.created(&TTL, &attr, 0, fh, 0);
    }

    fn read(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(handle) = self.handles.get(&fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let mut buffer = vec![0u8; size as usize];
        match handle.file.read_at(&mut buffer, offset as u64) {
            Ok(bytes) => reply.data(&buffer[..bytes]),
            Err(e) => reply.error(Self::errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(handle) = self.handles.get(&fh) else {
            reply.error(libc::EBADF);
            return;
        };
        match handle.file.write_at(data, offset as u64) {
            Ok(bytes) => reply.written(bytes as u32),
            Err(e) => reply.error(Self::errno(&e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        if let Some((_, handle)) = self.handles.remove(&fh) {
            let OpenHandle {
                file,
                filename,
                root_origin,
            } = handle;
            drop(file);
            if root_origin {
                self.vanish_on_release(&filename);
            }
        }
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        if ino == FUSE_ROOT_ID {
            reply.opened(0, 0);
            return;
        }
        match self.state.inodes.resolve(ino) {
            Some(Node::Category(category)) => {
                let exists = {
                    let registry = self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.has_category(&category)
                };
                if exists {
                    reply.opened(0, 0);
                } else {
                    reply.error(libc::ENOENT);
                }
            }
            Some(Node::Entry(name)) => {
                if self.state.backing_path(&name).is_dir() {
                    reply.opened(0, 0);
                } else {
                    reply.error(libc::ENOTDIR);
                }
            }
            Some(Node::CategoryEntry { .. }) => reply.error(libc::ENOTDIR),
            None => reply.error(libc::ENOENT),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let mut items: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (FUSE_ROOT_ID, FileType::Directory, "..".to_string()),
        ];

        if ino == FUSE_ROOT_ID {
            match self.state.visible_root_entries() {
                Ok(entries) => {
                    for (name, is_dir) in entries {
                        let is_category = is_dir && {
                            let registry =
                                self.state.registry.lock().unwrap_or_else(|e| e.into_inner());
                            registry.has_category(&name)
                        };
                        let (node_ino, kind) = if is_category {
                            (self.state.inodes.category_inode(&name), FileType::Directory)
                        } else {
                            let kind = if is_dir {
                                FileType::Directory
                            } else {
                                FileType::RegularFile
                            };
                            (self.state.inodes.entry_inode(&name), kind)
                        };
                        items.push((node_ino, kind, name));
                    }
                }
                Err(e) => {
                    tracing::error!("[Drive] Failed to list backing store: {}", e);
                    reply.error(libc::EIO);
                    return;
                }
            }
        } else {
            match self.state.inodes.resolve(ino) {
                Some(Node::Category(category)) => {
                    match self.state.visible_category_entries(&category) {
                        Some(files) => {
                            for name in files {
                                let entry_ino =
                                    self.state.inodes.category_entry_inode(&category, &name);
                                items.push((entry_ino, FileType::RegularFile, name));
                            }
                        }
                        None => {
                            reply.error(libc::ENOENT);
                            return;
                        }
                    }
                }
                Some(Node::Entry(name)) => {
                    // Legacy fallback: enumerate a real backing subdirectory.
                    let real_path = self.state.backing_path(&name);
                    let dirents = match std::fs::read_dir(&real_path) {
                        Ok(dirents) => dirents,
                        Err(e) => {
                            reply.error(Self::errno(&e));
                            return;
                        }
                    };
                    for dirent in dirents.flatten() {
                        let Ok(child) = dirent.file_name().into_string() else {
                            continue;
                        };
                        let kind = match dirent.file_type() {
                            Ok(t) if t.is_dir() => FileType::Directory,
                            _ => FileType::RegularFile,
                        };
                        let child_ino =
                            crate::core::InodeStore::hash_to_inode(&format!("/{name}/{child}"));
                        items.push((child_ino, kind, child));
                    }
                }
                _ => {
                    reply.error(libc::ENOTDIR);
                    return;
                }
            }
        }

        for (i, (entry_ino, kind, name)) in items.iter().enumerate().skip(offset as usize) {
            if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn access(&mut self, _req: &Request, ino: u64, mask: i32, reply: ReplyEmpty) {
        if ino == FUSE_ROOT_ID {
            reply.ok();
            return;
        }
        match self.state.inodes.resolve(ino) {
            // Synthetic directories are always accessible.
            Some(Node::Category(_)) => reply.ok(),
            Some(node) => {
                let name = node.filename().unwrap_or_default();
                let Some(c_path) = Self::c_path(&self.state.backing_path(name)) else {
                    reply.error(libc::EINVAL);
                    return;
                };
                if unsafe { libc::access(c_path.as_ptr(), mask) } == 0 {
                    reply.ok();
                } else {
                    reply.error(Self::errno(&std::io::Error::last_os_error()));
                }
            }
            None => reply.error(libc::ENOENT),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let Some(c_path) = Self::c_path(&self.state.backing_store) else {
            reply.error(libc::EINVAL);
            return;
        };
        let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
        if unsafe { libc::statvfs(c_path.as_ptr(), &mut st) } == 0 {
            reply.statfs(
                st.f_blocks as u64,
                st.f_bfree as u64,
                st.f_bavail as u64,
                st.f_files as u64,
                st.f_ffree as u64,
                st.f_bsize as u32,
                st.f_namemax as u32,
                st.f_frsize as u32,
            );
        } else {
            reply.error(Self::errno(&std::io::Error::last_os_error()));
        }
    }
}
