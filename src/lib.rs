//! MagicFolder: Self-Organizing Overlay Filesystem
//!
//! A single-process binary implementing three isolated "Organs":
//! - Magic Drive (FUSE loop - synchronous, never waits on the brain)
//! - Courier (background worker - batches files out to the classifier)
//! - Brain Client (request/reply IPC to the external classifier process)
//!
//! Files written to the mount root vanish from the listing, ride a batch
//! to the brain, and reappear under synthetic category directories. The
//! backing store stays a flat bag of bytes; the organization is an
//! in-memory overlay.

pub mod brain;
pub mod core;
pub mod courier;
pub mod drive;
pub mod error;
pub mod queue;
pub mod registry;
pub mod state;

pub use brain::{BrainClient, BRAIN_SOCKET};
pub use courier::{Courier, DEBOUNCE};
pub use drive::MagicDrive;
pub use error::{FolderError, Result};
pub use queue::PendingQueue;
pub use registry::{CategoryRemoval, FileRecord, Registry};
pub use state::{FolderState, SharedState};
