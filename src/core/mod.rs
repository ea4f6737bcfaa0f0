//! Core module - namespace plumbing shared by all organs
//!
//! - inode <-> virtual node mapping for the kernel surface
//! - the Bouncer (ignored-name policy)
//! - identity capture for synthetic attributes and mount options

pub mod bouncer;
pub mod inode_store;
pub mod permissions;

pub use bouncer::Bouncer;
pub use inode_store::{InodeStore, Node};
pub use permissions::Identity;
