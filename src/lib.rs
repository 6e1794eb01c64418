//! Storage-management core for a minimal single-file filesystem image.
//!
//! The crate provides block-addressed I/O against a flat backing file, a
//! bitmap free-space allocator shared between data blocks and inodes, and a
//! bounded in-core inode cache with reference-counted sharing. Directory
//! entries, path resolution, and file content I/O are left to callers, which
//! operate on raw blocks through [`ImageFs::read_block`] and
//! [`ImageFs::write_block`].
//!
//! # Layout
//! =========================================================================
//! | Inode bitmap | Data bitmap | Reserved | Inode table (4) | Data region |
//! =========================================================================
//!
//! All multi-byte on-disk integers are big endian.

mod alloc;
mod fs;
mod io;
mod node;

pub use crate::alloc::{Bitmap, State};
pub use crate::fs::{FsError, ImageFs};
pub use crate::io::{BlockNumber, BlockStorage, ImageFile};
pub use crate::node::{Handle, Inode};

/// The unit of all image I/O. 4k is a common file system block size, mapping
/// each block to 8 conventional 512-byte disk sectors.
pub const BLOCK_SIZE: usize = 4096;

/// Size of one on-disk inode record. A 4k block holds 64 records.
pub const INODE_SIZE: usize = 64;

/// Number of direct block-pointer slots in an inode record.
pub const INODE_PTR_COUNT: usize = 16;

/// Inode records per inode-table block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// Known locations.
pub const INODE_BITMAP_BLOCK: BlockNumber = 0;
pub const DATA_BITMAP_BLOCK: BlockNumber = 1;
pub const INODE_FIRST_BLOCK: BlockNumber = 3;

/// Blocks reserved for the inode table, giving 256 inodes total.
pub const INODE_TABLE_BLOCKS: usize = 4;

/// Capacity of the in-core inode cache. A hard bound: acquiring a slot when
/// every one is held fails rather than evicting.
pub const MAX_OPEN_INODES: usize = 64;
