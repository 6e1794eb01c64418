use log::{debug, info};
use thiserror::Error;

use crate::alloc::Bitmap;
use crate::io::{BlockNumber, BlockStorage};
use crate::node::{locate, Handle, Inode, InodeCache};
use crate::{
    BLOCK_SIZE, DATA_BITMAP_BLOCK, INODE_BITMAP_BLOCK, INODE_FIRST_BLOCK, INODE_TABLE_BLOCKS,
};

#[derive(Error, Debug)]
pub enum FsError {
    /// A seek, read, or write against the backing image failed or moved
    /// fewer bytes than one block.
    #[error("image i/o failed")]
    Io(#[from] std::io::Error),
    #[error("bit index {0} out of range for a one-block bitmap")]
    IndexOutOfRange(usize),
    #[error("no free data blocks")]
    NoFreeBlocks,
    #[error("no free inodes")]
    NoFreeInodes,
    #[error("in-core inode table full")]
    InodeTableFull,
}

/// The storage context for one filesystem image: the backing block device
/// plus the in-core inode cache. Every operation that touches bitmap or
/// inode state goes through this object, so two contexts over two images can
/// coexist in one process without sharing anything.
///
/// Single actor only: the context assumes one thread works the image at a
/// time, and nothing here locks or retries.
pub struct ImageFs<T: BlockStorage> {
    dev: T,
    cache: InodeCache,
}

impl<T: BlockStorage> ImageFs<T> {
    /// Formats the device and returns a context over it: both bitmaps and
    /// the inode table are zeroed, and the metadata region (bitmaps, the
    /// reserved block, the inode table) is marked used in the data bitmap so
    /// block allocation only ever hands out data-region blocks.
    pub fn create(mut dev: T) -> Result<Self, FsError> {
        let zeroes = [0u8; BLOCK_SIZE];
        dev.write_block(INODE_BITMAP_BLOCK, &zeroes)?;
        for i in 0..INODE_TABLE_BLOCKS {
            dev.write_block(INODE_FIRST_BLOCK + i, &zeroes)?;
        }

        let mut data_map = Bitmap::new();
        for blocknr in 0..INODE_FIRST_BLOCK + INODE_TABLE_BLOCKS {
            data_map.set(blocknr, true)?;
        }
        dev.write_block(DATA_BITMAP_BLOCK, data_map.serialize())?;
        dev.sync_disk()?;

        Ok(ImageFs {
            dev,
            cache: InodeCache::new(),
        })
    }

    /// Wraps an already-formatted device with an empty cache.
    pub fn open(dev: T) -> Self {
        ImageFs {
            dev,
            cache: InodeCache::new(),
        }
    }

    /// Returns ownership of the backing device to the caller.
    pub fn into_device(self) -> T {
        self.dev
    }

    /// Raw block read, for collaborators (directory layer, content I/O)
    /// working outside the inode metadata.
    pub fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> Result<(), FsError> {
        Ok(self.dev.read_block(blocknr, buf)?)
    }

    /// Raw block write. See [`read_block`](Self::read_block).
    pub fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> Result<(), FsError> {
        Ok(self.dev.write_block(blocknr, buf)?)
    }

    /// Picks the lowest free data block, marks it used, persists the bitmap,
    /// and returns its number. The block's prior content is left as is; the
    /// caller sees whatever bytes were there before.
    pub fn alloc_block(&mut self) -> Result<BlockNumber, FsError> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.dev.read_block(DATA_BITMAP_BLOCK, &mut buf)?;
        let mut map = Bitmap::parse(&buf);

        let blocknr = map.find_free().ok_or(FsError::NoFreeBlocks)?;
        map.set(blocknr, true)?;
        self.dev.write_block(DATA_BITMAP_BLOCK, map.serialize())?;

        info!("allocated data block {}", blocknr);
        Ok(blocknr)
    }

    /// Allocates the lowest free inode number and returns a handle to its
    /// freshly zeroed, immediately persisted in-core inode. The returned
    /// slot always carries exactly one claim: any claim a caller somehow
    /// held on the still-unallocated number is superseded by the rebind.
    ///
    /// The cache slot is bound before the bitmap write lands; an
    /// interruption between the two steps leaves the bitmap and the inode
    /// table inconsistent. A known gap, inherited from the on-disk format
    /// having no transaction story. The bitmap also tracks more numbers
    /// (32768) than the table holds records for (256); allocation past the
    /// table's capacity would address blocks in the data region.
    pub fn alloc_inode(&mut self) -> Result<Handle, FsError> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.dev.read_block(INODE_BITMAP_BLOCK, &mut buf)?;
        let mut map = Bitmap::parse(&buf);

        let inode_num = map.find_free().ok_or(FsError::NoFreeInodes)? as u32;

        // The number is logically unused, so this load pulls whatever stale
        // bytes occupy the on-disk slot; they are overwritten below.
        let handle = self.acquire(inode_num)?;

        map.set(inode_num as usize, true)?;
        self.dev.write_block(INODE_BITMAP_BLOCK, map.serialize())?;

        // Rebind rather than mutate in place: the slot ends up with zeroed
        // fields and a reference count of exactly one, even if the number
        // was already cached.
        self.cache.bind(&handle, inode_num, Inode::zeroed());
        self.write_inode(inode_num, &Inode::zeroed())?;

        info!("allocated inode {}", inode_num);
        Ok(handle)
    }

    /// Hands out a claim on the in-core inode for `inode_num`, loading it
    /// from disk on first acquisition. Callers holding claims on the same
    /// number share one slot and observe each other's in-place mutations.
    ///
    /// # Errors
    ///
    /// Fails with [`FsError::InodeTableFull`] when the number is not yet
    /// cached and every slot is held. The capacity is a hard bound; nothing
    /// is evicted.
    pub fn acquire(&mut self, inode_num: u32) -> Result<Handle, FsError> {
        if let Some(handle) = self.cache.find_bound(inode_num) {
            self.cache.retain(&handle);
            return Ok(handle);
        }

        let handle = self.cache.find_free().ok_or(FsError::InodeTableFull)?;
        let node = self.read_inode(inode_num)?;
        self.cache.bind(&handle, inode_num, node);
        debug!("loaded inode {} into slot {}", inode_num, handle.0);
        Ok(handle)
    }

    /// Gives up a claim. Dropping the last claim on a slot unconditionally
    /// flushes its current fields to disk (there is no dirty tracking) and
    /// frees the slot. Releasing a slot that is already free is a no-op, not
    /// an error.
    pub fn release(&mut self, handle: Handle) -> Result<(), FsError> {
        if self.cache.unref(&handle) {
            let inode_num = self.cache.inode_num(&handle);
            let node = *self.cache.get(&handle);
            self.write_inode(inode_num, &node)?;
            debug!("flushed inode {} on final release", inode_num);
        }
        Ok(())
    }

    /// Forcibly frees every cache slot without flushing. Test and setup
    /// re-initialization only.
    pub fn reset_all(&mut self) {
        self.cache.reset_all();
    }

    /// The live fields of a held inode.
    pub fn inode(&self, handle: &Handle) -> &Inode {
        self.cache.get(handle)
    }

    /// Mutable access to the live fields of a held inode. Changes become
    /// durable when the last claim is released.
    pub fn inode_mut(&mut self, handle: &Handle) -> &mut Inode {
        self.cache.get_mut(handle)
    }

    /// The inode number a held slot is bound to.
    pub fn inode_num(&self, handle: &Handle) -> u32 {
        self.cache.inode_num(handle)
    }

    /// How many claims are currently held on the slot.
    pub fn ref_count(&self, handle: &Handle) -> u32 {
        self.cache.ref_count(handle)
    }

    fn read_inode(&mut self, inode_num: u32) -> Result<Inode, FsError> {
        let (blocknr, slot) = locate(inode_num);
        let mut block = [0u8; BLOCK_SIZE];
        self.dev.read_block(blocknr, &mut block)?;
        Ok(Inode::decode(&block, slot))
    }

    /// Read-modify-write of the record's inode-table block, leaving the 63
    /// sibling records intact.
    fn write_inode(&mut self, inode_num: u32, node: &Inode) -> Result<(), FsError> {
        let (blocknr, slot) = locate(inode_num);
        let mut block = [0u8; BLOCK_SIZE];
        self.dev.read_block(blocknr, &mut block)?;
        node.encode(&mut block, slot);
        self.dev.write_block(blocknr, &block)?;
        Ok(())
    }
}
