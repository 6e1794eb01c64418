use crate::io::BlockNumber;
use crate::{INODES_PER_BLOCK, INODE_FIRST_BLOCK, INODE_PTR_COUNT, INODE_SIZE, MAX_OPEN_INODES};

/// The persisted fields of one inode. The on-disk record is 64 bytes:
///
/// | offset | field        | width |
/// |--------|--------------|-------|
/// | 0      | size         | 4     |
/// | 4      | owner id     | 2     |
/// | 6      | permissions  | 1     |
/// | 7      | flags        | 1     |
/// | 8      | link count   | 1     |
/// | 9..    | block ptrs   | 2 × 16|
///
/// Multi-byte fields are big endian. The remainder of the record up to 64
/// bytes is unused padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    /// The total size of the stored object in bytes.
    pub size: u32,
    /// The id of the owning user.
    pub owner_id: u16,
    /// Stored permission bits. Nothing in this core enforces them.
    pub permissions: u8,
    pub flags: u8,
    /// The number of links to this object.
    pub link_count: u8,
    /// Direct pointers to the data blocks that belong to the object.
    pub block_ptrs: [u16; INODE_PTR_COUNT],
}

impl Inode {
    /// The freshly-allocated state: every field at its zero value.
    pub fn zeroed() -> Self {
        Inode {
            size: 0,
            owner_id: 0,
            permissions: 0,
            flags: 0,
            link_count: 0,
            block_ptrs: [0; INODE_PTR_COUNT],
        }
    }

    /// Reads the record at `slot` out of an inode-table block.
    pub fn decode(block: &[u8], slot: usize) -> Self {
        let rec = &block[slot * INODE_SIZE..(slot + 1) * INODE_SIZE];
        let mut block_ptrs = [0u16; INODE_PTR_COUNT];
        for (i, ptr) in block_ptrs.iter_mut().enumerate() {
            let at = 9 + i * 2;
            *ptr = u16::from_be_bytes(rec[at..at + 2].try_into().unwrap());
        }

        Inode {
            size: u32::from_be_bytes(rec[0..4].try_into().unwrap()),
            owner_id: u16::from_be_bytes(rec[4..6].try_into().unwrap()),
            permissions: rec[6],
            flags: rec[7],
            link_count: rec[8],
            block_ptrs,
        }
    }

    /// Writes this record into `slot` of an inode-table block, leaving the
    /// rest of the block untouched.
    pub fn encode(&self, block: &mut [u8], slot: usize) {
        let rec = &mut block[slot * INODE_SIZE..(slot + 1) * INODE_SIZE];
        rec[0..4].copy_from_slice(&self.size.to_be_bytes());
        rec[4..6].copy_from_slice(&self.owner_id.to_be_bytes());
        rec[6] = self.permissions;
        rec[7] = self.flags;
        rec[8] = self.link_count;
        for (i, ptr) in self.block_ptrs.iter().enumerate() {
            let at = 9 + i * 2;
            rec[at..at + 2].copy_from_slice(&ptr.to_be_bytes());
        }
    }
}

/// Maps an inode number to its inode-table block and record slot within that
/// block.
pub fn locate(inode_num: u32) -> (BlockNumber, usize) {
    let num = inode_num as usize;
    (
        INODE_FIRST_BLOCK + num / INODES_PER_BLOCK,
        num % INODES_PER_BLOCK,
    )
}

/// A claim on one in-core inode slot. Handles are deliberately neither `Copy`
/// nor `Clone`: releasing consumes the claim, so a recycled slot can never be
/// reached through a stale handle. Acquiring the same inode twice yields two
/// independent handles to the same slot.
#[derive(Debug, PartialEq, Eq)]
pub struct Handle(pub(crate) usize);

#[derive(Clone, Copy)]
struct Slot {
    node: Inode,
    // In-core only, never persisted.
    inode_num: u32,
    ref_count: u32,
}

impl Slot {
    fn free() -> Self {
        Slot {
            node: Inode::zeroed(),
            inode_num: 0,
            ref_count: 0,
        }
    }
}

/// Bounded pool of in-core inode slots. A slot with a positive reference
/// count is bound to exactly one inode number; a slot at zero is free and may
/// be rebound to any number. Capacity is a hard limit; there is no eviction.
///
/// The cache holds no device handle; loading and flushing records is the
/// caller's job ([`crate::ImageFs`] drives both sides).
pub struct InodeCache {
    slots: Vec<Slot>,
}

impl InodeCache {
    pub fn new() -> Self {
        InodeCache {
            slots: vec![Slot::free(); MAX_OPEN_INODES],
        }
    }

    /// Finds the slot currently bound to `inode_num`, if any. At most one
    /// slot can match.
    pub fn find_bound(&self, inode_num: u32) -> Option<Handle> {
        self.slots
            .iter()
            .position(|slot| slot.ref_count > 0 && slot.inode_num == inode_num)
            .map(Handle)
    }

    /// Finds any free slot.
    pub fn find_free(&self) -> Option<Handle> {
        self.slots
            .iter()
            .position(|slot| slot.ref_count == 0)
            .map(Handle)
    }

    /// Binds a free slot to `inode_num` with the given fields and a reference
    /// count of one.
    pub(crate) fn bind(&mut self, handle: &Handle, inode_num: u32, node: Inode) {
        self.slots[handle.0] = Slot {
            node,
            inode_num,
            ref_count: 1,
        };
    }

    /// Registers one more holder of an already-bound slot.
    pub(crate) fn retain(&mut self, handle: &Handle) {
        self.slots[handle.0].ref_count += 1;
    }

    /// Drops one holder. Returns true when this drop was the last one and
    /// the slot's fields must be flushed; returns false both while other
    /// holders remain and when the slot was already free (releasing a free
    /// slot is defined as a no-op).
    pub(crate) fn unref(&mut self, handle: &Handle) -> bool {
        let slot = &mut self.slots[handle.0];
        if slot.ref_count == 0 {
            return false;
        }
        slot.ref_count -= 1;
        slot.ref_count == 0
    }

    pub fn get(&self, handle: &Handle) -> &Inode {
        &self.slots[handle.0].node
    }

    pub fn get_mut(&mut self, handle: &Handle) -> &mut Inode {
        &mut self.slots[handle.0].node
    }

    pub fn inode_num(&self, handle: &Handle) -> u32 {
        self.slots[handle.0].inode_num
    }

    pub fn ref_count(&self, handle: &Handle) -> u32 {
        self.slots[handle.0].ref_count
    }

    /// Forcibly frees every slot without flushing anything. Meant for test
    /// and setup re-initialization, never for normal operation.
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.ref_count = 0;
        }
    }
}

impl Default for InodeCache {
    fn default() -> Self {
        InodeCache::new()
    }
}
