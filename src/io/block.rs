/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockNumber = usize;

/// Fixed-size block transfer against a byte-addressable backing store.
///
/// Every call is a fresh positioned transfer; implementations perform no
/// caching or write coalescing, so a read immediately after a write observes
/// the written bytes.
pub trait BlockStorage {
    /// Reads block number `blocknr` into the first block's worth of `buf`.
    ///
    /// # Errors
    ///
    /// Fails if the position cannot be set or fewer bytes than one block are
    /// available at that position.
    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()>;

    /// Writes the first block's worth of `buf` to block number `blocknr`.
    ///
    /// # Errors
    ///
    /// Fails if the position cannot be set or the full block cannot be
    /// written. Failures here surface to the caller so a lost metadata write
    /// is never silent.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes any buffered disk IO from memory. This is useful if it must be
    /// guaranteed the disk writes actually occurred, for instance, if being
    /// re-read from disk.
    fn sync_disk(&mut self) -> std::io::Result<()>;
}
