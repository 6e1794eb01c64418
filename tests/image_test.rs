use imagefs::{
    Bitmap, ImageFile, ImageFs, BLOCK_SIZE, DATA_BITMAP_BLOCK, INODE_BITMAP_BLOCK,
};
use tempfile::NamedTempFile;

#[test]
fn allocation_state_survives_reopen() {
    let tf = NamedTempFile::new().unwrap();

    // Format the image and claim one block and one inode.
    let dev = ImageFile::open(tf.path(), true).unwrap();
    let mut fs = ImageFs::create(dev).unwrap();
    let blocknr = fs.alloc_block().unwrap();
    let handle = fs.alloc_inode().unwrap();
    let inode_num = fs.inode_num(&handle);
    fs.release(handle).unwrap();

    // A second context over the same file sees both marks on disk.
    let dev = ImageFile::open(tf.path(), false).unwrap();
    let mut fs = ImageFs::open(dev);

    let mut buf = [0u8; BLOCK_SIZE];
    fs.read_block(DATA_BITMAP_BLOCK, &mut buf).unwrap();
    assert_eq!(Bitmap::parse(&buf).find_free(), Some(blocknr + 1));

    fs.read_block(INODE_BITMAP_BLOCK, &mut buf).unwrap();
    assert_eq!(Bitmap::parse(&buf).find_free(), Some(inode_num as usize + 1));
}

#[test]
fn inode_metadata_survives_reopen() {
    let tf = NamedTempFile::new().unwrap();

    let dev = ImageFile::open(tf.path(), true).unwrap();
    let mut fs = ImageFs::create(dev).unwrap();

    let handle = fs.alloc_inode().unwrap();
    let inode_num = fs.inode_num(&handle);
    {
        let node = fs.inode_mut(&handle);
        node.size = 8192;
        node.owner_id = 1000;
        node.permissions = 0xa4;
        node.link_count = 1;
        node.block_ptrs[0] = 9;
        node.block_ptrs[1] = 10;
    }
    fs.release(handle).unwrap();

    let dev = ImageFile::open(tf.path(), false).unwrap();
    let mut fs = ImageFs::open(dev);
    let handle = fs.acquire(inode_num).unwrap();
    let node = *fs.inode(&handle);
    assert_eq!(node.size, 8192);
    assert_eq!(node.owner_id, 1000);
    assert_eq!(node.link_count, 1);
    assert_eq!(&node.block_ptrs[..3], &[9, 10, 0]);
    fs.release(handle).unwrap();
}

#[test]
fn data_written_to_an_allocated_block_reads_back() {
    let tf = NamedTempFile::new().unwrap();

    let dev = ImageFile::open(tf.path(), true).unwrap();
    let mut fs = ImageFs::create(dev).unwrap();

    let blocknr = fs.alloc_block().unwrap();
    let pattern: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i * 7 % 251) as u8).collect();
    fs.write_block(blocknr, &pattern).unwrap();

    let mut read_back = vec![0u8; BLOCK_SIZE];
    fs.read_block(blocknr, &mut read_back).unwrap();
    assert_eq!(read_back, pattern);
}
