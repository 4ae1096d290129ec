mod inode;

pub(crate) use inode::InodeCache;
