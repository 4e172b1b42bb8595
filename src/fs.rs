//! FileSystem Module
//!
//! Maps textual paths onto namespaces and coordinates the file lifecycle.
//!
//! ## Persisted Layout
//! ```text
//! <root_bucket>/
//!   ├── atlasfs_version   →  u64 LE (format version)
//!   ├── inode_index       →  u64 LE (next inode id)
//!   ├── fs/               →  directory tree; files are stat records
//!   │     ├── foo         →  FileStat
//!   │     └── bar/
//!   │           └── baz   →  FileStat
//!   └── inodes/
//!         ├── <id 0>/     →  blocks of one file version
//!         └── <id 1>/
//! ```

use crate::config::Config;
use crate::block::BlockReader;
use crate::error::{FsError, Result};
use crate::file::{FileStat, ReadableFile, WritableFile};
use crate::kv::{Database, Lookup, Transaction, TreeDb};
use crate::path::BucketPath;

/// Current on-disk format version
pub const FS_VERSION: u64 = 1;

const VERSION_KEY: &[u8] = b"atlasfs_version";
const INODE_INDEX_KEY: &[u8] = b"inode_index";
const FS_KEY: &[u8] = b"fs";
const INODES_KEY: &[u8] = b"inodes";

/// A hierarchical file store inside one root bucket of a [`Database`]
pub struct FileSystem<D: Database = TreeDb> {
    db: D,
    root: BucketPath,
    block_size: u64,
}

impl<D: Database> FileSystem<D> {
    /// Attach to (or initialize) the filesystem under `config.root_bucket`
    ///
    /// Fails with `VersionMismatch` / `MalformedVersion` when the stored
    /// format marker does not match this build.
    pub fn mount(db: D, config: &Config) -> Result<Self> {
        if config.block_size == 0 {
            return Err(FsError::Config("block size must be at least 1".to_string()));
        }
        if config.root_bucket.is_empty() {
            return Err(FsError::Config("root bucket name must not be empty".to_string()));
        }

        let root = BucketPath::new([&config.root_bucket]);

        db.update(|tx| {
            let ns = root.ensure(tx)?;

            match tx.lookup(&ns, VERSION_KEY)? {
                Lookup::Value(data) => {
                    let bytes: [u8; 8] = data[..]
                        .try_into()
                        .map_err(|_| FsError::MalformedVersion { len: data.len() })?;
                    let found = u64::from_le_bytes(bytes);
                    if found != FS_VERSION {
                        return Err(FsError::VersionMismatch {
                            found,
                            expected: FS_VERSION,
                        });
                    }
                }
                Lookup::Absent => tx.put(&ns, VERSION_KEY, &FS_VERSION.to_le_bytes())?,
                Lookup::Namespace(_) => return Err(FsError::MalformedVersion { len: 0 }),
            }

            tx.create_if_absent(&ns, FS_KEY)?;
            tx.create_if_absent(&ns, INODES_KEY)?;
            Ok(())
        })?;

        tracing::info!(
            root = %root,
            block_size = config.block_size,
            version = FS_VERSION,
            "filesystem mounted"
        );
        Ok(Self {
            db,
            root,
            block_size: config.block_size,
        })
    }

    /// Start writing a new version of `name`
    ///
    /// The file (and any missing parent directories) appears when the returned
    /// handle is closed.
    pub fn create(&self, name: &str) -> Result<WritableFile<D>> {
        let (dirs, leaf) = split_name(name)?;
        let Some(leaf) = leaf else {
            return Err(FsError::IsDirectory(name.to_string()));
        };

        let inode = self.next_inode()?;
        tracing::debug!(file = name, inode = %inode, "file created");

        Ok(WritableFile::new(
            self.db.clone(),
            name,
            self.fs_path().join(&dirs),
            leaf,
            inode,
            self.block_size,
        ))
    }

    /// Open `name` for reading, or for listing if it is a directory
    ///
    /// `"/"` and names ending in `/` open the directory itself.
    pub fn open(&self, name: &str) -> Result<ReadableFile<D>> {
        let (dirs, leaf) = split_name(name)?;
        let tx = self.db.begin(false)?;

        let dir_path = self.fs_path().join(&dirs);
        let Some(dir_ns) = dir_path.resolve(&tx)? else {
            return Err(FsError::NotFound(name.to_string()));
        };

        let Some(leaf) = leaf else {
            let label = dirs.last().cloned().unwrap_or_else(|| "/".to_string());
            let cursor = tx.cursor(&dir_ns)?;
            return Ok(ReadableFile::directory(tx, FileStat::directory(label), cursor));
        };

        match tx.lookup(&dir_ns, leaf.as_bytes())? {
            Lookup::Namespace(ns) => {
                let cursor = tx.cursor(&ns)?;
                Ok(ReadableFile::directory(tx, FileStat::directory(leaf), cursor))
            }
            Lookup::Value(data) => {
                let stat = FileStat::decode(&data)?;
                let inode = stat
                    .inode
                    .clone()
                    .ok_or_else(|| FsError::Corrupt(format!("{}: stat record without inode", name)))?;
                let inode_ns = inode
                    .resolve(&tx)?
                    .ok_or_else(|| FsError::Corrupt(format!("{}: missing inode {}", name, inode)))?;

                let reader = BlockReader::new(tx.cursor(&inode_ns)?, stat.block_size, stat.len)?;
                tracing::debug!(file = name, inode = %inode, len = stat.len, "file opened");
                Ok(ReadableFile::regular(tx, stat, reader))
            }
            Lookup::Absent => Err(FsError::NotFound(name.to_string())),
        }
    }

    /// Reserve a fresh inode: bump the counter and create the namespace in one
    /// transaction, so concurrent creators never share an id
    fn next_inode(&self) -> Result<BucketPath> {
        self.db.update(|tx| {
            let root = self
                .root
                .resolve(&*tx)?
                .ok_or_else(|| FsError::Corrupt(format!("missing root bucket {}", self.root)))?;

            let id = match tx.lookup(&root, INODE_INDEX_KEY)? {
                Lookup::Absent => 0,
                Lookup::Value(data) => {
                    let bytes: [u8; 8] = data[..].try_into().map_err(|_| {
                        FsError::Corrupt(format!("inode counter is {} bytes", data.len()))
                    })?;
                    u64::from_le_bytes(bytes)
                }
                Lookup::Namespace(_) => {
                    return Err(FsError::Corrupt("inode counter is a namespace".to_string()))
                }
            };
            tx.put(&root, INODE_INDEX_KEY, &(id + 1).to_le_bytes())?;

            let inode = self.inodes_path().join([id.to_le_bytes()]);
            inode.create_leaf(tx)?;
            Ok(inode)
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Namespace mirroring the directory tree
    pub fn fs_path(&self) -> BucketPath {
        self.root.join([FS_KEY])
    }

    /// Namespace holding one child per inode
    pub fn inodes_path(&self) -> BucketPath {
        self.root.join([INODES_KEY])
    }

    pub fn root(&self) -> &BucketPath {
        &self.root
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn db(&self) -> &D {
        &self.db
    }
}

/// Split a slash-separated name into directory components and a leaf
///
/// The leaf is `None` when the name denotes a directory (empty, `/`, or a
/// final component that is empty or `.`). Empty and `.` components are
/// skipped; `..` is rejected.
pub fn split_name(name: &str) -> Result<(Vec<String>, Option<String>)> {
    let mut parts = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(FsError::InvalidArgument(format!(
                    "{}: parent references are not supported",
                    name
                )))
            }
            part => parts.push(part.to_string()),
        }
    }

    if matches!(name.rsplit('/').next(), Some("" | ".")) {
        return Ok((parts, None));
    }
    let leaf = parts.pop();
    Ok((parts, leaf))
}
