//! File Module
//!
//! Binds logical files to inode namespaces and stat records.
//!
//! ## Responsibilities
//! - The stat record and its codec (`FileStat`)
//! - Write path: chunk, persist, then publish the stat record (`WritableFile`)
//! - Read path: snapshot-backed reads, seeks and directory listings (`ReadableFile`)

mod readable;
mod stat;
mod writable;

pub use readable::ReadableFile;
pub use stat::FileStat;
pub use writable::WritableFile;
