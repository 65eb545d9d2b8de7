pub mod rocks;
pub mod stats;
pub mod workload;

use anyhow::Result;

/// Read-side view of a store: either the live store or an opened snapshot.
pub trait ReadView {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Starts a full scan of one keyspace, positioned on the first entry.
    fn scan<'a>(&'a self, keyspace: &str) -> Result<Box<dyn ScanCursor + 'a>>;
}

/// One open database file of the engine under test, holding one or more
/// named keyspaces. The engine is a black box behind this trait; the harness
/// only issues calls and times them.
pub trait KvStore: ReadView {
    fn store_type(&self) -> String;

    fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&self, keyspace: &str, key: &[u8]) -> Result<()>;

    /// Opens a point-in-time read view; later writes are invisible to it.
    fn snapshot<'a>(&'a self) -> Result<Box<dyn ReadView + 'a>>;

    /// Durability barrier: flushes everything written so far.
    fn commit(&self) -> Result<()>;

    /// Requests a full manual compaction.
    fn compact(&self) -> Result<()>;

    fn close(&self) -> Result<()>;
}

/// Cursor over one keyspace in key order. End of the scan is signalled by
/// [`ScanCursor::valid`] going false, never by a timing sentinel.
pub trait ScanCursor {
    fn valid(&self) -> bool;

    /// Current entry, or `None` once the cursor is exhausted.
    fn entry(&self) -> Option<(&[u8], &[u8])>;

    fn advance(&mut self);
}
