use std::path::Path;

use anyhow::{anyhow, Result};
use rocksdb::{ColumnFamily, DBRawIterator, Options, Snapshot, DB};

use crate::{KvStore, ReadView, ScanCursor};

/// One RocksDB database file with one column family per keyspace.
pub struct RocksStore {
    db: DB,
    keyspaces: Vec<String>,
}

/// Opens (or creates) a store at `path` with the given keyspaces. Automatic
/// compaction is disabled so the `compact` series measures the manual pass
/// the workload issues at the end.
pub fn open_store(path: &Path, keyspaces: &[String]) -> Result<Box<dyn KvStore>> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let mut cf_opts = Options::default();
    cf_opts.set_disable_auto_compactions(true);

    let cfs: Vec<(&str, Options)> = keyspaces
        .iter()
        .map(|ks| (ks.as_str(), cf_opts.clone()))
        .collect();
    let db = DB::open_cf_with_opts(&opts, path, cfs)?;
    Ok(Box::new(RocksStore {
        db,
        keyspaces: keyspaces.to_vec(),
    }))
}

impl RocksStore {
    fn cf(&self, keyspace: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(keyspace)
            .ok_or_else(|| anyhow!("unknown keyspace {keyspace:?}"))
    }
}

impl ReadView for RocksStore {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf(keyspace)?, key)?)
    }

    fn scan<'a>(&'a self, keyspace: &str) -> Result<Box<dyn ScanCursor + 'a>> {
        let mut iter = self.db.raw_iterator_cf(self.cf(keyspace)?);
        iter.seek_to_first();
        Ok(Box::new(RocksCursor(iter)))
    }
}

impl KvStore for RocksStore {
    fn store_type(&self) -> String {
        "rocksdb".to_string()
    }

    fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put_cf(self.cf(keyspace)?, key, value)?;
        Ok(())
    }

    fn delete(&self, keyspace: &str, key: &[u8]) -> Result<()> {
        self.db.delete_cf(self.cf(keyspace)?, key)?;
        Ok(())
    }

    fn snapshot<'a>(&'a self) -> Result<Box<dyn ReadView + 'a>> {
        Ok(Box::new(RocksSnapshot {
            snap: self.db.snapshot(),
            store: self,
        }))
    }

    fn commit(&self) -> Result<()> {
        for ks in &self.keyspaces {
            self.db.flush_cf(self.cf(ks)?)?;
        }
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        for ks in &self.keyspaces {
            self.db
                .compact_range_cf(self.cf(ks)?, None::<&[u8]>, None::<&[u8]>);
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        // dropping the DB closes the file handles
        Ok(())
    }
}

struct RocksSnapshot<'a> {
    snap: Snapshot<'a>,
    store: &'a RocksStore,
}

impl ReadView for RocksSnapshot<'_> {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.snap.get_cf(self.store.cf(keyspace)?, key)?)
    }

    fn scan<'b>(&'b self, keyspace: &str) -> Result<Box<dyn ScanCursor + 'b>> {
        let mut iter = self.snap.raw_iterator_cf(self.store.cf(keyspace)?);
        iter.seek_to_first();
        Ok(Box::new(RocksCursor(iter)))
    }
}

struct RocksCursor<'a>(DBRawIterator<'a>);

impl ScanCursor for RocksCursor<'_> {
    fn valid(&self) -> bool {
        self.0.valid()
    }

    fn entry(&self) -> Option<(&[u8], &[u8])> {
        self.0.key().zip(self.0.value())
    }

    fn advance(&mut self) {
        self.0.next();
    }
}
