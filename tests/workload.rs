//! Drives the full workload against an in-memory store so the harness
//! plumbing can be checked without touching disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use benchkv::stats::SeriesSet;
use benchkv::workload::{self, WorkloadConfig, ST_COMMIT, ST_COMPACT, ST_DEL, ST_GET, ST_ITR_CLOSE, ST_ITR_INIT, ST_SET, ST_SNAP_OPEN};
use benchkv::{KvStore, ReadView, ScanCursor};

type Keyspaces = BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>;

struct MemStore {
    keyspaces: RefCell<Keyspaces>,
}

impl MemStore {
    fn open(names: &[String]) -> Box<dyn KvStore> {
        let mut keyspaces = Keyspaces::new();
        for name in names {
            keyspaces.insert(name.clone(), BTreeMap::new());
        }
        Box::new(MemStore {
            keyspaces: RefCell::new(keyspaces),
        })
    }

    fn with_ks<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut BTreeMap<Vec<u8>, Vec<u8>>) -> T,
    ) -> Result<T> {
        let mut kss = self.keyspaces.borrow_mut();
        let ks = kss
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown keyspace {name:?}"))?;
        Ok(f(ks))
    }
}

struct MemCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    idx: usize,
}

impl ScanCursor for MemCursor {
    fn valid(&self) -> bool {
        self.idx < self.entries.len()
    }

    fn entry(&self) -> Option<(&[u8], &[u8])> {
        self.entries
            .get(self.idx)
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    fn advance(&mut self) {
        self.idx += 1;
    }
}

fn scan_copy(keyspaces: &Keyspaces, name: &str) -> Result<Box<dyn ScanCursor>> {
    let ks = keyspaces
        .get(name)
        .ok_or_else(|| anyhow!("unknown keyspace {name:?}"))?;
    Ok(Box::new(MemCursor {
        entries: ks.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        idx: 0,
    }))
}

impl ReadView for MemStore {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_ks(keyspace, |ks| ks.get(key).cloned())
    }

    fn scan<'a>(&'a self, keyspace: &str) -> Result<Box<dyn ScanCursor + 'a>> {
        scan_copy(&self.keyspaces.borrow(), keyspace)
    }
}

struct MemSnapshot {
    keyspaces: Keyspaces,
}

impl ReadView for MemSnapshot {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .keyspaces
            .get(keyspace)
            .ok_or_else(|| anyhow!("unknown keyspace {keyspace:?}"))?
            .get(key)
            .cloned())
    }

    fn scan<'a>(&'a self, keyspace: &str) -> Result<Box<dyn ScanCursor + 'a>> {
        scan_copy(&self.keyspaces, keyspace)
    }
}

impl KvStore for MemStore {
    fn store_type(&self) -> String {
        "mem".to_string()
    }

    fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_ks(keyspace, |ks| {
            ks.insert(key.to_vec(), value.to_vec());
        })
    }

    fn delete(&self, keyspace: &str, key: &[u8]) -> Result<()> {
        self.with_ks(keyspace, |ks| {
            ks.remove(key);
        })
    }

    fn snapshot<'a>(&'a self) -> Result<Box<dyn ReadView + 'a>> {
        Ok(Box::new(MemSnapshot {
            keyspaces: self.keyspaces.borrow().clone(),
        }))
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn small_config() -> WorkloadConfig {
    WorkloadConfig {
        nfiles: 2,
        nkeyspaces: 2,
        nloops: 2,
        seq_docs: 10,
        key_size: 16,
        permuted_bytes: 3,
        body_size: 64,
    }
}

fn run_small() -> SeriesSet {
    let cfg = small_config();
    workload::run(&cfg, Path::new("unused"), &|_path, names| {
        Ok(MemStore::open(names))
    })
    .unwrap()
}

#[test]
fn workload_records_every_operation_category() {
    let stats = run_small();
    for name in [
        ST_SET,
        ST_GET,
        ST_DEL,
        ST_SNAP_OPEN,
        ST_COMMIT,
        ST_COMPACT,
        ST_ITR_INIT,
        ST_ITR_CLOSE,
    ] {
        let series = stats
            .iter()
            .find(|s| s.name() == name)
            .unwrap_or_else(|| panic!("missing series {name}"));
        assert!(!series.is_empty(), "series {name} has no samples");
    }
}

#[test]
fn workload_sample_counts_are_consistent() {
    let cfg = small_config();
    let stats = run_small();

    let count = |name: &str| {
        stats
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.len())
            .unwrap_or(0)
    };

    // every opened scan is also closed
    assert_eq!(count(ST_ITR_INIT), count(ST_ITR_CLOSE));
    // every phase deletes only the sequential subset of what it wrote
    assert!(count(ST_SET) > count(ST_DEL));
    // one compaction sample per database file
    assert_eq!(count(ST_COMPACT), cfg.nfiles);
    // commits: one for the first file plus one per file, each pass
    assert_eq!(count(ST_COMMIT), cfg.nloops * (1 + cfg.nfiles));
}

#[test]
fn snapshot_view_is_frozen() {
    let names = vec!["db0".to_string()];
    let store = MemStore::open(&names);
    store.put("db0", b"a", b"1").unwrap();
    let snap = store.snapshot().unwrap();
    store.put("db0", b"b", b"2").unwrap();

    assert_eq!(snap.get("db0", b"b").unwrap(), None);
    let mut cursor = snap.scan("db0").unwrap();
    assert!(cursor.valid());
    assert_eq!(cursor.entry().unwrap().0, b"a");
    cursor.advance();
    assert!(!cursor.valid());
    assert_eq!(cursor.entry(), None);
}
