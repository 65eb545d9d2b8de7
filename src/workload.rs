//! Synthetic workload phases driven against the engine under test.
//!
//! Every operation category is timed at the call site and recorded into a
//! per-run [`SeriesSet`]; the runs are merged into one set only after the
//! last run finishes.

use std::path::Path;
use std::time::Instant;

use anyhow::{ensure, Result};
use log::info;

use crate::stats::SeriesSet;
use crate::{KvStore, ReadView};

pub const ST_SET: &str = "set";
pub const ST_GET: &str = "get";
pub const ST_DEL: &str = "del";
pub const ST_SNAP_OPEN: &str = "snap_open";
pub const ST_COMMIT: &str = "commit";
pub const ST_COMPACT: &str = "compact";
pub const ST_ITR_INIT: &str = "itr_init";
pub const ST_ITR_GET: &str = "itr_get";
pub const ST_ITR_NEXT: &str = "itr_next";
pub const ST_ITR_CLOSE: &str = "itr_close";

/// Opens one database file at the given path with the given keyspaces.
pub type StoreFactory = dyn Fn(&Path, &[String]) -> Result<Box<dyn KvStore>>;

#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Database files to open.
    pub nfiles: usize,
    /// Keyspaces per file.
    pub nkeyspaces: usize,
    /// Full passes over all phases.
    pub nloops: usize,
    /// Sequential documents written per keyspace per pass.
    pub seq_docs: usize,
    /// Bytes per key.
    pub key_size: usize,
    /// Leading key bytes permuted by the permutation writer; each writer
    /// call emits `permuted_bytes!` distinct keys.
    pub permuted_bytes: usize,
    /// Bytes per document body.
    pub body_size: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            nfiles: 16,
            nkeyspaces: 16,
            nloops: 5,
            seq_docs: 1000,
            key_size: 32,
            permuted_bytes: 4,
            body_size: 1024,
        }
    }
}

const ALPHANUM: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Fills the buffer with the alphanumeric alphabet, repeated.
pub fn fill_alphanum(buf: &mut [u8]) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = ALPHANUM[i % ALPHANUM.len()];
    }
}

fn alphanum_body(len: usize) -> Vec<u8> {
    let mut body = vec![0u8; len];
    fill_alphanum(&mut body);
    body
}

/// Visits every permutation of `key[l..=r]`, restoring the buffer between
/// visits.
pub fn for_each_permutation(
    key: &mut [u8],
    l: usize,
    r: usize,
    visit: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    if l == r {
        return visit(key);
    }
    for i in l..=r {
        key.swap(l, i);
        for_each_permutation(key, l + 1, r, visit)?;
        key.swap(l, i); // backtrack
    }
    Ok(())
}

fn elapsed_us(start: Instant) -> Option<u64> {
    Some(start.elapsed().as_micros() as u64)
}

fn seq_key(pos: usize, i: usize) -> Vec<u8> {
    format!("{pos}_{i}seqkey").into_bytes()
}

/// Writes the permuted key set followed by the sequential key set into one
/// keyspace.
fn writer(
    store: &dyn KvStore,
    keyspace: &str,
    pos: usize,
    cfg: &WorkloadConfig,
    stats: &mut SeriesSet,
) -> Result<()> {
    let body = alphanum_body(cfg.body_size);

    if cfg.permuted_bytes > 0 {
        let mut key = vec![0u8; cfg.key_size];
        fill_alphanum(&mut key);
        let last = cfg.permuted_bytes - 1;
        for_each_permutation(&mut key, 0, last, &mut |key| {
            let start = Instant::now();
            store.put(keyspace, key, &body)?;
            stats.series_mut(ST_SET).record(elapsed_us(start));
            Ok(())
        })?;
    }

    for i in 0..cfg.seq_docs {
        let key = seq_key(pos, i);
        let start = Instant::now();
        store.put(keyspace, &key, &body)?;
        stats.series_mut(ST_SET).record(elapsed_us(start));
    }
    Ok(())
}

/// Deletes the sequential key set from one keyspace.
fn deletes(
    store: &dyn KvStore,
    keyspace: &str,
    pos: usize,
    cfg: &WorkloadConfig,
    stats: &mut SeriesSet,
) -> Result<()> {
    for i in 0..cfg.seq_docs {
        let key = seq_key(pos, i);
        let start = Instant::now();
        store.delete(keyspace, &key)?;
        stats.series_mut(ST_DEL).record(elapsed_us(start));
    }
    Ok(())
}

/// Full scan of one keyspace with a point read of every scanned key,
/// timing cursor open, entry access, advance and close separately.
fn reader<V: ReadView + ?Sized>(view: &V, keyspace: &str, stats: &mut SeriesSet) -> Result<()> {
    let start = Instant::now();
    let mut cursor = view.scan(keyspace)?;
    stats.series_mut(ST_ITR_INIT).record(elapsed_us(start));

    while cursor.valid() {
        let start = Instant::now();
        let key = cursor.entry().map(|(k, _)| k.to_vec());
        stats.series_mut(ST_ITR_GET).record(elapsed_us(start));

        if let Some(key) = key {
            let start = Instant::now();
            view.get(keyspace, &key)?;
            stats.series_mut(ST_GET).record(elapsed_us(start));
        }

        let start = Instant::now();
        cursor.advance();
        stats.series_mut(ST_ITR_NEXT).record(elapsed_us(start));
    }

    let start = Instant::now();
    drop(cursor);
    stats.series_mut(ST_ITR_CLOSE).record(elapsed_us(start));
    Ok(())
}

/// Opens a snapshot of the store and scans one keyspace through it.
fn snapshot_reader(
    store: &dyn KvStore,
    keyspace: &str,
    stats: &mut SeriesSet,
) -> Result<()> {
    let start = Instant::now();
    let snap = store.snapshot()?;
    stats.series_mut(ST_SNAP_OPEN).record(elapsed_us(start));
    reader(snap.as_ref(), keyspace, stats)
}

fn commit(store: &dyn KvStore, stats: &mut SeriesSet) -> Result<()> {
    let start = Instant::now();
    store.commit()?;
    stats.series_mut(ST_COMMIT).record(elapsed_us(start));
    Ok(())
}

/// Runs the full benchmark: opens `nfiles` database files with `nkeyspaces`
/// keyspaces each, drives `nloops` workload passes, compacts every file, and
/// returns the merged statistics.
pub fn run(cfg: &WorkloadConfig, root: &Path, open: &StoreFactory) -> Result<SeriesSet> {
    ensure!(
        cfg.nfiles > 0 && cfg.nkeyspaces > 0,
        "need at least one file and one keyspace"
    );
    ensure!(
        cfg.permuted_bytes <= cfg.key_size,
        "permuted_bytes cannot exceed key_size"
    );
    let total = cfg.nfiles * cfg.nkeyspaces;
    let mut stores: Vec<Box<dyn KvStore>> = Vec::with_capacity(cfg.nfiles);
    // keyspaces are numbered globally; keyspace j lives in file j / nkeyspaces
    let mut handles: Vec<(usize, String)> = Vec::with_capacity(total);

    for file in 0..cfg.nfiles {
        let names: Vec<String> = (file * cfg.nkeyspaces..(file + 1) * cfg.nkeyspaces)
            .map(|j| format!("db{j}"))
            .collect();
        let store = open(&root.join(format!("bench{file}")), &names)?;
        for name in &names {
            handles.push((file, name.clone()));
        }
        stores.push(store);
    }
    info!(
        "opened {} file(s) x {} keyspace(s) ({})",
        cfg.nfiles,
        cfg.nkeyspaces,
        stores[0].store_type()
    );

    // initial commit headers
    for store in &stores {
        store.commit()?;
    }

    let mut runs: Vec<SeriesSet> = Vec::with_capacity(cfg.nloops);
    for pass in 0..cfg.nloops {
        info!("pass {}/{}", pass + 1, cfg.nloops);
        let mut stats = SeriesSet::new();
        run_pass(cfg, &stores, &handles, &mut stats)?;
        runs.push(stats);
    }

    let mut all = SeriesSet::new();
    for run in runs {
        all.absorb(run);
    }

    info!("compacting {} file(s)", stores.len());
    for store in &stores {
        let start = Instant::now();
        store.compact()?;
        all.series_mut(ST_COMPACT).record(elapsed_us(start));
    }
    for store in &stores {
        store.close()?;
    }
    Ok(all)
}

/// One pass over every phase, mirroring the classic single-file /
/// multi-keyspace / multi-file progression.
fn run_pass(
    cfg: &WorkloadConfig,
    stores: &[Box<dyn KvStore>],
    handles: &[(usize, String)],
    stats: &mut SeriesSet,
) -> Result<()> {
    let nks = cfg.nkeyspaces;
    let store_of = |j: usize| stores[handles[j].0].as_ref();
    let ks_of = |j: usize| handles[j].1.as_str();

    // single file, single keyspace
    writer(store_of(0), ks_of(0), 0, cfg, stats)?;
    reader(store_of(0), ks_of(0), stats)?;
    snapshot_reader(store_of(0), ks_of(0), stats)?;

    // single file, every keyspace
    for j in 0..nks {
        writer(store_of(j), ks_of(j), j, cfg, stats)?;
    }
    for j in 0..nks {
        deletes(store_of(j), ks_of(j), j, cfg, stats)?;
    }
    for j in 0..nks {
        reader(store_of(j), ks_of(j), stats)?;
    }
    for j in 0..nks {
        snapshot_reader(store_of(j), ks_of(j), stats)?;
    }

    // commit the first file
    commit(stores[0].as_ref(), stats)?;

    // one keyspace per file across every file
    let total = handles.len();
    for j in (0..total).step_by(nks) {
        writer(store_of(j), ks_of(j), j, cfg, stats)?;
    }
    for j in (0..total).step_by(nks) {
        deletes(store_of(j), ks_of(j), j, cfg, stats)?;
    }
    for j in (0..total).step_by(nks) {
        reader(store_of(j), ks_of(j), stats)?;
    }
    for j in (0..total).step_by(nks) {
        snapshot_reader(store_of(j), ks_of(j), stats)?;
    }

    // every file, every keyspace
    for j in 0..total {
        writer(store_of(j), ks_of(j), j, cfg, stats)?;
    }
    for j in 0..total {
        deletes(store_of(j), ks_of(j), j, cfg, stats)?;
    }
    for j in 0..total {
        reader(store_of(j), ks_of(j), stats)?;
    }
    for j in 0..total {
        snapshot_reader(store_of(j), ks_of(j), stats)?;
    }

    // commit every file
    for store in stores {
        commit(store.as_ref(), stats)?;
    }
    Ok(())
}
