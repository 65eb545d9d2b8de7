use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use benchkv::rocks;
use benchkv::stats::{render_report, Unit};
use benchkv::workload::{self, WorkloadConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of database files to open
    #[arg(long, default_value_t = 16)]
    num_files: usize,
    /// Keyspaces per database file
    #[arg(long, default_value_t = 16)]
    num_keyspaces: usize,
    /// Full workload passes
    #[arg(long, default_value_t = 5)]
    loops: usize,
    /// Sequential documents written per keyspace per pass
    #[arg(long, default_value_t = 1000)]
    seq_docs: usize,
    /// Report unit: us, ms or s
    #[arg(long, default_value = "ms")]
    unit: Unit,
    /// Data directory; a fresh temp dir when omitted
    #[arg(long)]
    path: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = WorkloadConfig {
        nfiles: args.num_files,
        nkeyspaces: args.num_keyspaces,
        nloops: args.loops,
        seq_docs: args.seq_docs,
        ..WorkloadConfig::default()
    };

    let mut _scratch = None;
    let root = match args.path {
        Some(path) => {
            std::fs::create_dir_all(&path)?;
            path
        }
        None => {
            let dir = tempfile::tempdir()?;
            let path = dir.path().to_path_buf();
            _scratch = Some(dir);
            path
        }
    };

    info!("running rocksdb benchmark under {}", root.display());
    let stats = workload::run(&cfg, &root, &rocks::open_store)?;
    print!("{}", render_report("rocksdb bench", args.unit, &stats));
    Ok(())
}
