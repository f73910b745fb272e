//! Commit log as a JSONL file.
//!
//! Each line is one accepted submission:
//! `{ "tip_height": u32, "tip_time": u32, "hashes": [{ "height": u32, "hash": hex }],
//!    "targets": [{ "period": u32, "target": hex }] }`.
//! Hashes are display-order hex; an all-zero hash orphans its height.
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use btc_crypto::{BlockHash, Encoding, Target};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::state::StateDelta;

#[derive(Serialize, Deserialize)]
struct HashRecord {
    height: u32,
    hash: String,
}

#[derive(Serialize, Deserialize)]
struct TargetRecord {
    period: u32,
    target: String,
}

#[derive(Serialize, Deserialize)]
struct Record {
    tip_height: u32,
    tip_time: u32,
    hashes: Vec<HashRecord>,
    targets: Vec<TargetRecord>,
}

impl From<&StateDelta> for Record {
    fn from(delta: &StateDelta) -> Self {
        Record {
            tip_height: delta.tip_height,
            tip_time: delta.tip_time,
            hashes: delta
                .hashes
                .iter()
                .map(|(height, hash)| HashRecord {
                    height: *height,
                    hash: hash.to_string(),
                })
                .collect(),
            targets: delta
                .period_targets
                .iter()
                .map(|(period, target)| TargetRecord {
                    period: *period,
                    target: hex::encode(target.to_be_bytes()),
                })
                .collect(),
        }
    }
}

impl TryFrom<Record> for StateDelta {
    type Error = io::Error;

    fn try_from(rec: Record) -> io::Result<Self> {
        let mut hashes = BTreeMap::new();
        for h in rec.hashes {
            let hash: BlockHash = h.hash.parse().map_err(io::Error::other)?;
            hashes.insert(h.height, hash);
        }

        let mut period_targets = BTreeMap::new();
        for t in rec.targets {
            let bytes = hex::decode(&t.target).map_err(|e| io::Error::other(e.to_string()))?;
            if bytes.len() != 32 {
                return Err(io::Error::other(format!(
                    "target for period {} is {} bytes",
                    t.period,
                    bytes.len()
                )));
            }
            period_targets.insert(t.period, Target::from_be_slice(&bytes));
        }

        Ok(StateDelta {
            tip_height: rec.tip_height,
            tip_time: rec.tip_time,
            hashes,
            period_targets,
        })
    }
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref().to_path_buf();
        if let Some(dir) = p.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                create_dir_all(dir)?;
            }
        }
        if !p.exists() {
            File::create(&p)?;
        }
        Ok(FileStore { path: p })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> io::Result<impl Iterator<Item = io::Result<String>>> {
        let f = File::open(&self.path)?;
        Ok(BufReader::new(f).lines())
    }
}

impl Store for FileStore {
    fn append(&self, delta: &StateDelta) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(&Record::from(delta)).map_err(io::Error::other)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()
    }

    fn load(&self) -> io::Result<Vec<StateDelta>> {
        let mut deltas = Vec::new();
        for line in self.read_lines()? {
            let l = line?;
            if l.trim().is_empty() {
                continue;
            }
            let rec: Record = serde_json::from_str(&l).map_err(io::Error::other)?;
            deltas.push(StateDelta::try_from(rec)?);
        }
        Ok(deltas)
    }
}
