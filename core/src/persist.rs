use crate::{Index, Snapshot};
use crate::store::DocumentStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub indexed: bool,
    pub created_at: String,
    pub version: u32,
}

pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn snapshot(&self) -> PathBuf { self.root.join("snapshot.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    store: &'a DocumentStore,
    index: &'a Option<Index>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    store: DocumentStore,
    index: Option<Index>,
}

pub fn save_snapshot(paths: &SnapshotPaths, snapshot: &Snapshot) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let f = File::create(paths.snapshot())?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, &SnapshotRef { store: &snapshot.store, index: &snapshot.index })?;
    w.flush()?;

    let meta = MetaFile {
        num_docs: snapshot.store.len() as u32,
        num_terms: snapshot.index.as_ref().map_or(0, |i| i.dictionary.len() as u32),
        indexed: snapshot.index.is_some(),
        created_at: snapshot.built_at.format(&Rfc3339).unwrap_or_default(),
        version: SNAPSHOT_VERSION,
    };
    save_meta(paths, &meta)?;
    Ok(meta)
}

pub fn load_snapshot(paths: &SnapshotPaths) -> Result<Snapshot> {
    let meta = load_meta(paths)?;
    anyhow::ensure!(
        meta.version == SNAPSHOT_VERSION,
        "snapshot version {} is not supported (expected {})",
        meta.version,
        SNAPSHOT_VERSION
    );
    let f = File::open(paths.snapshot())
        .with_context(|| format!("opening {}", paths.snapshot().display()))?;
    let owned: SnapshotOwned = bincode::deserialize_from(BufReader::new(f))?;
    let built_at = OffsetDateTime::parse(&meta.created_at, &Rfc3339).unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(Snapshot { store: owned.store, index: owned.index, built_at })
}

pub fn save_meta(paths: &SnapshotPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &SnapshotPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let meta: MetaFile = serde_json::from_reader(BufReader::new(f))?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Origin, SourceCollection};
    use crate::Analyzer;
    use serde_json::json;

    #[test]
    fn snapshot_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        let store = DocumentStore::load(&[SourceCollection::new(
            "f",
            Origin::Forum,
            json!([{"content": "tokens tokens cost", "post_url": "u1"}, {"content": "other words"}]),
        )])
        .unwrap();
        let meta = save_snapshot(&paths, &Snapshot::indexed(store, Analyzer::new(true, true))).unwrap();
        assert_eq!(meta.num_docs, 2);
        assert!(meta.indexed);

        let loaded = load_snapshot(&paths).unwrap();
        assert_eq!(loaded.store.all()[0].url.as_deref(), Some("u1"));
        let index = loaded.index.as_ref().unwrap();
        assert!(index.analyzer.stem);
        assert_eq!(loaded.rank("token", 1)[0].document.id, 0);
    }
}
