use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::PostRecord;

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Posts keyed by their text, written back as one CSV table.
///
/// Rows keep the position of the first time their text was seen; a later
/// record with the same text replaces the row in place.
#[derive(Debug)]
pub struct PostStore {
    path: PathBuf,
    rows: Vec<PostRecord>,
    index: HashMap<String, usize>,
}

impl PostStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), rows: Vec::new(), index: HashMap::new() }
    }

    /// Loads the table at `path`. A missing file gives an empty store, and
    /// so does one that cannot be read (after a warning). Rows that do not
    /// parse are dropped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::empty(path);
        let bytes = match fs::read(&store.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return store,
            Err(e) => {
                tracing::warn!("cannot read {}: {e}; starting empty", store.path.display());
                return store;
            }
        };
        let body = bytes.strip_prefix(BOM).unwrap_or(&bytes);

        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(body);
        for (line, row) in rdr.deserialize::<PostRecord>().enumerate() {
            match row {
                Ok(rec) => store.upsert(rec),
                Err(e) => tracing::warn!("{} row {}: {e}", store.path.display(), line + 2),
            }
        }
        tracing::info!("Loaded {} posts from {}", store.len(), store.path.display());
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, post_text: &str) -> Option<&PostRecord> {
        self.index.get(post_text).map(|&i| &self.rows[i])
    }

    pub fn records(&self) -> impl Iterator<Item = &PostRecord> {
        self.rows.iter()
    }

    pub fn upsert(&mut self, rec: PostRecord) {
        match self.index.get(&rec.post_text) {
            Some(&i) => self.rows[i] = rec,
            None => {
                self.index.insert(rec.post_text.clone(), self.rows.len());
                self.rows.push(rec);
            }
        }
    }

    /// Rewrites the whole table.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(BOM)?;

        let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(out);
        for rec in &self.rows {
            wtr.serialize(rec)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn merge_and_persist<I>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = PostRecord>,
    {
        for rec in batch {
            self.upsert(rec);
        }
        self.persist()
    }
}
