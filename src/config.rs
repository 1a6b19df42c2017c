use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::HarvestError;

/// Everything the run needs from the credential file.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub group_url: String,
    pub output_file: PathBuf,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("group_url", &self.group_url)
            .field("output_file", &self.output_file)
            .finish()
    }
}

/// Parses `key = value` lines. Blank lines, `#` comments and lines without
/// `=` are ignored; the value keeps any further `=` characters.
pub fn parse_pairs(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

impl Credentials {
    pub fn from_pairs(mut pairs: HashMap<String, String>) -> Result<Self, HarvestError> {
        let mut take = |key: &'static str| {
            pairs
                .remove(key)
                .filter(|v| !v.is_empty())
                .ok_or(HarvestError::MissingKey(key))
        };
        Ok(Self {
            email: take("email")?,
            password: take("password")?,
            group_url: take("group_url")?,
            output_file: PathBuf::from(take("output_file")?),
        })
    }

    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let text = std::fs::read_to_string(path).map_err(|source| HarvestError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pairs(parse_pairs(&text))
    }
}
