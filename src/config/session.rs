//! Resume state persistence
//!
//! Remembers the last content viewed per course so a student can pick up
//! where they left off. Storage sits behind [`ResumeStore`], so the engine
//! never reaches for a global location itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Config;
use crate::content::{ContentId, UnitId};

/// Where a student was last seen in a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    pub course_id: String,
    pub unit_id: UnitId,
    pub content_id: ContentId,
    /// Unix timestamp (ms)
    pub timestamp: i64,
}

/// Storage port for resume tokens
pub trait ResumeStore {
    /// Token for a course, if one was saved
    fn load(&self, course_id: &str) -> Result<Option<ResumeToken>>;

    /// Save a token. An older token never replaces a newer one; returns
    /// whether the token was stored.
    fn save(&mut self, token: ResumeToken) -> Result<bool>;

    fn clear(&mut self, course_id: &str) -> Result<()>;
}

/// Newest token per course
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ResumeTokens {
    courses: HashMap<String, ResumeToken>,
}

impl ResumeTokens {
    fn insert(&mut self, token: ResumeToken) -> bool {
        match self.courses.get(&token.course_id) {
            Some(existing) if existing.timestamp > token.timestamp => false,
            _ => {
                self.courses.insert(token.course_id.clone(), token);
                true
            }
        }
    }
}

/// Keeps tokens in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryResumeStore {
    tokens: ResumeTokens,
}

impl ResumeStore for MemoryResumeStore {
    fn load(&self, course_id: &str) -> Result<Option<ResumeToken>> {
        Ok(self.tokens.courses.get(course_id).cloned())
    }

    fn save(&mut self, token: ResumeToken) -> Result<bool> {
        Ok(self.tokens.insert(token))
    }

    fn clear(&mut self, course_id: &str) -> Result<()> {
        self.tokens.courses.remove(course_id);
        Ok(())
    }
}

/// Keeps tokens in `session.json`, written through on every change
#[derive(Debug, Clone)]
pub struct FileResumeStore {
    path: PathBuf,
    tokens: ResumeTokens,
}

impl FileResumeStore {
    /// Open the store in the data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Config::data_dir()?.join("session.json"))
    }

    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tokens = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session from {:?}", path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse session.json")?
        } else {
            ResumeTokens::default()
        };

        Ok(Self { path, tokens })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(&self.tokens)
            .with_context(|| "Failed to serialize session")?;

        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write session to {:?}", self.path))?;

        Ok(())
    }
}

impl ResumeStore for FileResumeStore {
    fn load(&self, course_id: &str) -> Result<Option<ResumeToken>> {
        Ok(self.tokens.courses.get(course_id).cloned())
    }

    fn save(&mut self, token: ResumeToken) -> Result<bool> {
        let stored = self.tokens.insert(token);
        if stored {
            self.write()?;
        }
        Ok(stored)
    }

    fn clear(&mut self, course_id: &str) -> Result<()> {
        if self.tokens.courses.remove(course_id).is_some() {
            self.write()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn token(content: &str, timestamp: i64) -> ResumeToken {
        ResumeToken {
            course_id: "c1".into(),
            unit_id: "u1".into(),
            content_id: content.into(),
            timestamp,
        }
    }

    #[test]
    fn older_token_does_not_replace_newer() {
        let mut store = MemoryResumeStore::default();
        assert!(store.save(token("v2", 200)).unwrap());
        assert!(!store.save(token("v1", 100)).unwrap());

        assert_eq!(store.load("c1").unwrap(), Some(token("v2", 200)));
    }

    #[test]
    fn clear_forgets_course() {
        let mut store = MemoryResumeStore::default();
        store.save(token("v1", 1)).unwrap();
        store.clear("c1").unwrap();
        assert_eq!(store.load("c1").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let mut store = FileResumeStore::open(&path).unwrap();
        assert_eq!(store.load("c1").unwrap(), None);
        store.save(token("d3", 300)).unwrap();

        let reopened = FileResumeStore::open(&path).unwrap();
        assert_eq!(reopened.load("c1").unwrap(), Some(token("d3", 300)));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileResumeStore::open(&path).is_err());
    }
}
