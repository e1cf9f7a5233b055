//! Typed Conveniences
//!
//! Thin string and JSON codecs over the byte API. No new semantics:
//! everything round-trips through [`LocalStore::cache`] / [`LocalStore::get`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::store::{CacheOptions, LocalStore};

impl LocalStore {
    /// Cache a UTF-8 string
    pub fn cache_string(&self, name: &str, value: &str, opts: CacheOptions) {
        self.cache(name, value.as_bytes(), opts);
    }

    /// Read a UTF-8 string; `None` when absent or not valid UTF-8
    pub fn get_string(&self, name: &str) -> Option<String> {
        let data = self.get(name)?;
        String::from_utf8(data.to_vec()).ok()
    }

    /// Cache any serializable value as JSON
    pub fn cache_json<T: Serialize>(&self, name: &str, value: &T, opts: CacheOptions) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.cache(name, &data, opts);
        Ok(())
    }

    /// Read a JSON value; `None` when absent or undecodable
    pub fn get_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let data = self.get(name)?;
        serde_json::from_slice(&data).ok()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open_at(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_string_roundtrip() {
        let (_dir, store) = store();
        store.cache_string("greeting", "hello, 世界", CacheOptions::default());

        assert_eq!(store.get_string("greeting").unwrap(), "hello, 世界");
        assert!(store.get_string("missing").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Profile {
            id: u32,
            handle: String,
        }

        let (_dir, store) = store();
        let profile = Profile {
            id: 7,
            handle: "ada".into(),
        };
        store.cache_json("profile", &profile, CacheOptions::default()).unwrap();

        let back: Profile = store.get_json("profile").unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_json_decode_mismatch_is_none() {
        let (_dir, store) = store();
        store.cache_string("text", "not json at all", CacheOptions::default());

        let decoded: Option<Vec<u32>> = store.get_json("text");
        assert!(decoded.is_none());
    }
}
