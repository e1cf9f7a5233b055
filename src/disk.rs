//! Disk Tier
//!
//! Source-of-truth storage: one payload blob per key plus a JSON metadata
//! sidecar (`<name>.meta.json`). In-progress chunked transfers keep their
//! fragments (`<name>.chunk.<index>`) and an assembly sidecar
//! (`<name>.chunk.meta`) alongside; integrity hashes live in
//! `<name>.hash.json`.
//!
//! An entry is live iff both blob and metadata sidecar exist and the
//! sidecar parses. A blob or sidecar found alone is crash debris and is
//! treated as no-entry by every scan. Usage figures are always recomputed
//! from a fresh directory scan, never tracked incrementally.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::meta::CacheMeta;

/// Metadata sidecar suffix
pub const META_SUFFIX: &str = ".meta.json";
/// Assembly-metadata sidecar suffix for chunked transfers
pub const CHUNK_META_SUFFIX: &str = ".chunk.meta";
/// Integrity-hash sidecar suffix
pub const HASH_SUFFIX: &str = ".hash.json";
/// Infix of chunk fragment files (`<name>.chunk.<index>`)
const CHUNK_INFIX: &str = ".chunk.";

/// A live entry observed by a directory scan
#[derive(Debug, Clone)]
pub struct DiskEntry {
    /// Cache key
    pub name: String,
    /// Bytes currently on disk (post-compression)
    pub size: u64,
    /// Parsed metadata sidecar
    pub meta: CacheMeta,
}

/// Disk tier rooted at a single cache directory
pub struct DiskTier {
    root: PathBuf,
    /// Swallowed I/O failures, for operators watching a flaky disk
    io_errors: AtomicU64,
}

impl DiskTier {
    /// Open the tier, creating `root` if needed. Failure to establish the
    /// directory is the engine's only fatal construction error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            io_errors: AtomicU64::new(0),
        })
    }

    /// Root cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Swallowed-I/O-failure count (diagnostic only)
    pub fn io_error_count(&self) -> u64 {
        self.io_errors.load(Ordering::Relaxed)
    }

    fn note_io_error(&self, context: &str, err: &io::Error) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("disk tier {}: {}", context, err);
    }

    /// Reject keys that cannot name a blob file: empty, path-traversing,
    /// or colliding with a sidecar naming pattern.
    pub fn validate_name(name: &str) -> io::Result<()> {
        let reserved = name.ends_with(META_SUFFIX)
            || name.ends_with(CHUNK_META_SUFFIX)
            || name.ends_with(HASH_SUFFIX)
            || name.contains(CHUNK_INFIX);
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || reserved
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache key: {:?}", name),
            ));
        }
        Ok(())
    }

    fn is_reserved(file_name: &str) -> bool {
        file_name.ends_with(META_SUFFIX)
            || file_name.ends_with(CHUNK_META_SUFFIX)
            || file_name.ends_with(HASH_SUFFIX)
            || file_name.contains(CHUNK_INFIX)
    }

    // -------------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------------

    /// Payload blob path for `name`
    pub fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Metadata sidecar path for `name`
    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, META_SUFFIX))
    }

    /// Chunk fragment path for (`name`, `index`)
    pub fn chunk_path(&self, name: &str, index: u32) -> PathBuf {
        self.root.join(format!("{}{}{}", name, CHUNK_INFIX, index))
    }

    /// Assembly-metadata sidecar path for `name`
    pub fn chunk_meta_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, CHUNK_META_SUFFIX))
    }

    /// Integrity-hash sidecar path for `name`
    pub fn hash_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, HASH_SUFFIX))
    }

    // -------------------------------------------------------------------------
    // Blob I/O
    // -------------------------------------------------------------------------

    /// Write a payload blob; the caller decides whether to surface errors
    pub fn write_blob(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        Self::validate_name(name)?;
        fs::write(self.blob_path(name), bytes)
    }

    /// Read a payload blob
    pub fn read_blob(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.blob_path(name))
    }

    /// Whether a payload blob exists for `name`
    pub fn blob_exists(&self, name: &str) -> bool {
        self.blob_path(name).exists()
    }

    /// On-disk payload size for `name`, if the blob exists
    pub fn blob_size(&self, name: &str) -> Option<u64> {
        fs::metadata(self.blob_path(name)).ok().map(|m| m.len())
    }

    /// Remove blob, metadata, and hash sidecars. Absent files are fine
    /// (idempotent); a true removal failure on the blob is returned for
    /// callers that need to report it.
    pub fn remove_entry(&self, name: &str) -> io::Result<()> {
        let blob = remove_if_present(&self.blob_path(name));
        if let Err(e) = remove_if_present(&self.meta_path(name)) {
            self.note_io_error("removing metadata sidecar", &e);
        }
        if let Err(e) = remove_if_present(&self.hash_path(name)) {
            self.note_io_error("removing hash sidecar", &e);
        }
        blob
    }

    // -------------------------------------------------------------------------
    // Metadata sidecars
    // -------------------------------------------------------------------------

    /// Persist the metadata sidecar for `name`
    pub fn put_meta(&self, name: &str, meta: &CacheMeta) -> io::Result<()> {
        Self::validate_name(name)?;
        let json = serde_json::to_vec(meta)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.meta_path(name), json)
    }

    /// Load the metadata sidecar for `name`.
    ///
    /// Silent-and-absent: read or parse failures surface as `None`, the
    /// only failure signal callers get. The diagnostic counter records
    /// genuine I/O errors so a flaky disk stays observable.
    pub fn get_meta(&self, name: &str) -> Option<CacheMeta> {
        let data = match fs::read(self.meta_path(name)) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    self.note_io_error("reading metadata sidecar", &e);
                }
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!("unreadable metadata sidecar for {}: {}", name, e);
                None
            }
        }
    }

    /// Remove the metadata sidecar for `name` (best-effort)
    pub fn remove_meta(&self, name: &str) {
        if let Err(e) = remove_if_present(&self.meta_path(name)) {
            self.note_io_error("removing metadata sidecar", &e);
        }
    }

    // -------------------------------------------------------------------------
    // Scans
    // -------------------------------------------------------------------------

    /// Authoritative listing: every live entry with its current on-disk
    /// size and parsed metadata. Orphan blobs and orphan sidecars are
    /// skipped.
    pub fn scan(&self) -> Vec<DiskEntry> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) => {
                self.note_io_error("listing cache directory", &e);
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for item in dir.flatten() {
            let file_name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if Self::is_reserved(&file_name) {
                continue;
            }
            let meta = match self.get_meta(&file_name) {
                Some(meta) => meta,
                None => continue,
            };
            let size = match item.metadata() {
                Ok(m) if m.is_file() => m.len(),
                _ => continue,
            };
            entries.push(DiskEntry {
                name: file_name,
                size,
                meta,
            });
        }
        entries
    }

    /// Total on-disk bytes across live entries
    pub fn used_bytes(&self) -> u64 {
        self.scan().iter().map(|e| e.size).sum()
    }

    /// Names of live entries whose tag set contains `tag`
    pub fn files_with_tag(&self, tag: &str) -> Vec<String> {
        self.scan()
            .into_iter()
            .filter(|e| e.meta.has_tag(tag))
            .map(|e| e.name)
            .collect()
    }

    /// Total on-disk bytes across live entries tagged with `tag`
    pub fn tag_used_bytes(&self, tag: &str) -> u64 {
        self.scan()
            .iter()
            .filter(|e| e.meta.has_tag(tag))
            .map(|e| e.size)
            .sum()
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::CachePriority;
    use tempfile::TempDir;

    fn tier() -> (TempDir, DiskTier) {
        let dir = TempDir::new().unwrap();
        let tier = DiskTier::open(dir.path()).unwrap();
        (dir, tier)
    }

    #[test]
    fn test_open_creates_root() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("cache").join("ns");
        let tier = DiskTier::open(&nested).unwrap();
        assert!(tier.root().is_dir());
    }

    #[test]
    fn test_validate_name() {
        assert!(DiskTier::validate_name("ok-name.bin").is_ok());
        assert!(DiskTier::validate_name("").is_err());
        assert!(DiskTier::validate_name("..").is_err());
        assert!(DiskTier::validate_name("a/b").is_err());
        assert!(DiskTier::validate_name("x.meta.json").is_err());
        assert!(DiskTier::validate_name("x.chunk.3").is_err());
        assert!(DiskTier::validate_name("x.hash.json").is_err());
    }

    #[test]
    fn test_blob_roundtrip() {
        let (_dir, tier) = tier();
        tier.write_blob("a", b"payload").unwrap();

        assert!(tier.blob_exists("a"));
        assert_eq!(tier.blob_size("a"), Some(7));
        assert_eq!(tier.read_blob("a").unwrap(), b"payload");
    }

    #[test]
    fn test_meta_roundtrip_and_silent_absence() {
        let (_dir, tier) = tier();
        let meta = CacheMeta::new().priority(CachePriority::High);
        tier.put_meta("a", &meta).unwrap();

        assert_eq!(tier.get_meta("a").unwrap(), meta);
        assert!(tier.get_meta("missing").is_none());

        // A corrupt sidecar reads as absent, not as an error
        std::fs::write(tier.meta_path("bad"), b"{not json").unwrap();
        assert!(tier.get_meta("bad").is_none());
    }

    #[test]
    fn test_scan_skips_orphans_and_artifacts() {
        let (_dir, tier) = tier();

        // Live entry
        tier.write_blob("live", b"1234").unwrap();
        tier.put_meta("live", &CacheMeta::new()).unwrap();

        // Orphan blob (no sidecar) and orphan sidecar (no blob)
        tier.write_blob("orphan-blob", b"xx").unwrap();
        tier.put_meta("orphan-meta", &CacheMeta::new()).unwrap();

        // Chunk artifacts never count as entries
        std::fs::write(tier.chunk_path("t", 0), b"frag").unwrap();
        std::fs::write(tier.chunk_meta_path("t"), b"{}").unwrap();

        let entries = tier.scan();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "live");
        assert_eq!(entries[0].size, 4);
        assert_eq!(tier.used_bytes(), 4);
    }

    #[test]
    fn test_remove_entry_idempotent() {
        let (_dir, tier) = tier();
        tier.write_blob("a", b"data").unwrap();
        tier.put_meta("a", &CacheMeta::new()).unwrap();

        tier.remove_entry("a").unwrap();
        assert!(!tier.blob_exists("a"));
        assert!(tier.get_meta("a").is_none());

        // Nonexistent removal is a no-op
        tier.remove_entry("a").unwrap();
        tier.remove_entry("never-existed").unwrap();
    }

    #[test]
    fn test_tag_scans() {
        let (_dir, tier) = tier();
        for (name, tags) in [
            ("a", vec!["img".to_string()]),
            ("b", vec!["img".to_string(), "tmp".to_string()]),
            ("c", vec!["tmp".to_string()]),
        ] {
            tier.write_blob(name, b"12345678").unwrap();
            tier.put_meta(name, &CacheMeta::new().tags(tags)).unwrap();
        }

        let mut img = tier.files_with_tag("img");
        img.sort();
        assert_eq!(img, vec!["a", "b"]);
        assert_eq!(tier.tag_used_bytes("img"), 16);
        assert_eq!(tier.tag_used_bytes("tmp"), 16);
        assert_eq!(tier.tag_used_bytes("absent"), 0);
    }
}
