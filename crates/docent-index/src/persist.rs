//! Durable storage for [`VectorIndex`] as two companion artifacts.
//!
//! Vectors live at `path` in a small binary format; entries live at
//! `path` + [`META_SUFFIX`] as JSON. A save stages both files next to their
//! destination, records a commit marker, then renames them into place. A
//! marker left behind by a crash is rolled forward on the next load, so
//! readers never observe one artifact from a newer save than the other.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::types::IndexedEntry;
use crate::vector_index::VectorIndex;

/// Suffix appended to the index path for the metadata artifact.
pub const META_SUFFIX: &str = ".meta.json";
const COMMIT_SUFFIX: &str = ".commit";
const TMP_SUFFIX: &str = ".tmp";

const MAGIC: &[u8; 8] = b"DOCVEC01";
const FORMAT_VERSION: u32 = 1;
/// magic + version (u32) + dim (u64) + rows (u64)
const HEADER_LEN: usize = 8 + 4 + 8 + 8;

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    version: u32,
    dim: usize,
    rows: usize,
    vectors_checksum: String,
    entries: Vec<IndexedEntry>,
}

#[derive(Serialize, Deserialize)]
struct CommitMarker {
    vectors: PathBuf,
    metadata: PathBuf,
}

/// Path of the metadata artifact paired with `path`.
#[must_use]
pub fn meta_path(path: &Path) -> PathBuf {
    with_suffix(path, META_SUFFIX)
}

fn commit_path(path: &Path) -> PathBuf {
    with_suffix(path, COMMIT_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn tmp_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map_or_else(|| "index".into(), |n| n.to_string_lossy());
    format!(".{name}.")
}

/// Whether an index (or an interrupted save of one) is present at `path`.
#[must_use]
pub fn exists(path: &Path) -> bool {
    path.exists() || commit_path(path).exists()
}

/// Load the index at `path`, or create an empty one of dimension `dim`.
///
/// # Errors
///
/// - [`IndexError::MissingDimension`] if nothing is persisted and `dim` is `None`.
/// - [`IndexError::RowCountMismatch`] or [`IndexError::Corrupt`] if the artifacts
///   disagree with each other or with their header.
pub fn load(path: &Path, dim: Option<usize>) -> Result<VectorIndex> {
    recover(path)?;

    let meta = meta_path(path);
    match (path.exists(), meta.exists()) {
        (false, false) => {
            let dim = dim.ok_or_else(|| IndexError::MissingDimension(path.to_path_buf()))?;
            tracing::debug!(path = %path.display(), dim, "initializing empty index");
            VectorIndex::new(dim)
        }
        (true, true) => read_index(path, &meta),
        (true, false) => Err(IndexError::corrupt(path, "metadata artifact is missing")),
        (false, true) => Err(IndexError::corrupt(path, "vector artifact is missing")),
    }
}

fn read_index(path: &Path, meta: &Path) -> Result<VectorIndex> {
    let bytes = fs::read(path)?;
    let (dim, rows) = parse_header(path, &bytes)?;
    let body = &bytes[HEADER_LEN..];

    let metadata: MetadataFile = serde_json::from_slice(&fs::read(meta)?)?;
    if metadata.version != FORMAT_VERSION {
        return Err(IndexError::corrupt(
            meta,
            format!("unsupported metadata version {}", metadata.version),
        ));
    }
    if metadata.dim != dim {
        return Err(IndexError::corrupt(
            meta,
            format!("metadata dimension {} != vector dimension {dim}", metadata.dim),
        ));
    }
    if metadata.rows != metadata.entries.len() || rows != metadata.entries.len() {
        return Err(IndexError::RowCountMismatch {
            vectors: rows,
            entries: metadata.entries.len(),
        });
    }
    if blake3::hash(body).to_hex().as_str() != metadata.vectors_checksum {
        return Err(IndexError::corrupt(
            path,
            "vector checksum does not match metadata",
        ));
    }

    let vectors = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    tracing::debug!(path = %path.display(), dim, rows, "loaded index");
    VectorIndex::from_parts(dim, vectors, metadata.entries)
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<(usize, usize)> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(IndexError::corrupt(path, "not a docent vector artifact"));
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != FORMAT_VERSION {
        return Err(IndexError::corrupt(
            path,
            format!("unsupported vector format version {version}"),
        ));
    }
    let read_u64 = |at: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[at..at + 8]);
        usize::try_from(u64::from_le_bytes(buf))
            .map_err(|_| IndexError::corrupt(path, "header value out of range"))
    };
    let dim = read_u64(12)?;
    let rows = read_u64(20)?;
    if dim == 0 {
        return Err(IndexError::corrupt(path, "zero dimension in header"));
    }
    let expected = rows
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IndexError::corrupt(path, "header size overflow"))?;
    if bytes.len() - HEADER_LEN != expected {
        return Err(IndexError::corrupt(
            path,
            format!(
                "expected {expected} bytes of vectors, found {}",
                bytes.len() - HEADER_LEN
            ),
        ));
    }
    Ok((dim, rows))
}

fn encode_vectors(index: &VectorIndex) -> Vec<u8> {
    let raw = index.raw_vectors();
    let mut out = Vec::with_capacity(HEADER_LEN + raw.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(index.dim() as u64).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for v in raw {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Persist `index` at `path`, replacing any previous artifacts as one unit.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or any write, sync
/// or rename fails. On failure before the commit marker is written, the
/// previous artifacts are untouched.
pub fn save(index: &VectorIndex, path: &Path) -> Result<()> {
    let marker = stage(index, path)?;
    promote(path, &marker, Staged::Required)?;
    tracing::debug!(path = %path.display(), rows = index.len(), "saved index");
    Ok(())
}

/// Write both artifacts to temporary files and record the commit marker.
fn stage(index: &VectorIndex, path: &Path) -> Result<CommitMarker> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let vectors = encode_vectors(index);
    let metadata = MetadataFile {
        version: FORMAT_VERSION,
        dim: index.dim(),
        rows: index.len(),
        vectors_checksum: blake3::hash(&vectors[HEADER_LEN..]).to_hex().to_string(),
        entries: index.entries().to_vec(),
    };

    let prefix = tmp_prefix(path);
    let mut vectors_tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)?;
    vectors_tmp.write_all(&vectors)?;
    vectors_tmp.as_file().sync_all()?;

    let mut meta_tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)?;
    serde_json::to_writer(&mut meta_tmp, &metadata)?;
    meta_tmp.as_file().sync_all()?;

    let marker = CommitMarker {
        vectors: vectors_tmp.path().to_path_buf(),
        metadata: meta_tmp.path().to_path_buf(),
    };
    let mut marker_tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)?;
    serde_json::to_writer(&mut marker_tmp, &marker)?;
    marker_tmp.as_file().sync_all()?;

    // From here on the staged files must outlive this function.
    vectors_tmp.keep().map_err(|e| e.error)?;
    if let Err(e) = meta_tmp.keep() {
        let _ = fs::remove_file(&marker.vectors);
        return Err(e.error.into());
    }
    if let Err(e) = marker_tmp.persist(commit_path(path)) {
        let _ = fs::remove_file(&marker.vectors);
        let _ = fs::remove_file(&marker.metadata);
        return Err(e.error.into());
    }
    sync_dir(dir)?;
    Ok(marker)
}

/// Whether staged files may already be gone when promoting.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Staged {
    /// A save promoting its own staging: every file must still be there.
    Required,
    /// Recovery of an interrupted save that another reader may be finishing.
    MaybeMoved,
}

/// Move staged artifacts into place and clear the marker.
fn promote(path: &Path, marker: &CommitMarker, staged: Staged) -> Result<()> {
    move_staged(&marker.vectors, path, staged)?;
    move_staged(&marker.metadata, &meta_path(path), staged)?;
    match fs::remove_file(commit_path(path)) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    sync_dir(parent_dir(path))?;
    Ok(())
}

fn move_staged(from: &Path, to: &Path, staged: Staged) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && staged == Staged::MaybeMoved => {
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IndexError::corrupt(
            from,
            "staged artifact disappeared before it was promoted",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Finish an interrupted save, or discard staging leftovers without a marker.
///
/// Callers hold at least a shared lock on `path`, so no writer is staging
/// files while leftovers are removed.
fn recover(path: &Path) -> Result<()> {
    let commit = commit_path(path);
    if commit.exists() {
        let marker: CommitMarker = serde_json::from_slice(&fs::read(&commit)?)
            .map_err(|e| IndexError::corrupt(&commit, format!("unreadable commit marker: {e}")))?;
        tracing::warn!(path = %path.display(), "completing interrupted index save");
        return promote(path, &marker, Staged::MaybeMoved);
    }

    let dir = parent_dir(path);
    let Ok(listing) = fs::read_dir(dir) else {
        return Ok(());
    };
    let prefix = tmp_prefix(path);
    for item in listing.flatten() {
        let name = item.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(TMP_SUFFIX) {
            tracing::debug!(file = %name, "removing orphaned staging file");
            if let Err(e) = fs::remove_file(item.path()) {
                tracing::warn!(file = %name, "failed to remove staging file: {e}");
            }
        }
    }
    Ok(())
}

/// Remove both artifacts and any pending marker. Returns whether anything existed.
///
/// # Errors
///
/// Returns an error if an existing artifact cannot be removed.
pub fn remove(path: &Path) -> Result<bool> {
    let mut removed = false;
    for artifact in [commit_path(path), path.to_path_buf(), meta_path(path)] {
        match fs::remove_file(&artifact) {
            Ok(()) => removed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
