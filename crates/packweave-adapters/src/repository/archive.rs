//! Single-file pack archives.
//!
//! Two encodings are supported:
//!
//! - [`ArchiveFormat::Json`]: one self-describing JSON document
//!   `{"format_version": 1, "catalog": {...}, "packs": [...]}`.
//! - [`ArchiveFormat::Framed`]: the magic `PWV1`, then a sequence of records,
//!   each a big-endian `u32` length followed by that many bytes of JSON. The
//!   first record is the catalog; every following record is one pack.
//!
//! [`decode`] sniffs the magic, so readers never need to be told the format.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use packweave_core::{
    application::{ApplicationError, PackSnapshot, ports::PackRepository},
    domain::{DomainValidator as validator, PackDescriptor, PackId, VersionsCatalog},
    error::{WeaveError, WeaveResult},
};

use crate::filesystem::map_io_error;

/// Leading bytes of a framed archive.
pub const FRAMED_MAGIC: &[u8; 4] = b"PWV1";

/// Version written into JSON archives. Readers reject anything newer.
pub const FORMAT_VERSION: u32 = 1;

/// On-disk encoding of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    #[default]
    Json,
    Framed,
}

impl ArchiveFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Framed => "framed",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = WeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "framed" | "pwv" => Ok(Self::Framed),
            other => Err(format_error(format!(
                "unknown archive format '{other}'; expected json or framed"
            ))),
        }
    }
}

#[derive(Serialize)]
struct JsonArchiveRef<'a> {
    format_version: u32,
    catalog: &'a VersionsCatalog,
    packs: &'a [PackDescriptor],
}

#[derive(Deserialize)]
struct JsonArchive {
    format_version: u32,
    #[serde(default)]
    catalog: VersionsCatalog,
    #[serde(default)]
    packs: Vec<PackDescriptor>,
}

fn format_error(reason: String) -> WeaveError {
    ApplicationError::ArchiveFormat { reason }.into()
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encode packs and a catalog.
pub fn encode(
    format: ArchiveFormat,
    catalog: &VersionsCatalog,
    packs: &[PackDescriptor],
) -> WeaveResult<Vec<u8>> {
    match format {
        ArchiveFormat::Json => serde_json::to_vec_pretty(&JsonArchiveRef {
            format_version: FORMAT_VERSION,
            catalog,
            packs,
        })
        .map_err(|e| format_error(format!("failed to encode archive: {e}"))),
        ArchiveFormat::Framed => {
            let mut out = FRAMED_MAGIC.to_vec();
            push_record(&mut out, catalog)?;
            for pack in packs {
                push_record(&mut out, pack)?;
            }
            Ok(out)
        }
    }
}

fn push_record<T: Serialize>(out: &mut Vec<u8>, value: &T) -> WeaveResult<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| format_error(format!("failed to encode record: {e}")))?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| format_error(format!("record of {} bytes is too large", bytes.len())))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&bytes);
    Ok(())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode an archive in either format.
///
/// # Errors
///
/// [`ApplicationError::ArchiveFormat`] for truncated input, malformed JSON or
/// an unsupported `format_version`.
pub fn decode(bytes: &[u8]) -> WeaveResult<(VersionsCatalog, Vec<PackDescriptor>)> {
    match bytes.strip_prefix(FRAMED_MAGIC.as_slice()) {
        Some(records) => decode_framed(records),
        None => decode_json(bytes),
    }
}

fn decode_json(bytes: &[u8]) -> WeaveResult<(VersionsCatalog, Vec<PackDescriptor>)> {
    let archive: JsonArchive = serde_json::from_slice(bytes)
        .map_err(|e| format_error(format!("malformed JSON archive: {e}")))?;
    if archive.format_version > FORMAT_VERSION {
        return Err(format_error(format!(
            "archive format version {} is newer than supported version {FORMAT_VERSION}",
            archive.format_version
        )));
    }
    Ok((archive.catalog, archive.packs))
}

fn decode_framed(mut rest: &[u8]) -> WeaveResult<(VersionsCatalog, Vec<PackDescriptor>)> {
    let mut records = Vec::new();
    while !rest.is_empty() {
        let (header, tail) = rest
            .split_first_chunk::<4>()
            .ok_or_else(|| format_error("truncated record header".into()))?;
        let len = u32::from_be_bytes(*header) as usize;
        if tail.len() < len {
            return Err(format_error(format!(
                "record {} declares {len} bytes but only {} remain",
                records.len(),
                tail.len()
            )));
        }
        let (record, next) = tail.split_at(len);
        records.push(record);
        rest = next;
    }

    let mut records = records.into_iter();
    let catalog = match records.next() {
        Some(record) => serde_json::from_slice(record)
            .map_err(|e| format_error(format!("malformed catalog record: {e}")))?,
        None => return Err(format_error("framed archive has no catalog record".into())),
    };
    let packs = records
        .enumerate()
        .map(|(i, record)| {
            serde_json::from_slice(record)
                .map_err(|e| format_error(format!("malformed pack record {}: {e}", i + 1)))
        })
        .collect::<WeaveResult<Vec<PackDescriptor>>>()?;
    Ok((catalog, packs))
}

// ── Files ─────────────────────────────────────────────────────────────────────

/// Write a repository snapshot to `path`, creating parent directories.
///
/// Returns the number of packs written.
#[instrument(skip_all, fields(path = %path.display(), %format))]
pub fn write_archive(snapshot: &PackSnapshot, path: &Path, format: ArchiveFormat) -> WeaveResult<usize> {
    let bytes = encode(format, &snapshot.catalog, &snapshot.packs)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| map_io_error(parent, e, "create directory"))?;
    }
    fs::write(path, &bytes).map_err(|e| map_io_error(path, e, "write archive"))?;

    info!(packs = snapshot.packs.len(), bytes = bytes.len(), "archive written");
    Ok(snapshot.packs.len())
}

/// Read-only repository backed by a decoded archive.
#[derive(Debug, Clone)]
pub struct ArchiveRepository {
    source: Option<PathBuf>,
    catalog: VersionsCatalog,
    packs: BTreeMap<PackId, PackDescriptor>,
}

impl ArchiveRepository {
    /// Read and decode an archive file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> WeaveResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ApplicationError::RepositoryUnavailable {
            reason: format!("cannot read archive '{}': {e}", path.display()),
        })?;
        let mut repo = Self::from_bytes(&bytes)?;
        repo.source = Some(path.to_path_buf());
        debug!(packs = repo.packs.len(), "archive loaded");
        Ok(repo)
    }

    /// Decode an in-memory archive. Every pack is validated; a duplicate id
    /// is an error.
    pub fn from_bytes(bytes: &[u8]) -> WeaveResult<Self> {
        let (catalog, list) = decode(bytes)?;
        let mut packs = BTreeMap::new();
        for pack in list {
            validator::validate_pack(&pack)?;
            if packs.contains_key(&pack.id) {
                return Err(format_error(format!("pack '{}' appears twice", pack.id)));
            }
            packs.insert(pack.id.clone(), pack);
        }
        Ok(Self {
            source: None,
            catalog,
            packs,
        })
    }

    /// File the archive was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

impl PackRepository for ArchiveRepository {
    fn ids(&self) -> WeaveResult<Vec<PackId>> {
        Ok(self.packs.keys().cloned().collect())
    }

    fn get(&self, id: &PackId) -> WeaveResult<Option<PackDescriptor>> {
        Ok(self.packs.get(id).cloned())
    }

    fn versions(&self) -> WeaveResult<VersionsCatalog> {
        Ok(self.catalog.clone())
    }
}
