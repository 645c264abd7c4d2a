//! Content-addressed card cataloging.
//!
//! Each cropped card is hashed (SHA-256 of the file bytes) and its extracted
//! fields are cached under `<hash>.json`. A card that was already analyzed
//! is never sent to the extraction service again, no matter what the file is
//! currently named. Cache writes go through a temp file and rename so a
//! crashed run never leaves a truncated record behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::analyze::{CardAnalyzer, CardFields};
use crate::core::errors::{ScanError, ScanResult};
use crate::utils::mime_for_path;

/// A cataloged card: content hash, the filename it was analyzed under, and
/// the extracted fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    /// SHA-256 of the image file bytes, lowercase hex.
    pub hash: String,
    /// File name at analysis time.
    pub source: String,
    /// Fields extracted from the card face.
    pub fields: CardFields,
}

/// Result of cataloging one image.
#[derive(Debug)]
pub struct CatalogOutcome {
    /// The card's record, freshly extracted or loaded from cache.
    pub record: CardRecord,
    /// True if the record came from the cache.
    pub cache_hit: bool,
    /// Final path of the image, after any player-name prefix rename.
    pub path: PathBuf,
}

/// Hashes and catalogs cropped card images against a metadata cache
/// directory.
pub struct Cataloger<'a> {
    analyzer: &'a dyn CardAnalyzer,
    cache_dir: PathBuf,
}

impl<'a> Cataloger<'a> {
    /// Creates a cataloger, creating the cache directory if needed.
    pub fn new(analyzer: &'a dyn CardAnalyzer, cache_dir: impl Into<PathBuf>) -> ScanResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            analyzer,
            cache_dir,
        })
    }

    /// Catalogs one image: hash, cache lookup, extraction on a miss, and the
    /// player-name prefix rename.
    ///
    /// # Arguments
    ///
    /// * `image_path` - Path to the cropped (and usually trimmed) card image.
    ///
    /// # Returns
    ///
    /// The record, whether it came from the cache, and the image's final
    /// path after any rename.
    pub fn catalog(&self, image_path: &Path) -> ScanResult<CatalogOutcome> {
        let bytes = fs::read(image_path)?;
        let hash = content_hash(&bytes);
        let cache_path = self.cache_dir.join(format!("{hash}.json"));

        if cache_path.exists() {
            let record: CardRecord = serde_json::from_str(&fs::read_to_string(&cache_path)?)?;
            info!(%hash, "cache hit, skipping extraction");
            let path = apply_player_prefix(image_path, &record.fields)?;
            return Ok(CatalogOutcome {
                record,
                cache_hit: true,
                path,
            });
        }

        let mime = mime_for_path(image_path);
        let fields = self.analyzer.analyze(&bytes, mime)?;
        let source = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ScanError::invalid_input("image path has no file name"))?;
        let record = CardRecord {
            hash: hash.clone(),
            source,
            fields,
        };

        self.store(&cache_path, &record)?;
        let path = apply_player_prefix(image_path, &record.fields)?;
        Ok(CatalogOutcome {
            record,
            cache_hit: false,
            path,
        })
    }

    /// Write-then-rename so the cache never holds a partial record.
    fn store(&self, cache_path: &Path, record: &CardRecord) -> ScanResult<()> {
        let tmp_path = cache_path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(record)?)?;
        fs::rename(&tmp_path, cache_path)?;
        debug!(path = %cache_path.display(), "stored card record");
        Ok(())
    }
}

/// SHA-256 of the raw bytes, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Reduces a free-text field to a filesystem-safe token: alphanumerics kept,
/// everything else collapsed to single underscores. Returns `None` when
/// nothing survives.
pub fn sanitize_token(raw: &str) -> Option<String> {
    let mut token = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            token.push(c);
            last_underscore = false;
        } else if !last_underscore {
            token.push('_');
            last_underscore = true;
        }
    }
    let token = token.trim_end_matches('_').to_string();
    (!token.is_empty()).then_some(token)
}

/// Renames the image to `<player>-<original name>` when a player name was
/// extracted. Already-prefixed files are left alone, so re-runs are stable.
fn apply_player_prefix(image_path: &Path, fields: &CardFields) -> ScanResult<PathBuf> {
    let Some(prefix) = fields.player_name.as_deref().and_then(sanitize_token) else {
        return Ok(image_path.to_path_buf());
    };
    let file_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ScanError::invalid_input("image path has no file name"))?;
    if file_name.starts_with(&format!("{prefix}-")) {
        return Ok(image_path.to_path_buf());
    }

    let renamed = image_path.with_file_name(format!("{prefix}-{file_name}"));
    fs::rename(image_path, &renamed)?;
    info!(from = %image_path.display(), to = %renamed.display(), "applied player prefix");
    Ok(renamed)
}
