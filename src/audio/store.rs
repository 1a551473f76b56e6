// Temporary storage for uploaded audio assets
//
// Uploads are validated (extension allow-list, size cap) before anything
// touches the filesystem, then written to a uniquely named file inside the
// scratch directory. The backing file lives exactly as long as one pipeline
// invocation: `ScopedAsset` releases it on drop, so every exit path — success,
// fatal error, or panic unwind — cleans up exactly once.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AudioConfig;
use crate::error::PipelineError;

/// A validated upload written to the scratch directory
#[derive(Debug, Clone)]
pub struct AudioAsset {
    /// Backing file inside the scratch directory
    pub temp_path: PathBuf,
    /// Filename as declared by the uploader
    pub declared_filename: String,
    /// Size of the stored bytes
    pub byte_size: u64,
    /// Lowercased extension taken from the declared filename
    pub extension: String,
}

/// Validates uploads and manages their scratch-directory lifetime
pub struct AudioAssetStore {
    scratch_dir: PathBuf,
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl AudioAssetStore {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let scratch_dir = PathBuf::from(&config.scratch_dir);
        fs::create_dir_all(&scratch_dir)
            .with_context(|| format!("failed to create scratch directory {:?}", scratch_dir))?;

        info!(
            "Audio asset store initialized: {:?} (max {} bytes, {} allowed formats)",
            scratch_dir,
            config.max_upload_bytes,
            config.allowed_extensions.len()
        );

        Ok(Self {
            scratch_dir,
            max_bytes: config.max_upload_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
        })
    }

    /// Validate and persist an upload. Validation runs before any file is
    /// written, so rejected uploads never leave anything behind.
    pub fn store(&self, bytes: &[u8], filename: &str) -> Result<AudioAsset, PipelineError> {
        let extension = extension_of(filename)
            .ok_or_else(|| PipelineError::UnsupportedFormat(filename.to_string()))?;

        if !self.allowed_extensions.iter().any(|e| e == &extension) {
            return Err(PipelineError::UnsupportedFormat(extension));
        }

        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(PipelineError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let temp_path = self
            .scratch_dir
            .join(format!("{}.{}", Uuid::new_v4(), extension));

        fs::write(&temp_path, bytes)
            .with_context(|| format!("failed to write audio asset {:?}", temp_path))
            .map_err(PipelineError::Internal)?;

        info!(
            "Stored audio asset: {:?} ({} bytes, from {:?})",
            temp_path, size, filename
        );

        Ok(AudioAsset {
            temp_path,
            declared_filename: filename.to_string(),
            byte_size: size,
            extension,
        })
    }

    /// Delete the asset's backing file. Deletion failures are logged and
    /// swallowed: cleanup must never mask the pipeline's real result.
    pub fn release(&self, asset: &AudioAsset) {
        match fs::remove_file(&asset.temp_path) {
            Ok(()) => debug!("Released audio asset: {:?}", asset.temp_path),
            Err(e) => warn!(
                "Failed to release audio asset {:?}: {}",
                asset.temp_path, e
            ),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

/// Holds an asset for the duration of one pipeline invocation and releases
/// it when dropped.
pub struct ScopedAsset<'a> {
    store: &'a AudioAssetStore,
    asset: AudioAsset,
}

impl<'a> ScopedAsset<'a> {
    pub fn new(store: &'a AudioAssetStore, asset: AudioAsset) -> Self {
        Self { store, asset }
    }

    pub fn asset(&self) -> &AudioAsset {
        &self.asset
    }
}

impl Drop for ScopedAsset<'_> {
    fn drop(&mut self) {
        self.store.release(&self.asset);
    }
}

fn extension_of(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
