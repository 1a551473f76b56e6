// Integration tests for the audio asset store
//
// These verify upload validation, scratch-directory lifecycle, and the
// exactly-once release guarantee.

use anyhow::Result;
use herdlog::config::AudioConfig;
use herdlog::{AudioAssetStore, PipelineError};
use std::fs;

fn store_in(dir: &tempfile::TempDir) -> Result<AudioAssetStore> {
    let config = AudioConfig {
        scratch_dir: dir.path().to_string_lossy().into_owned(),
        ..AudioConfig::default()
    };
    Ok(AudioAssetStore::new(&config)?)
}

fn scratch_file_count(dir: &tempfile::TempDir) -> usize {
    fs::read_dir(dir.path()).unwrap().count()
}

#[test]
fn test_store_writes_and_release_removes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir)?;

    let asset = store.store(b"fake audio bytes", "morning-feed.wav").unwrap();

    assert!(asset.temp_path.exists());
    assert_eq!(asset.extension, "wav");
    assert_eq!(asset.byte_size, 16);
    assert_eq!(asset.declared_filename, "morning-feed.wav");
    assert_eq!(scratch_file_count(&dir), 1);

    store.release(&asset);
    assert!(!asset.temp_path.exists());
    assert_eq!(scratch_file_count(&dir), 0);

    Ok(())
}

#[test]
fn test_store_rejects_unknown_extension_before_writing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir)?;

    let result = store.store(b"data", "notes.txt");
    assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));

    // Nothing may touch the filesystem on a rejected upload
    assert_eq!(scratch_file_count(&dir), 0);

    Ok(())
}

#[test]
fn test_store_rejects_missing_extension() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir)?;

    let result = store.store(b"data", "recording");
    assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
    assert_eq!(scratch_file_count(&dir), 0);

    Ok(())
}

#[test]
fn test_store_rejects_oversized_upload() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = AudioConfig {
        scratch_dir: dir.path().to_string_lossy().into_owned(),
        max_upload_bytes: 8,
        ..AudioConfig::default()
    };
    let store = AudioAssetStore::new(&config)?;

    let result = store.store(b"nine bytes", "big.mp3");
    assert!(matches!(
        result,
        Err(PipelineError::TooLarge { size: 10, max: 8 })
    ));
    assert_eq!(scratch_file_count(&dir), 0);

    Ok(())
}

#[test]
fn test_store_accepts_uppercase_extension() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir)?;

    let asset = store.store(b"data", "Evening.MP3").unwrap();
    assert_eq!(asset.extension, "mp3");
    store.release(&asset);

    Ok(())
}

#[test]
fn test_concurrent_assets_get_unique_paths() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir)?;

    let a = store.store(b"first", "same-name.wav").unwrap();
    let b = store.store(b"second", "same-name.wav").unwrap();

    assert_ne!(a.temp_path, b.temp_path);
    assert_eq!(scratch_file_count(&dir), 2);

    store.release(&a);
    store.release(&b);

    Ok(())
}

#[test]
fn test_release_of_missing_file_does_not_panic() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir)?;

    let asset = store.store(b"data", "gone.wav").unwrap();
    fs::remove_file(&asset.temp_path)?;

    // Deletion errors are logged only, never escalated
    store.release(&asset);

    Ok(())
}
