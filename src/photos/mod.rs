//! Photo attachment cache
//!
//! Holds the single photo selected for the current report. The cache is the
//! only component that touches raw photo bytes: it writes them under its
//! root directory and hands out [`PhotoAttachmentMetadata`] records that the
//! rest of the flow refers to by id.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors raised while caching or releasing a photo
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("photo is empty")]
    Empty,

    #[error("failed to read photo metadata: {0}")]
    Metadata(#[from] image::ImageError),

    #[error("photo format could not be determined")]
    UnknownFormat,

    #[error("photo {0} is not in the cache")]
    NotFound(Uuid),

    #[error("photo storage error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PhotoError {
    fn io(path: &Path, source: io::Error) -> Self {
        PhotoError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the platform layer hands over after the user picks a photo
#[derive(Debug, Clone)]
pub enum PhotoSource {
    /// Bytes already in memory, with the name the picker reported (if any)
    Bytes {
        data: Vec<u8>,
        file_name: Option<String>,
    },
    /// A file on disk
    File(PathBuf),
}

/// Describes one cached photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAttachmentMetadata {
    pub id: Uuid,
    /// Name of the cached file (`{id}.{ext}`)
    pub file_name: String,
    /// Name reported by the picker, kept for display
    pub original_file_name: Option<String>,
    pub file_size_bytes: u64,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// MIME type, e.g. `image/jpeg`
    pub media_type_identifier: String,
    pub cached_location: PathBuf,
    pub saved_at: DateTime<Utc>,
}

/// Flow-scoped store of selected photos, keyed by generated id
#[derive(Debug)]
pub struct PhotoAttachmentCache {
    root: PathBuf,
    entries: HashMap<Uuid, PhotoAttachmentMetadata>,
}

impl PhotoAttachmentCache {
    /// Create a cache that writes under `root` (created on first save)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extract metadata from the photo and store it locally
    pub fn save(&mut self, source: PhotoSource) -> Result<PhotoAttachmentMetadata, PhotoError> {
        let (data, original_file_name) = match source {
            PhotoSource::Bytes { data, file_name } => (data, file_name),
            PhotoSource::File(path) => {
                let data = fs::read(&path).map_err(|e| PhotoError::io(&path, e))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                (data, name)
            }
        };

        if data.is_empty() {
            return Err(PhotoError::Empty);
        }

        let reader = image::io::Reader::new(Cursor::new(&data))
            .with_guessed_format()
            .map_err(|e| PhotoError::io(&self.root, e))?;
        let format = reader.format().ok_or(PhotoError::UnknownFormat)?;
        let (pixel_width, pixel_height) = reader.into_dimensions()?;

        let id = Uuid::new_v4();
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let file_name = format!("{id}.{extension}");

        fs::create_dir_all(&self.root).map_err(|e| PhotoError::io(&self.root, e))?;
        let cached_location = self.root.join(&file_name);
        fs::write(&cached_location, &data).map_err(|e| PhotoError::io(&cached_location, e))?;

        let metadata = PhotoAttachmentMetadata {
            id,
            file_name,
            original_file_name,
            file_size_bytes: data.len() as u64,
            pixel_width,
            pixel_height,
            media_type_identifier: media_type_for(format).to_string(),
            cached_location,
            saved_at: Utc::now(),
        };

        debug!(
            photo_id = %id,
            size = metadata.file_size_bytes,
            width = pixel_width,
            height = pixel_height,
            "cached photo"
        );
        self.entries.insert(id, metadata.clone());
        Ok(metadata)
    }

    pub fn get(&self, id: Uuid) -> Option<&PhotoAttachmentMetadata> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release one photo and delete its file
    pub fn remove(&mut self, id: Uuid) -> Result<PhotoAttachmentMetadata, PhotoError> {
        let metadata = self.entries.remove(&id).ok_or(PhotoError::NotFound(id))?;
        remove_file_if_present(&metadata.cached_location)?;
        debug!(photo_id = %id, "released photo");
        Ok(metadata)
    }

    /// Release every cached photo; returns how many entries were dropped
    ///
    /// Entries are forgotten even when deleting a file fails; the first
    /// failure is returned after all files were attempted.
    pub fn clear_all(&mut self) -> Result<usize, PhotoError> {
        let count = self.entries.len();
        let mut first_error = None;

        for (id, metadata) in self.entries.drain() {
            if let Err(e) = remove_file_if_present(&metadata.cached_location) {
                warn!(photo_id = %id, error = %e, "failed to delete cached photo");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }
}

fn remove_file_if_present(path: &Path) -> Result<(), PhotoError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PhotoError::io(path, e)),
    }
}

/// MIME type for an image format
pub fn media_type_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Avif => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Encode a small solid PNG, for tests that need a real photo
#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png_source(width: u32, height: u32) -> PhotoSource {
        PhotoSource::Bytes {
            data: test_png(width, height),
            file_name: Some("rex.png".to_string()),
        }
    }

    #[test]
    fn test_save_extracts_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = PhotoAttachmentCache::new(temp_dir.path().join("photos"));

        let meta = cache.save(png_source(32, 16)).unwrap();

        assert_eq!(meta.pixel_width, 32);
        assert_eq!(meta.pixel_height, 16);
        assert_eq!(meta.media_type_identifier, "image/png");
        assert_eq!(meta.file_name, format!("{}.png", meta.id));
        assert_eq!(meta.original_file_name.as_deref(), Some("rex.png"));
        assert!(meta.cached_location.exists());
        assert_eq!(
            fs::metadata(&meta.cached_location).unwrap().len(),
            meta.file_size_bytes
        );
        assert_eq!(cache.get(meta.id), Some(&meta));
    }

    #[test]
    fn test_save_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let photo_path = temp_dir.path().join("picked.png");
        fs::write(&photo_path, test_png(8, 8)).unwrap();

        let mut cache = PhotoAttachmentCache::new(temp_dir.path().join("cache"));
        let meta = cache.save(PhotoSource::File(photo_path)).unwrap();

        assert_eq!(meta.original_file_name.as_deref(), Some("picked.png"));
        assert_eq!((meta.pixel_width, meta.pixel_height), (8, 8));
    }

    #[test]
    fn test_save_rejects_garbage_explicitly() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = PhotoAttachmentCache::new(temp_dir.path());

        let result = cache.save(PhotoSource::Bytes {
            data: b"definitely not an image".to_vec(),
            file_name: None,
        });
        assert!(matches!(result, Err(PhotoError::UnknownFormat)));

        let result = cache.save(PhotoSource::Bytes {
            data: Vec::new(),
            file_name: None,
        });
        assert!(matches!(result, Err(PhotoError::Empty)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = PhotoAttachmentCache::new(temp_dir.path());
        let result = cache.save(PhotoSource::File(temp_dir.path().join("nope.jpg")));
        assert!(matches!(result, Err(PhotoError::Io { .. })));
    }

    #[test]
    fn test_remove_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = PhotoAttachmentCache::new(temp_dir.path());
        let meta = cache.save(png_source(4, 4)).unwrap();

        let removed = cache.remove(meta.id).unwrap();
        assert_eq!(removed.id, meta.id);
        assert!(!meta.cached_location.exists());
        assert!(cache.get(meta.id).is_none());

        assert!(matches!(cache.remove(meta.id), Err(PhotoError::NotFound(_))));
    }

    #[test]
    fn test_clear_all_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = PhotoAttachmentCache::new(temp_dir.path());
        let first = cache.save(png_source(4, 4)).unwrap();
        let second = cache.save(png_source(6, 6)).unwrap();
        assert_ne!(first.id, second.id);

        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(!first.cached_location.exists());
        assert!(!second.cached_location.exists());
        assert_eq!(cache.clear_all().unwrap(), 0);
    }

    #[test]
    fn test_media_type_mapping() {
        assert_eq!(media_type_for(ImageFormat::Jpeg), "image/jpeg");
        assert_eq!(media_type_for(ImageFormat::Ico), "application/octet-stream");
    }
}
