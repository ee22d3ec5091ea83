use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// Extensions accepted for uploaded images, lowercase with the dot.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".heic", ".heif"];

/// On-disk storage for uploaded images.
///
/// Each image is stored flat as `{storage_dir}/{uuid}{ext}` and served back
/// under `/uploads/`.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Write an image under a fresh name. `ext` must come from
    /// [`image_extension`]. Returns the stored filename.
    pub async fn save_image(&self, ext: &str, data: &[u8]) -> Result<String> {
        let filename = format!("{}{}", Uuid::new_v4(), ext);
        let path = self.file_path(&filename);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        info!("Stored upload {} ({} bytes)", filename, data.len());
        Ok(filename)
    }
}

/// The lowercased extension of `filename` if it is an accepted image type.
pub fn image_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let ext = format!(".{}", ext);
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_extensions() {
        assert_eq!(image_extension("coat.jpg").as_deref(), Some(".jpg"));
        assert_eq!(image_extension("COAT.JPEG").as_deref(), Some(".jpeg"));
        assert_eq!(image_extension("photo.HEIC").as_deref(), Some(".heic"));
        assert_eq!(image_extension("a.b.png").as_deref(), Some(".png"));
        assert!(image_extension("notes.txt").is_none());
        assert!(image_extension("png").is_none());
        assert!(image_extension("").is_none());
    }

    #[tokio::test]
    async fn save_writes_under_a_fresh_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("uploads")).await.unwrap();

        let first = storage.save_image(".png", b"one").await.unwrap();
        let second = storage.save_image(".png", b"two").await.unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with(".png"));
        assert_eq!(std::fs::read(storage.file_path(&first)).unwrap(), b"one");
    }
}
