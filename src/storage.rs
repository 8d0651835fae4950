use std::path::{Component, Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, ShopError};

pub const IMAGES_BUCKET: &str = "images";
const MAX_OBJECT_BYTES: usize = 5 * 1024 * 1024;

/// File buckets on local disk, served back under `{public_url}/storage/{bucket}/{path}`.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    public_url: String,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Storage { root: root.into(), public_url: public_url.into() }
    }

    /// Writes a new object; an existing object at the same path is an error.
    pub async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_OBJECT_BYTES {
            return Err(ShopError::validation("File exceeds the 5 MB upload limit"));
        }
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&target).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ShopError::Conflict("The resource already exists".into()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        log::info!("stored {}/{} ({} bytes)", bucket, path, bytes.len());
        Ok(())
    }

    pub async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(bucket, path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ShopError::NotFound("Object")),
            Err(e) => Err(e.into()),
        }
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{}/{}", self.public_url, bucket, path)
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        if !is_safe_segment(bucket) {
            return Err(ShopError::validation("Invalid bucket name"));
        }
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(part) if part.to_str().map_or(false, is_safe_segment)));
        if !clean {
            return Err(ShopError::validation("Invalid object path"));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `sweets/<random>.<ext>`, keeping the uploaded file's extension.
pub fn sweet_image_path(file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    let stem: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase();
    format!("sweets/{stem}.{ext}")
}

pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> Storage {
        let root = std::env::temp_dir().join(format!("sweet-shop-{}", uuid::Uuid::new_v4()));
        Storage::new(root, "http://localhost:8080")
    }

    #[tokio::test]
    async fn upload_then_download() {
        let storage = temp_storage();
        storage.upload(IMAGES_BUCKET, "sweets/a.png", b"png-bytes").await.unwrap();
        let bytes = storage.download(IMAGES_BUCKET, "sweets/a.png").await.unwrap();
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn uploads_never_overwrite() {
        let storage = temp_storage();
        storage.upload(IMAGES_BUCKET, "sweets/a.png", b"one").await.unwrap();
        let second = storage.upload(IMAGES_BUCKET, "sweets/a.png", b"two").await;
        assert!(matches!(second, Err(ShopError::Conflict(_))));
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let storage = temp_storage();
        assert!(storage.upload(IMAGES_BUCKET, "../escape.png", b"x").await.is_err());
        assert!(storage.upload("..", "a.png", b"x").await.is_err());
        assert!(storage.upload(IMAGES_BUCKET, "/etc/passwd", b"x").await.is_err());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let storage = temp_storage();
        let result = storage.download(IMAGES_BUCKET, "sweets/none.png").await;
        assert!(matches!(result, Err(ShopError::NotFound(_))));
    }

    #[test]
    fn image_paths_keep_extension() {
        let path = sweet_image_path("Truffle.JPG");
        assert!(path.starts_with("sweets/"));
        assert!(path.ends_with(".jpg"));
        assert_ne!(sweet_image_path("a.png"), sweet_image_path("a.png"));
    }

    #[test]
    fn public_url_joins_bucket_and_path() {
        let storage = temp_storage();
        assert_eq!(
            storage.public_url(IMAGES_BUCKET, "sweets/x.png"),
            "http://localhost:8080/storage/images/sweets/x.png"
        );
        assert_eq!(content_type_for("sweets/x.jpeg"), "image/jpeg");
    }
}
