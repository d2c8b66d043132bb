// /stayhub/services/property-service/src/upload.rs
// Listing image uploads: validation, atomic storage and removal

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::extract::multipart::{Field, Multipart};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

pub const IMAGE_FIELD: &str = "images";
pub const MAX_FILES_PER_REQUEST: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const IMAGES_DIR: &str = "property-images";
const RANDOM_SUFFIX_LEN: usize = 7;

/// Names produced by `generate_file_name`; nothing else may be deleted
static STORED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10,16}-[a-z0-9]{7}\.(jpg|png|webp|gif)$").expect("valid regex"));

// ===== FILE TYPE VALIDATION =====

#[derive(Debug)]
pub struct ImageType {
    pub mime_types: &'static [&'static str],
    pub extensions: &'static [&'static str],
    magic_bytes: &'static [u8],
}

impl ImageType {
    /// Extension used for the stored copy
    pub fn canonical_extension(&self) -> &'static str {
        self.extensions[0]
    }

    fn matches_content(&self, data: &[u8]) -> bool {
        if self.mime_types.contains(&"image/webp") {
            return data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP";
        }
        data.starts_with(self.magic_bytes)
    }
}

pub const ALLOWED_IMAGE_TYPES: &[ImageType] = &[
    ImageType {
        mime_types: &["image/jpeg", "image/jpg", "image/pjpeg"],
        extensions: &["jpg", "jpeg"],
        magic_bytes: &[0xFF, 0xD8, 0xFF],
    },
    ImageType {
        mime_types: &["image/png"],
        extensions: &["png"],
        magic_bytes: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
    },
    ImageType {
        mime_types: &["image/webp"],
        extensions: &["webp"],
        magic_bytes: b"RIFF",
    },
    ImageType {
        mime_types: &["image/gif"],
        extensions: &["gif"],
        magic_bytes: b"GIF8",
    },
];

/// Extension, declared content type and leading bytes must all agree
pub fn validate_image(data: &[u8], file_name: &str, content_type: &str) -> AppResult<&'static ImageType> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let image_type = ALLOWED_IMAGE_TYPES
        .iter()
        .find(|t| t.extensions.contains(&extension.as_str()))
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "File type '{}' is not allowed. Allowed: jpg, jpeg, png, webp, gif",
                extension
            ))
        })?;

    let content_type = content_type.split(';').next().unwrap_or_default().trim().to_lowercase();
    if !image_type.mime_types.contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Content type '{}' does not match file extension '{}'",
            content_type, extension
        )));
    }

    if data.len() > MAX_IMAGE_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "'{}' exceeds the {} MB limit",
            file_name,
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    if !image_type.matches_content(data) {
        return Err(AppError::BadRequest(format!(
            "'{}' content does not match its file type",
            file_name
        )));
    }

    Ok(image_type)
}

/// Reject path separators, control characters and reserved device names
pub fn is_safe_filename(file_name: &str) -> bool {
    if file_name.is_empty() || file_name.len() > 255 || file_name.contains("..") {
        return false;
    }

    if file_name
        .chars()
        .any(|c| c.is_control() || matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*'))
    {
        return false;
    }

    const RESERVED: &[&str] = &["CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "LPT1", "LPT2", "LPT3"];
    let stem = file_name.split('.').next().unwrap_or_default().to_uppercase();
    !RESERVED.contains(&stem.as_str())
}

/// `{unix_millis}-{random7}.{ext}`
pub fn generate_file_name(extension: &str) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();

    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}

// ===== CONCURRENT UPLOAD TRACKING =====

type ActiveUploads = Arc<Mutex<HashMap<Uuid, DateTime<Utc>>>>;

/// Caps uploads in flight per process; one slot per user
#[derive(Clone)]
pub struct UploadTracker {
    active_uploads: ActiveUploads,
    max_concurrent: usize,
}

/// Held for the lifetime of one upload request; dropping it frees the slot
pub struct UploadSlot {
    active_uploads: ActiveUploads,
    user_id: Uuid,
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        let mut uploads = self.active_uploads.lock().unwrap_or_else(|e| e.into_inner());
        uploads.remove(&self.user_id);
    }
}

impl UploadTracker {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            active_uploads: Arc::new(Mutex::new(HashMap::new())),
            max_concurrent,
        }
    }

    pub fn acquire_slot(&self, user_id: Uuid) -> AppResult<UploadSlot> {
        let mut uploads = self.active_uploads.lock().unwrap_or_else(|e| e.into_inner());

        // Slots older than 10 minutes belong to requests that never finished
        let cutoff = Utc::now() - Duration::minutes(10);
        uploads.retain(|_, started| *started > cutoff);

        if uploads.contains_key(&user_id) {
            return Err(AppError::Conflict("An upload is already in progress".to_string()));
        }
        if uploads.len() >= self.max_concurrent {
            return Err(AppError::Conflict("Upload capacity reached, retry shortly".to_string()));
        }

        uploads.insert(user_id, Utc::now());
        Ok(UploadSlot {
            active_uploads: Arc::clone(&self.active_uploads),
            user_id,
        })
    }
}

// ===== IMAGE UPLOADER =====

pub struct ImageUploader {
    base_dir: PathBuf,
    temp_dir: PathBuf,
    public_base_url: String,
    tracker: UploadTracker,
}

impl ImageUploader {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: &str, max_concurrent: usize) -> AppResult<Self> {
        let base_dir = base_path.into();
        let temp_dir = base_dir.join("temp");

        create_directory(&base_dir)?;
        create_directory(&temp_dir)?;
        create_directory(&base_dir.join(IMAGES_DIR))?;

        Ok(Self {
            base_dir,
            temp_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            tracker: UploadTracker::new(max_concurrent),
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::new(&config.storage_base_path, &config.public_storage_url, 20)
    }

    pub fn public_url(&self, user_id: Uuid, file_name: &str) -> String {
        format!("{}/{}/{}/{}", self.public_base_url, IMAGES_DIR, user_id, file_name)
    }

    fn user_dir(&self, user_id: Uuid) -> PathBuf {
        self.base_dir.join(IMAGES_DIR).join(user_id.to_string())
    }

    /// Store every `images` field and return their public URLs
    pub async fn upload_images(&self, multipart: Multipart, user_id: Uuid) -> AppResult<Vec<String>> {
        let _slot = self.tracker.acquire_slot(user_id)?;
        self.process_multipart(multipart, user_id).await
    }

    async fn process_multipart(&self, mut multipart: Multipart, user_id: Uuid) -> AppResult<Vec<String>> {
        let mut stored: Vec<String> = Vec::new();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    self.discard(user_id, &stored).await;
                    return Err(AppError::BadRequest(format!("Malformed multipart body: {}", e)));
                }
            };

            if field.name() != Some(IMAGE_FIELD) {
                continue;
            }

            if stored.len() >= MAX_FILES_PER_REQUEST {
                self.discard(user_id, &stored).await;
                return Err(AppError::BadRequest(format!(
                    "At most {} images per upload",
                    MAX_FILES_PER_REQUEST
                )));
            }

            match self.store_field(field, user_id).await {
                Ok(file_name) => stored.push(file_name),
                Err(e) => {
                    // All or nothing
                    self.discard(user_id, &stored).await;
                    return Err(e);
                }
            }
        }

        if stored.is_empty() {
            return Err(AppError::BadRequest(format!(
                "No files found in the '{}' field",
                IMAGE_FIELD
            )));
        }

        tracing::info!("User {} uploaded {} image(s)", user_id, stored.len());
        Ok(stored.iter().map(|name| self.public_url(user_id, name)).collect())
    }

    async fn store_field(&self, field: Field<'_>, user_id: Uuid) -> AppResult<String> {
        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();

        if !is_safe_filename(&original_name) {
            return Err(AppError::BadRequest("Unsafe file name".to_string()));
        }

        let data = read_field_with_limit(field).await?;
        let image_type = validate_image(&data, &original_name, &content_type)?;

        let file_name = generate_file_name(image_type.canonical_extension());
        let user_dir = self.user_dir(user_id);
        fs::create_dir_all(&user_dir).await?;

        let temp_path = self.temp_dir.join(format!("{}.tmp", file_name));
        let final_path = user_dir.join(&file_name);
        write_file_atomic(&temp_path, &final_path, &data).await?;

        tracing::debug!(
            "Stored {} ({} bytes, sha256={})",
            final_path.display(),
            data.len(),
            hex::encode(Sha256::digest(&data))
        );

        Ok(file_name)
    }

    async fn discard(&self, user_id: Uuid, file_names: &[String]) {
        for name in file_names {
            if let Err(e) = fs::remove_file(self.user_dir(user_id).join(name)).await {
                tracing::warn!("Failed to remove partial upload {}: {}", name, e);
            }
        }
    }

    /// Remove one stored image; callers may only touch their own folder
    pub async fn delete_image(&self, caller: Uuid, owner: &str, file_name: &str) -> AppResult<()> {
        let owner = Uuid::parse_str(owner)
            .map_err(|_| AppError::BadRequest("Invalid user id in path".to_string()))?;

        if owner != caller {
            return Err(AppError::Forbidden("You can only delete your own images".to_string()));
        }

        if !is_safe_filename(file_name) || !STORED_NAME.is_match(file_name) {
            return Err(AppError::BadRequest("Invalid file name".to_string()));
        }

        let user_dir = self.user_dir(owner);
        let path = user_dir.join(file_name);

        // Symlinks inside the folder must not lead elsewhere
        if let (Ok(resolved), Ok(root)) = (fs::canonicalize(&path).await, fs::canonicalize(&user_dir).await) {
            if !resolved.starts_with(&root) {
                return Err(AppError::Forbidden("Path escapes the upload folder".to_string()));
            }
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("User {} deleted image {}", caller, file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Image {} already gone", file_name);
                Ok(())
            }
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }
}

// ===== FILE IO =====

async fn read_field_with_limit(mut field: Field<'_>) -> AppResult<Vec<u8>> {
    let mut data = Vec::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        if data.len() + chunk.len() > MAX_IMAGE_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "Each image must be at most {} MB",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }
        data.extend_from_slice(&chunk);
    }

    if data.is_empty() {
        return Err(AppError::BadRequest("Empty files are not allowed".to_string()));
    }

    Ok(data)
}

/// Write to a temp file, fsync, then rename into place
pub async fn write_file_atomic(temp_path: &Path, final_path: &Path, data: &[u8]) -> AppResult<()> {
    let write = async {
        let mut file = fs::File::create(temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        set_file_permissions(temp_path).await?;
        fs::rename(temp_path, final_path).await
    };

    if let Err(e) = write.await {
        let _ = fs::remove_file(temp_path).await;
        return Err(AppError::Storage(format!("Failed to store {}: {}", final_path.display(), e)));
    }

    Ok(())
}

#[cfg(unix)]
async fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await
}

#[cfg(not(unix))]
async fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn create_directory(path: &Path) -> AppResult<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| AppError::Storage(format!("Cannot create {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";

    fn temp_storage() -> PathBuf {
        std::env::temp_dir().join(format!("stayhub-upload-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_validate_image_checks_all_three_signals() {
        assert_eq!(
            validate_image(PNG, "room.PNG", "image/png").unwrap().canonical_extension(),
            "png"
        );
        assert_eq!(
            validate_image(WEBP, "pool.webp", "image/webp").unwrap().canonical_extension(),
            "webp"
        );
        assert_eq!(
            validate_image(&[0xFF, 0xD8, 0xFF, 0xE0], "a.jpeg", "image/jpeg")
                .unwrap()
                .canonical_extension(),
            "jpg"
        );

        assert!(validate_image(PNG, "room.pdf", "application/pdf").is_err());
        assert!(validate_image(PNG, "room.png", "image/gif").is_err());
        assert!(validate_image(b"GIF89a-but-named-png", "room.png", "image/png").is_err());
        assert!(validate_image(b"RIFF\0\0\0\0WAVE", "x.webp", "image/webp").is_err());
    }

    #[test]
    fn test_oversized_image_rejected() {
        let mut big = PNG.to_vec();
        big.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(matches!(
            validate_image(&big, "big.png", "image/png"),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_safe_filenames() {
        assert!(is_safe_filename("beach house.jpg"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("a/b.png"));
        assert!(!is_safe_filename("con.png"));
        assert!(!is_safe_filename(""));
    }

    #[test]
    fn test_generated_names_match_stored_pattern() {
        let name = generate_file_name("webp");
        assert!(STORED_NAME.is_match(&name), "{}", name);
        assert_ne!(generate_file_name("png"), generate_file_name("png"));
    }

    #[test]
    fn test_atomic_write_and_delete_own_image() {
        tokio_test::block_on(async {
            let base = temp_storage();
            let uploader = ImageUploader::new(&base, "http://cdn.test/storage/", 2).unwrap();
            let user = Uuid::new_v4();

            let name = generate_file_name("png");
            let dir = uploader.user_dir(user);
            fs::create_dir_all(&dir).await.unwrap();
            write_file_atomic(&uploader.temp_dir.join("x.tmp"), &dir.join(&name), PNG)
                .await
                .unwrap();

            assert_eq!(fs::read(dir.join(&name)).await.unwrap(), PNG);
            assert!(!uploader.temp_dir.join("x.tmp").exists());
            assert_eq!(
                uploader.public_url(user, &name),
                format!("http://cdn.test/storage/property-images/{}/{}", user, name)
            );

            let other = Uuid::new_v4();
            assert!(matches!(
                uploader.delete_image(other, &user.to_string(), &name).await,
                Err(AppError::Forbidden(_))
            ));
            assert!(uploader.delete_image(user, &user.to_string(), "../../secret.png").await.is_err());

            uploader.delete_image(user, &user.to_string(), &name).await.unwrap();
            assert!(!dir.join(&name).exists());
            // Second delete is a no-op
            uploader.delete_image(user, &user.to_string(), &name).await.unwrap();

            let _ = std::fs::remove_dir_all(&base);
        });
    }

    #[test]
    fn test_upload_tracker_one_slot_per_user() {
        let tracker = UploadTracker::new(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let slot_a = tracker.acquire_slot(a).unwrap();
        assert!(tracker.acquire_slot(a).is_err());
        let _slot_b = tracker.acquire_slot(b).unwrap();
        assert!(tracker.acquire_slot(c).is_err());

        drop(slot_a);
        assert!(tracker.acquire_slot(c).is_ok());
    }

    #[test]
    fn test_abandoned_upload_frees_its_slot() {
        let tracker = UploadTracker::new(2);
        let user = Uuid::new_v4();

        let held = tracker.clone();
        let mut upload = tokio_test::task::spawn(async move {
            let _slot = held.acquire_slot(user)?;
            std::future::pending::<()>().await;
            Ok::<(), AppError>(())
        });
        tokio_test::assert_pending!(upload.poll());
        assert!(tracker.acquire_slot(user).is_err());

        // a timed-out or disconnected request drops its future mid-flight
        drop(upload);
        assert!(tracker.acquire_slot(user).is_ok());
    }
}
