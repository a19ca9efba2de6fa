//! Track sources
//!
//! A `BlobSource` is something the user picked: a file on disk or a blob
//! already in memory. Reading it is asynchronous; the bytes become a
//! `Track` once the read completes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Vocabulary for masked titles, rotated by playlist index
pub const MASK_SUBJECTS: [&str; 5] = ["Math", "Science", "English", "History", "Language"];

/// Derive an innocuous display title from a playlist index
///
/// The real name is ignored on purpose: two different files at the same
/// index always get the same title.
///
/// # Example
/// ```
/// use veil::track::mask_title;
/// assert_eq!(mask_title("secret.flac", 0), "Unit 1 - Math Lecture.mp3");
/// assert_eq!(mask_title("other.ogg", 6), "Unit 7 - Science Lecture.mp3");
/// ```
pub fn mask_title(_name: &str, index: usize) -> String {
    let topic = MASK_SUBJECTS[index % MASK_SUBJECTS.len()];
    format!("Unit {} - {} Lecture.mp3", index + 1, topic)
}

/// Guess a MIME type from a file name's extension
///
/// Unknown extensions map to `application/octet-stream`.
pub fn mime_from_file_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// A user-selected blob whose content has not been read yet
#[derive(Clone)]
pub enum BlobSource {
    /// A file on disk
    Path(PathBuf),
    /// Bytes already in memory, with the name and MIME type they came with
    Memory {
        name: String,
        mime: String,
        data: Arc<[u8]>,
    },
}

impl BlobSource {
    /// In-memory blob with a MIME type guessed from its name
    pub fn memory(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime = mime_from_file_name(&name).to_string();
        BlobSource::Memory {
            name,
            mime,
            data: data.into(),
        }
    }

    /// Original file name (never shown in the player UI)
    pub fn name(&self) -> String {
        match self {
            BlobSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            BlobSource::Memory { name, .. } => name.clone(),
        }
    }

    /// Declared MIME type, or one guessed from the file extension
    pub fn mime(&self) -> String {
        match self {
            BlobSource::Path(_) => mime_from_file_name(&self.name()).to_string(),
            BlobSource::Memory { mime, .. } => mime.clone(),
        }
    }

    /// Read the whole blob without blocking the event loop
    pub async fn read(&self) -> Result<Arc<[u8]>> {
        match self {
            BlobSource::Path(path) => {
                let bytes = tokio::fs::read(path).await?;
                Ok(Arc::from(bytes))
            }
            BlobSource::Memory { data, .. } => Ok(Arc::clone(data)),
        }
    }
}

impl fmt::Debug for BlobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            BlobSource::Memory { name, mime, data } => f
                .debug_struct("Memory")
                .field("name", name)
                .field("mime", mime)
                .field("len", &data.len())
                .finish(),
        }
    }
}
