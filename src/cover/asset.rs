//! Panic asset
//!
//! The image or document shown while the cover is up. The embeddable data
//! URL is built once when the asset is set; rendering just hands it out.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};

/// MIME type of Word documents
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// What kind of cover asset is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Document,
    #[default]
    None,
}

impl AssetKind {
    /// Classify a MIME type; `None` means it is not allowed as a cover
    pub fn classify(mime: &str) -> Option<AssetKind> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("image/") {
            Some(AssetKind::Image)
        } else if essence == "application/pdf" || essence == DOCX_MIME {
            Some(AssetKind::Document)
        } else {
            None
        }
    }
}

/// Embeddable view of the cover asset
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DisplayHandle {
    /// Image element source
    Image { src: String },
    /// Document frame source
    Document { src: String },
    /// Nothing selected yet
    #[default]
    Blank,
}

/// The currently selected cover asset
#[derive(Debug, Clone, Default)]
pub struct PanicAsset {
    data: Option<Arc<[u8]>>,
    mime: String,
    kind: AssetKind,
    handle: DisplayHandle,
}

impl PanicAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cover asset
    ///
    /// # Errors
    /// * `UnsupportedType` - not an image, PDF or .docx document
    /// * `Unreadable` - the blob is empty
    ///
    /// On error the previous asset is kept unchanged.
    pub fn set_asset(&mut self, data: impl Into<Arc<[u8]>>, mime: &str) -> Result<AssetKind> {
        let Some(kind) = AssetKind::classify(mime) else {
            warn!("[COVER] Rejected cover asset of type {}", mime);
            return Err(VeilError::UnsupportedType {
                mime: mime.to_string(),
            });
        };

        let data: Arc<[u8]> = data.into();
        if data.is_empty() {
            return Err(VeilError::unreadable("cover asset is empty"));
        }

        let src = format!("data:{};base64,{}", mime, STANDARD.encode(&data));
        self.handle = match kind {
            AssetKind::Image => DisplayHandle::Image { src },
            _ => DisplayHandle::Document { src },
        };
        self.data = Some(data);
        self.mime = mime.to_string();
        self.kind = kind;
        info!("[COVER] Cover asset set ({:?}, {})", kind, mime);
        Ok(kind)
    }

    /// View to embed in the cover region
    pub fn render(&self) -> DisplayHandle {
        self.handle.clone()
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data(&self) -> Option<&Arc<[u8]>> {
        self.data.as_ref()
    }
}
