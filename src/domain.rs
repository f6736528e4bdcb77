use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GatewayError, Result};

/// A persisted record as returned by the backend: system metadata plus the
/// entity's own attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document<T> {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$collectionId", default)]
    pub collection_id: String,
    #[serde(rename = "$databaseId", default)]
    pub database_id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "$permissions", default)]
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentList<T> {
    pub total: u64,
    pub documents: Vec<T>,
}

impl<T> DocumentList<T> {
    pub fn empty() -> Self {
        Self { total: 0, documents: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub account_id: String,
    pub email: String,
    pub username: String,
    pub avatar: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    /// Always equal to the document's own `$id`.
    pub restaurant_id: String,
    pub name: String,
    pub direction: String,
    pub menu: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub creator: Option<Creator>,
}

/// The creator attribute comes back either as a bare user id or, when the
/// collection resolves the relationship, as the full user document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Creator {
    Id(String),
    Expanded(Box<Document<User>>),
}

impl Creator {
    pub fn id(&self) -> &str {
        match self {
            Creator::Id(id) => id,
            Creator::Expanded(user) => &user.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub restaurant_id: String,
    pub user_id: String,
    pub rating_place: i32,
    pub rating_dish: i32,
    pub rating_service: i32,
    pub write_review: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub restaurant_id: String,
    pub user_id: String,
    /// Free-form text, never validated as a number.
    pub number_of_people: String,
    pub visit_date: DateTime<Utc>,
}

/// An authentication account, distinct from the User profile document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub expire: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    pub bucket_id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size_original: u64,
}

/// A local file waiting to be uploaded.
#[derive(Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, guessing the MIME type from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GatewayError::InvalidInput(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
        Ok(Self { name, mime_type, bytes })
    }
}

/// What the caller intends to do with an uploaded file. Only images have a
/// preview rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Document,
}

impl FileKind {
    pub fn supports_preview(self) -> bool {
        matches!(self, FileKind::Image)
    }
}

impl FromStr for FileKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(FileKind::Image),
            "video" => Ok(FileKind::Video),
            "audio" => Ok(FileKind::Audio),
            "document" => Ok(FileKind::Document),
            other => Err(GatewayError::InvalidInput(format!("Invalid file type: {}", other))),
        }
    }
}

/// Parameters of the rendition requested from the storage preview endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOptions {
    pub width: u32,
    pub height: u32,
    pub gravity: &'static str,
    pub quality: u8,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 2000,
            gravity: "top",
            quality: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestaurantForm {
    pub name: String,
    pub direction: String,
    pub menu: String,
    pub kind: String,
    pub image: Option<FileUpload>,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct ReviewForm {
    pub rating_place: i32,
    pub rating_dish: i32,
    pub rating_service: i32,
    pub write_review: String,
    pub recommendation: String,
}

#[derive(Debug, Clone)]
pub struct ItineraryForm {
    pub number_of_people: String,
    pub visit_date: DateTime<Utc>,
}
