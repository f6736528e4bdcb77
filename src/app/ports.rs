use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Account, DocumentList, FileUpload, PreviewOptions, Session, StoredFile};
use crate::error::Result;
use crate::query::Query;

/// Authentication accounts and sessions.
#[async_trait]
pub trait AccountPort: Send + Sync {
    async fn create_account(&self, user_id: &str, email: &str, password: &str, name: &str) -> Result<Account>;
    async fn create_email_session(&self, email: &str, password: &str) -> Result<Session>;
    async fn get_account(&self) -> Result<Account>;
    /// `"current"` deletes the session this client is using.
    async fn delete_session(&self, session_id: &str) -> Result<()>;
    /// URL of an image rendering `name`'s initials. Builds the URL only.
    fn initials_avatar_url(&self, name: &str) -> Result<String>;
}

/// Schemaless document collections inside one database.
#[async_trait]
pub trait DatabasePort: Send + Sync {
    async fn create_document(&self, collection_id: &str, document_id: &str, data: Value) -> Result<Value>;
    async fn get_document(&self, collection_id: &str, document_id: &str) -> Result<Value>;
    async fn list_documents(&self, collection_id: &str, queries: &[Query]) -> Result<DocumentList<Value>>;
}

/// File buckets.
#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn create_file(&self, bucket_id: &str, file_id: &str, file: FileUpload) -> Result<StoredFile>;
    /// URL of a resized rendition of a stored file. Builds the URL only.
    fn file_preview_url(&self, bucket_id: &str, file_id: &str, options: &PreviewOptions) -> Result<String>;
}
