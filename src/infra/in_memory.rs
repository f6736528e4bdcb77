use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::app::ports::{AccountPort, DatabasePort, StoragePort};
use crate::config::Config;
use crate::domain::{Account, DocumentList, FileUpload, PreviewOptions, Session, StoredFile};
use crate::error::{GatewayError, Result};
use crate::id;
use crate::infra::urls;
use crate::query::Query;

/// Page size the backend applies when a list call sets no limit.
pub const DEFAULT_LIST_LIMIT: usize = 25;
const MIN_PASSWORD_LEN: usize = 8;

struct AccountRecord {
    account: Account,
    password: String,
}

/// In-memory backend for development/testing. Mirrors the hosted service's
/// observable behaviour closely enough for the gateway: one current session,
/// metadata stamped on create, list queries with the same default page size.
pub struct InMemoryBackend {
    endpoint: String,
    project_id: String,
    database_id: String,
    accounts: Mutex<HashMap<String, AccountRecord>>,
    session: Mutex<Option<Session>>,
    collections: Mutex<HashMap<String, Vec<Value>>>,
    buckets: Mutex<HashMap<String, HashMap<String, (StoredFile, Vec<u8>)>>>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
    storage_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryBackend {
    /// Creates a backend with the configured collections and bucket already
    /// provisioned.
    pub fn new(config: &Config) -> Self {
        let c = &config.collections;
        let collections = [
            &c.user_collection_id,
            &c.restaurant_collection_id,
            &c.reviews_collection_id,
            &c.itineraries_collection_id,
        ]
        .into_iter()
        .map(|collection_id| (collection_id.clone(), Vec::new()))
        .collect();
        let buckets = HashMap::from([(c.storage_id.clone(), HashMap::new())]);

        Self {
            endpoint: config.backend.endpoint.trim_end_matches('/').to_string(),
            project_id: config.backend.project_id.clone(),
            database_id: c.database_id.clone(),
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            collections: Mutex::new(collections),
            buckets: Mutex::new(buckets),
            last_timestamp: Mutex::new(None),
            storage_calls: AtomicUsize::new(0),
        }
    }

    /// Number of storage calls that reached this backend.
    pub fn storage_calls(&self) -> usize {
        self.storage_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn document_count(&self, collection_id: &str) -> usize {
        lock(&self.collections)
            .get(collection_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        lock(&self.accounts).len()
    }

    pub fn stored_file(&self, bucket_id: &str, file_id: &str) -> Option<(StoredFile, Vec<u8>)> {
        lock(&self.buckets)
            .get(bucket_id)
            .and_then(|files| files.get(file_id))
            .cloned()
    }

    /// Strictly increasing creation timestamps so `$createdAt` ordering is
    /// total even for documents created within the same millisecond.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = lock(&self.last_timestamp);
        // Stored timestamps carry millisecond precision
        let now = Utc
            .timestamp_millis_opt(Utc::now().timestamp_millis())
            .single()
            .unwrap_or_else(Utc::now);
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    fn current_session(&self) -> Result<Session> {
        lock(&self.session)
            .clone()
            .ok_or_else(|| GatewayError::AuthFailure("User (role: guests) missing scope (account)".to_string()))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl AccountPort for InMemoryBackend {
    async fn create_account(&self, user_id: &str, email: &str, password: &str, name: &str) -> Result<Account> {
        if !id::is_valid(user_id) {
            return Err(GatewayError::InvalidInput(format!("Invalid userId: {}", user_id)));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(GatewayError::InvalidInput(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let mut accounts = lock(&self.accounts);
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(GatewayError::InvalidInput(
                "A user with the same id, email, or phone already exists in this project.".to_string(),
            ));
        }

        let account = Account {
            id: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: Some(self.next_timestamp()),
        };
        accounts.insert(
            key,
            AccountRecord {
                account: account.clone(),
                password: password.to_string(),
            },
        );
        debug!("Created account {} for {}", account.id, email);
        Ok(account)
    }

    async fn create_email_session(&self, email: &str, password: &str) -> Result<Session> {
        let user_id = {
            let accounts = lock(&self.accounts);
            match accounts.get(&email.to_lowercase()) {
                Some(record) if record.password == password => record.account.id.clone(),
                _ => {
                    return Err(GatewayError::AuthFailure(
                        "Invalid credentials. Please check the email and password.".to_string(),
                    ))
                }
            }
        };

        let mut session = lock(&self.session);
        if session.is_some() {
            return Err(GatewayError::AuthFailure(
                "Creation of a session is prohibited when a session is active.".to_string(),
            ));
        }
        let created = Session {
            id: id::unique(),
            user_id,
            expire: Some(Utc::now() + Duration::days(365)),
            current: true,
        };
        *session = Some(created.clone());
        Ok(created)
    }

    async fn get_account(&self) -> Result<Account> {
        let session = self.current_session()?;
        lock(&self.accounts)
            .values()
            .find(|r| r.account.id == session.user_id)
            .map(|r| r.account.clone())
            .ok_or_else(|| GatewayError::AuthFailure("Account for session no longer exists".to_string()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut session = lock(&self.session);
        let is_current = match session.as_ref() {
            None => {
                return Err(GatewayError::AuthFailure(
                    "User (role: guests) missing scope (account)".to_string(),
                ))
            }
            Some(current) => session_id == "current" || current.id == session_id,
        };
        if !is_current {
            return Err(GatewayError::NotFound(format!("Session {} not found", session_id)));
        }
        *session = None;
        Ok(())
    }

    fn initials_avatar_url(&self, name: &str) -> Result<String> {
        urls::initials_avatar(&self.endpoint, &self.project_id, name)
    }
}

#[async_trait]
impl DatabasePort for InMemoryBackend {
    async fn create_document(&self, collection_id: &str, document_id: &str, data: Value) -> Result<Value> {
        if !id::is_valid(document_id) {
            return Err(GatewayError::InvalidInput(format!("Invalid documentId: {}", document_id)));
        }
        let Value::Object(fields) = data else {
            return Err(GatewayError::InvalidInput("Document data must be an object".to_string()));
        };

        let created_at = timestamp(self.next_timestamp());
        let mut collections = lock(&self.collections);
        let documents = collections
            .get_mut(collection_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Collection {} not found", collection_id)))?;
        if documents.iter().any(|d| d["$id"] == document_id) {
            return Err(GatewayError::InvalidInput(
                "Document with the requested ID already exists.".to_string(),
            ));
        }

        let mut doc = Map::new();
        doc.insert("$id".to_string(), Value::from(document_id));
        doc.insert("$collectionId".to_string(), Value::from(collection_id));
        doc.insert("$databaseId".to_string(), Value::from(self.database_id.clone()));
        doc.insert("$createdAt".to_string(), Value::from(created_at.clone()));
        doc.insert("$updatedAt".to_string(), Value::from(created_at));
        doc.insert("$permissions".to_string(), Value::Array(Vec::new()));
        doc.extend(fields);

        let doc = Value::Object(doc);
        documents.push(doc.clone());
        debug!("Created document {} in {}", document_id, collection_id);
        Ok(doc)
    }

    async fn get_document(&self, collection_id: &str, document_id: &str) -> Result<Value> {
        let collections = lock(&self.collections);
        let documents = collections
            .get(collection_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Collection {} not found", collection_id)))?;
        documents
            .iter()
            .find(|d| d["$id"] == document_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound("Document with the requested ID could not be found.".to_string()))
    }

    async fn list_documents(&self, collection_id: &str, queries: &[Query]) -> Result<DocumentList<Value>> {
        let collections = lock(&self.collections);
        let documents = collections
            .get(collection_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Collection {} not found", collection_id)))?;
        Ok(evaluate(documents, queries))
    }
}

/// Applies filters, then ordering, then offset/limit, the way the hosted
/// service does. `total` counts matches before paging.
fn evaluate(documents: &[Value], queries: &[Query]) -> DocumentList<Value> {
    let mut matched: Vec<&Value> = documents
        .iter()
        .filter(|doc| queries.iter().all(|q| matches_filter(doc, q)))
        .collect();

    let orders: Vec<(&str, bool)> = queries
        .iter()
        .filter_map(|q| match q {
            Query::OrderAsc(attr) => Some((attr.as_str(), false)),
            Query::OrderDesc(attr) => Some((attr.as_str(), true)),
            _ => None,
        })
        .collect();
    if !orders.is_empty() {
        matched.sort_by(|a, b| {
            orders
                .iter()
                .map(|(attr, desc)| {
                    let ord = compare_values(&a[*attr], &b[*attr]);
                    if *desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let offset = queries
        .iter()
        .rev()
        .find_map(|q| match q {
            Query::Offset(n) => Some(*n as usize),
            _ => None,
        })
        .unwrap_or(0);
    let limit = queries
        .iter()
        .rev()
        .find_map(|q| match q {
            Query::Limit(n) => Some(*n as usize),
            _ => None,
        })
        .unwrap_or(DEFAULT_LIST_LIMIT);

    let total = matched.len() as u64;
    let documents = matched.into_iter().skip(offset).take(limit).cloned().collect();
    DocumentList { total, documents }
}

fn matches_filter(doc: &Value, query: &Query) -> bool {
    match query {
        Query::Equal { attribute, values } => {
            let field = &doc[attribute.as_str()];
            match field {
                Value::Array(items) => items.iter().any(|item| values.contains(item)),
                other => values.contains(other),
            }
        }
        Query::Search { attribute, value } => {
            let Some(text) = doc[attribute.as_str()].as_str() else {
                return false;
            };
            let text = text.to_lowercase();
            value
                .split_whitespace()
                .all(|term| text.contains(&term.to_lowercase()))
        }
        _ => true,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl StoragePort for InMemoryBackend {
    async fn create_file(&self, bucket_id: &str, file_id: &str, file: FileUpload) -> Result<StoredFile> {
        self.storage_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if !id::is_valid(file_id) {
            return Err(GatewayError::InvalidInput(format!("Invalid fileId: {}", file_id)));
        }

        let mut buckets = lock(&self.buckets);
        let files = buckets
            .get_mut(bucket_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Storage bucket {} not found", bucket_id)))?;
        if files.contains_key(file_id) {
            return Err(GatewayError::InvalidInput(
                "A storage file with the requested ID already exists.".to_string(),
            ));
        }

        let stored = StoredFile {
            id: file_id.to_string(),
            bucket_id: bucket_id.to_string(),
            name: file.name,
            mime_type: file.mime_type,
            size_original: file.bytes.len() as u64,
        };
        files.insert(file_id.to_string(), (stored.clone(), file.bytes));
        debug!("Stored file {} ({} bytes)", file_id, stored.size_original);
        Ok(stored)
    }

    fn file_preview_url(&self, bucket_id: &str, file_id: &str, options: &PreviewOptions) -> Result<String> {
        urls::file_preview(&self.endpoint, &self.project_id, bucket_id, file_id, options)
    }
}
