use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::app::ports::{AccountPort, DatabasePort, StoragePort};
use crate::config::Collections;
use crate::domain::{
    Account, Creator, Document, FileKind, FileUpload, Itinerary, ItineraryForm, PreviewOptions,
    Restaurant, RestaurantForm, Review, ReviewForm, Session, User,
};
use crate::error::{GatewayError, Result};
use crate::id;
use crate::metrics::GatewayMetrics;
use crate::query::{Query, CREATED_AT};

/// Page size of the owner's restaurant listing on the home screen.
pub const OWNER_PAGE_LIMIT: u32 = 10;
/// How many restaurants the "latest" carousel shows.
pub const LATEST_LIMIT: u32 = 7;

const CURRENT_SESSION: &str = "current";

/// One async function per application intent, each a single round trip (or a
/// fixed short sequence) against the backend.
pub struct RemoteGateway {
    account: Arc<dyn AccountPort>,
    database: Arc<dyn DatabasePort>,
    storage: Arc<dyn StoragePort>,
    collections: Collections,
    preview: PreviewOptions,
}

impl RemoteGateway {
    pub fn new(
        account: Arc<dyn AccountPort>,
        database: Arc<dyn DatabasePort>,
        storage: Arc<dyn StoragePort>,
        collections: Collections,
    ) -> Self {
        Self {
            account,
            database,
            storage,
            collections,
            preview: PreviewOptions::default(),
        }
    }

    /// Wires all three ports to one backend implementation.
    pub fn from_backend<B>(backend: Arc<B>, collections: Collections) -> Self
    where
        B: AccountPort + DatabasePort + StoragePort + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend, collections)
    }

    // --- Accounts -------------------------------------------------------

    /// Registers an account, signs it in and creates the linked User profile.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        username: &str,
        role: &str,
    ) -> Result<Document<User>> {
        observe("create_user", async {
            let account = self
                .account
                .create_account(&id::unique(), email, password, username)
                .await?;
            if account.id.is_empty() {
                return Err(GatewayError::AuthFailure(
                    "account creation returned no identity".to_string(),
                ));
            }

            let avatar = self.account.initials_avatar_url(username)?;

            self.sign_in(email, password).await?;

            let user = User {
                account_id: account.id,
                email: email.to_string(),
                username: username.to_string(),
                avatar,
                role: role.to_string(),
            };
            let created = self
                .insert(&self.collections.user_collection_id, &id::unique(), &user)
                .await?;
            info!(user_id = %created.id, "Registered user");
            Ok(created)
        })
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        observe("sign_in", self.account.create_email_session(email, password)).await
    }

    pub async fn get_account(&self) -> Result<Account> {
        observe("get_account", self.account.get_account()).await
    }

    /// The profile of the signed-in user. Absence is not an error: any
    /// failure (no session, lookup error, no profile) yields `None`.
    pub async fn get_current_user(&self) -> Option<Document<User>> {
        let lookup = observe("get_current_user", async {
            let account = self.account.get_account().await?;
            let users = self
                .list::<User>(
                    &self.collections.user_collection_id,
                    &[Query::equal("accountId", account.id)],
                )
                .await?;
            Ok(users.into_iter().next())
        })
        .await;

        match lookup {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "No current user");
                None
            }
        }
    }

    pub async fn sign_out(&self) -> Result<()> {
        observe("sign_out", self.account.delete_session(CURRENT_SESSION)).await
    }

    // --- Files ----------------------------------------------------------

    /// Uploads `file` and returns its preview URL. No file means no upload
    /// and no URL. Kinds without a preview are rejected before uploading.
    pub async fn upload_file(&self, file: Option<FileUpload>, kind: FileKind) -> Result<Option<String>> {
        let Some(file) = file else {
            debug!("No file given, skipping upload");
            return Ok(None);
        };

        observe("upload_file", async {
            ensure_previewable(kind)?;
            let stored = self
                .storage
                .create_file(&self.collections.storage_id, &id::unique(), file)
                .await?;
            debug!(file_id = %stored.id, size = stored.size_original, "Uploaded file");
            let url = self.preview_url(&stored.id, kind)?;
            Ok(Some(url))
        })
        .await
    }

    pub fn get_file_preview(&self, file_id: &str, kind: FileKind) -> Result<String> {
        self.preview_url(file_id, kind)
    }

    fn preview_url(&self, file_id: &str, kind: FileKind) -> Result<String> {
        ensure_previewable(kind)?;
        self.storage
            .file_preview_url(&self.collections.storage_id, file_id, &self.preview)
    }

    // --- Restaurants ----------------------------------------------------

    pub async fn create_restaurant(&self, form: RestaurantForm) -> Result<Document<Restaurant>> {
        observe("create_restaurant", async {
            let RestaurantForm { name, direction, menu, kind, image, user_id } = form;
            let image = self.upload_file(image, FileKind::Image).await?;

            self.insert_with_generated_id(&self.collections.restaurant_collection_id, |restaurant_id| {
                Restaurant {
                    restaurant_id: restaurant_id.to_string(),
                    name,
                    direction,
                    menu,
                    kind,
                    image,
                    creator: Some(Creator::Id(user_id)),
                }
            })
            .await
        })
        .await
    }

    /// First page (10) of the restaurants `user_id` created.
    pub async fn get_all_restaurants(&self, user_id: &str) -> Result<Vec<Document<Restaurant>>> {
        observe(
            "get_all_restaurants",
            self.list(
                &self.collections.restaurant_collection_id,
                &[
                    Query::equal("creator", user_id),
                    Query::limit(OWNER_PAGE_LIMIT),
                    Query::offset(0),
                ],
            ),
        )
        .await
    }

    pub async fn get_latest_restaurants(&self) -> Result<Vec<Document<Restaurant>>> {
        observe(
            "get_latest_restaurants",
            self.list(
                &self.collections.restaurant_collection_id,
                &[Query::order_desc(CREATED_AT), Query::limit(LATEST_LIMIT)],
            ),
        )
        .await
    }

    /// Full-text search over restaurant names.
    pub async fn search_restaurants(&self, query: &str) -> Result<Vec<Document<Restaurant>>> {
        observe(
            "search_restaurants",
            self.list(
                &self.collections.restaurant_collection_id,
                &[Query::search("name", query)],
            ),
        )
        .await
    }

    /// Exact-name lookup. When several restaurants share the name, the first
    /// one in list order wins and the rest are dropped.
    pub async fn search_restaurant_by_name(&self, name: &str) -> Result<Document<Restaurant>> {
        observe("search_restaurant_by_name", async {
            let matches: Vec<Document<Restaurant>> = self
                .list(
                    &self.collections.restaurant_collection_id,
                    &[Query::equal("name", name)],
                )
                .await?;
            if matches.len() > 1 {
                debug!(restaurant_name = name, count = matches.len(), "Several restaurants share this name");
            }
            matches
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::NotFound("No restaurant found with that name".to_string()))
        })
        .await
    }

    pub async fn get_restaurants_by_owner(&self, user_id: &str) -> Result<Vec<Document<Restaurant>>> {
        observe(
            "get_restaurants_by_owner",
            self.list(
                &self.collections.restaurant_collection_id,
                &[Query::equal("creator", user_id)],
            ),
        )
        .await
    }

    pub async fn get_restaurant_by_id(&self, restaurant_id: &str) -> Result<Document<Restaurant>> {
        observe("get_restaurant_by_id", async {
            let raw = self
                .database
                .get_document(&self.collections.restaurant_collection_id, restaurant_id)
                .await
                .map_err(|e| match e {
                    GatewayError::NotFound(_) => {
                        GatewayError::NotFound(format!("Restaurant not found: {}", restaurant_id))
                    }
                    other => other,
                })?;
            Ok(serde_json::from_value(raw)?)
        })
        .await
    }

    // --- Reviews & itineraries ------------------------------------------

    pub async fn create_review(
        &self,
        form: ReviewForm,
        restaurant_id: &str,
        user_id: &str,
    ) -> Result<Document<Review>> {
        let review = Review {
            restaurant_id: restaurant_id.to_string(),
            user_id: user_id.to_string(),
            rating_place: form.rating_place,
            rating_dish: form.rating_dish,
            rating_service: form.rating_service,
            write_review: form.write_review,
            recommendation: form.recommendation,
        };
        observe(
            "create_review",
            self.insert(&self.collections.reviews_collection_id, &id::unique(), &review),
        )
        .await
    }

    /// Newest first.
    pub async fn get_reviews_by_restaurant_id(&self, restaurant_id: &str) -> Result<Vec<Document<Review>>> {
        observe(
            "get_reviews_by_restaurant_id",
            self.list(
                &self.collections.reviews_collection_id,
                &[
                    Query::equal("restaurantId", restaurant_id),
                    Query::order_desc(CREATED_AT),
                ],
            ),
        )
        .await
    }

    pub async fn create_itinerary(
        &self,
        form: ItineraryForm,
        restaurant_id: &str,
        user_id: &str,
    ) -> Result<Document<Itinerary>> {
        let itinerary = Itinerary {
            restaurant_id: restaurant_id.to_string(),
            user_id: user_id.to_string(),
            number_of_people: form.number_of_people,
            visit_date: form.visit_date,
        };
        observe(
            "create_itinerary",
            self.insert(&self.collections.itineraries_collection_id, &id::unique(), &itinerary),
        )
        .await
    }

    /// Newest first.
    pub async fn get_itineraries_by_user_id(&self, user_id: &str) -> Result<Vec<Document<Itinerary>>> {
        observe(
            "get_itineraries_by_user_id",
            self.list(
                &self.collections.itineraries_collection_id,
                &[Query::equal("userId", user_id), Query::order_desc(CREATED_AT)],
            ),
        )
        .await
    }

    // --- Helpers --------------------------------------------------------

    async fn insert<T>(&self, collection_id: &str, document_id: &str, data: &T) -> Result<Document<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let payload = serde_json::to_value(data)?;
        let raw = self
            .database
            .create_document(collection_id, document_id, payload)
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Generates the document id and hands it to `build`, so entities that
    /// embed their own id are created with it in a single step.
    async fn insert_with_generated_id<T, F>(&self, collection_id: &str, build: F) -> Result<Document<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> T,
    {
        let document_id = id::unique();
        let data = build(&document_id);
        self.insert(collection_id, &document_id, &data).await
    }

    async fn list<T>(&self, collection_id: &str, queries: &[Query]) -> Result<Vec<Document<T>>>
    where
        T: DeserializeOwned,
    {
        let page = self.database.list_documents(collection_id, queries).await?;
        debug!(collection_id, total = page.total, returned = page.documents.len(), "Listed documents");
        page.documents
            .into_iter()
            .map(|raw| serde_json::from_value(raw).map_err(GatewayError::from))
            .collect()
    }
}

fn ensure_previewable(kind: FileKind) -> Result<()> {
    if kind.supports_preview() {
        Ok(())
    } else {
        Err(GatewayError::InvalidInput("Invalid file type".to_string()))
    }
}

/// Runs one gateway operation inside a span and records its metrics.
async fn observe<T, F>(operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = fut.instrument(info_span!("gateway", operation)).await;
    GatewayMetrics::record_call(operation, started.elapsed());
    if let Err(e) = &result {
        GatewayMetrics::record_failure(operation, e.kind());
        warn!(operation, kind = e.kind(), error = %e, "Gateway call failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentList, StoredFile};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend double that fails or answers from canned values.
    #[derive(Default)]
    struct ScriptedBackend {
        account_id: String,
        account_error: bool,
        list_error: bool,
        created: Mutex<Vec<(String, String, Value)>>,
        sessions_opened: AtomicUsize,
    }

    #[async_trait]
    impl AccountPort for ScriptedBackend {
        async fn create_account(&self, _id: &str, email: &str, _pw: &str, name: &str) -> Result<Account> {
            Ok(Account {
                id: self.account_id.clone(),
                email: email.to_string(),
                name: name.to_string(),
                created_at: None,
            })
        }

        async fn create_email_session(&self, _email: &str, _pw: &str) -> Result<Session> {
            self.sessions_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Session {
                id: "s1".to_string(),
                user_id: self.account_id.clone(),
                expire: None,
                current: true,
            })
        }

        async fn get_account(&self) -> Result<Account> {
            if self.account_error {
                return Err(GatewayError::AuthFailure("missing scope (account)".to_string()));
            }
            Ok(Account {
                id: self.account_id.clone(),
                email: String::new(),
                name: String::new(),
                created_at: None,
            })
        }

        async fn delete_session(&self, _session_id: &str) -> Result<()> {
            Ok(())
        }

        fn initials_avatar_url(&self, name: &str) -> Result<String> {
            Ok(format!("https://avatars.test/{}", name))
        }
    }

    #[async_trait]
    impl DatabasePort for ScriptedBackend {
        async fn create_document(&self, collection_id: &str, document_id: &str, data: Value) -> Result<Value> {
            self.created
                .lock()
                .unwrap()
                .push((collection_id.to_string(), document_id.to_string(), data.clone()));
            let mut doc = data;
            doc["$id"] = Value::from(document_id);
            doc["$createdAt"] = Value::from("2024-10-01T10:00:00.000Z");
            doc["$updatedAt"] = Value::from("2024-10-01T10:00:00.000Z");
            Ok(doc)
        }

        async fn get_document(&self, _collection_id: &str, document_id: &str) -> Result<Value> {
            Err(GatewayError::NotFound(format!("Document {} not found", document_id)))
        }

        async fn list_documents(&self, _collection_id: &str, _queries: &[Query]) -> Result<DocumentList<Value>> {
            if self.list_error {
                return Err(GatewayError::Backend { status: 500, message: "boom".to_string() });
            }
            Ok(DocumentList::empty())
        }
    }

    #[async_trait]
    impl StoragePort for ScriptedBackend {
        async fn create_file(&self, bucket_id: &str, file_id: &str, file: FileUpload) -> Result<StoredFile> {
            Ok(StoredFile {
                id: file_id.to_string(),
                bucket_id: bucket_id.to_string(),
                name: file.name,
                mime_type: file.mime_type,
                size_original: file.bytes.len() as u64,
            })
        }

        fn file_preview_url(&self, bucket_id: &str, file_id: &str, options: &PreviewOptions) -> Result<String> {
            Ok(format!(
                "https://files.test/{}/{}?w={}&h={}&g={}&q={}",
                bucket_id, file_id, options.width, options.height, options.gravity, options.quality
            ))
        }
    }

    fn gateway(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, RemoteGateway) {
        let backend = Arc::new(backend);
        let gateway = RemoteGateway::from_backend(backend.clone(), Collections::default());
        (backend, gateway)
    }

    #[tokio::test]
    async fn test_create_user_without_identity_fails() {
        let (backend, gateway) = gateway(ScriptedBackend::default());

        let err = gateway
            .create_user("ana@example.com", "password123", "Ana", "client")
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AuthFailure(_)));
        assert_eq!(backend.sessions_opened.load(Ordering::SeqCst), 0);
        assert!(backend.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_user_links_account_and_avatar() {
        let (backend, gateway) = gateway(ScriptedBackend {
            account_id: "acc-1".to_string(),
            ..Default::default()
        });

        let user = gateway
            .create_user("ana@example.com", "password123", "Ana Ruiz", "client")
            .await
            .unwrap();

        assert_eq!(user.data.account_id, "acc-1");
        assert_eq!(user.data.avatar, "https://avatars.test/Ana Ruiz");
        assert_eq!(backend.sessions_opened.load(Ordering::SeqCst), 1);
        let created = backend.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, Collections::default().user_collection_id);
    }

    #[tokio::test]
    async fn test_current_user_swallows_account_failure() {
        let (_, gateway) = gateway(ScriptedBackend {
            account_error: true,
            ..Default::default()
        });
        assert!(gateway.get_current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_current_user_swallows_lookup_failure() {
        let (_, gateway) = gateway(ScriptedBackend {
            account_id: "acc-1".to_string(),
            list_error: true,
            ..Default::default()
        });
        assert!(gateway.get_current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_restaurant_is_not_found() {
        let (_, gateway) = gateway(ScriptedBackend::default());
        let err = gateway.get_restaurant_by_id("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(ref m) if m.contains("nope")));
    }

    #[tokio::test]
    async fn test_restaurant_id_matches_document_id() {
        let (backend, gateway) = gateway(ScriptedBackend::default());
        let form = RestaurantForm {
            name: "Casa Sena".to_string(),
            direction: "Plaza Mayor 1".to_string(),
            menu: "Tapas".to_string(),
            kind: "Spanish".to_string(),
            image: Some(FileUpload::new("front.png", "image/png", vec![1, 2, 3])),
            user_id: "u1".to_string(),
        };

        let doc = gateway.create_restaurant(form).await.unwrap();

        assert_eq!(doc.data.restaurant_id, doc.id);
        let image = doc.data.image.unwrap();
        assert!(image.contains("w=2000&h=2000&g=top&q=100"), "{}", image);
        let created = backend.created.lock().unwrap();
        assert_eq!(created[0].1, doc.id);
        assert_eq!(created[0].2["creator"], "u1");
        assert_eq!(created[0].2["type"], "Spanish");
    }

    #[test]
    fn test_preview_rejects_non_image() {
        let (_, gateway) = gateway(ScriptedBackend::default());
        assert!(matches!(
            gateway.get_file_preview("f1", FileKind::Document),
            Err(GatewayError::InvalidInput(_))
        ));
        assert!(gateway.get_file_preview("f1", FileKind::Image).is_ok());
    }
}
