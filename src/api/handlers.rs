//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Every handler resolves the
//! namespace in its path to a shared cache handle first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{Cache, ExpiryModel};
use crate::config::{CacheSettings, Config};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FieldsResponse, GetManyRequest, GetManyResponse, GetResponse,
    HealthResponse, MigrateResponse, SetManyRequest, SetRequest, SetResponse, TtlResponse,
    VacuumRequest, VacuumResponse,
};
use crate::namespace::Namespace;
use crate::store::Store;
use crate::tasks::{prepare_invocation, spawn_vacuum_task};

/// A namespace the server has already opened.
struct OpenNamespace {
    cache: Cache<dyn Store>,
    vacuum: Option<JoinHandle<()>>,
}

/// Application state shared across all handlers.
///
/// Holds the store handle and the caches opened so far, keyed by namespace name.
#[derive(Clone)]
pub struct AppState {
    /// Store shared by every namespace
    pub store: Arc<dyn Store>,
    /// Engine settings applied to each namespace
    pub settings: CacheSettings,
    /// Per-namespace background vacuum interval; no task when unset
    vacuum_interval: Option<Duration>,
    /// One slot per namespace name, filled once its maintenance has run
    namespaces: Arc<RwLock<HashMap<String, Arc<OnceCell<OpenNamespace>>>>>,
}

impl AppState {
    /// Creates a new AppState without background vacuuming.
    pub fn new(store: Arc<dyn Store>, settings: CacheSettings) -> Self {
        Self {
            store,
            settings,
            vacuum_interval: None,
            namespaces: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Vacuums every opened namespace in the background at this interval.
    pub fn with_vacuum_interval(mut self, interval: Duration) -> Self {
        self.vacuum_interval = Some(interval).filter(|interval| !interval.is_zero());
        self
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Self {
        Self::new(store, config.cache)
            .with_vacuum_interval(Duration::from_secs(config.vacuum_interval))
    }

    /// Returns the cache for a namespace, opening it on first use.
    ///
    /// Opening runs invocation maintenance once and, for the emulated model, starts
    /// the namespace's vacuum task. Requests for other namespaces are not held up while
    /// one is opening.
    pub async fn cache_for(&self, name: &str) -> Result<Cache<dyn Store>> {
        let namespace = Namespace::new(name)?;
        let slot = self.slot(name).await;

        let open = slot
            .get_or_try_init(|| self.open_namespace(namespace))
            .await?;
        Ok(open.cache.clone())
    }

    /// The namespace's slot. The map lock is held only to find or add it.
    async fn slot(&self, name: &str) -> Arc<OnceCell<OpenNamespace>> {
        if let Some(slot) = self.namespaces.read().await.get(name) {
            return Arc::clone(slot);
        }

        let mut namespaces = self.namespaces.write().await;
        Arc::clone(namespaces.entry(name.to_string()).or_default())
    }

    /// Opens a namespace. On error the slot stays empty and the next request retries.
    async fn open_namespace(&self, namespace: Namespace) -> Result<OpenNamespace> {
        let cache = Cache::open(Arc::clone(&self.store), namespace, self.settings)?;

        match prepare_invocation(&cache, &self.settings).await {
            Ok(report) => info!(
                namespace = %cache.namespace(),
                migrated = report.migrated,
                vacuumed = report.vacuumed,
                "Opened namespace"
            ),
            // Native reads are only correct once migration has run
            Err(e) if self.settings.expiry_model == ExpiryModel::Native => {
                warn!(namespace = %cache.namespace(), "Namespace migration failed: {}", e);
                return Err(e);
            }
            Err(e) => warn!(namespace = %cache.namespace(), "Namespace maintenance failed: {}", e),
        }

        let vacuum = match (self.vacuum_interval, self.settings.expiry_model) {
            (Some(interval), ExpiryModel::Emulated) => Some(spawn_vacuum_task(
                cache.clone(),
                interval,
                self.settings.vacuum_delete_count,
            )),
            _ => None,
        };

        Ok(OpenNamespace { cache, vacuum })
    }

    /// Stops every background vacuum task.
    pub async fn shutdown(&self) {
        let namespaces = self.namespaces.read().await;
        for open in namespaces.values().filter_map(|slot| slot.get()) {
            if let Some(handle) = &open.vacuum {
                handle.abort();
            }
        }
    }
}

/// Handler for PUT /ns/:ns/fields
pub async fn set_handler(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.cache_for(&ns).await?;
    cache.set(&req.key, &req.value, req.ttl).await?;

    Ok(Json(SetResponse::new(1)))
}

/// Handler for PUT /ns/:ns/batch
///
/// Writes every entry in one atomic step.
pub async fn set_many_handler(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    Json(req): Json<SetManyRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.cache_for(&ns).await?;
    let entries = req.into_tuples();
    cache.set_many(&entries).await?;

    Ok(Json(SetResponse::new(entries.len())))
}

/// Handler for GET /ns/:ns/fields
pub async fn get_all_handler(
    State(state): State<AppState>,
    Path(ns): Path<String>,
) -> Result<Json<FieldsResponse>> {
    let cache = state.cache_for(&ns).await?;
    let fields = cache.get_all().await?;

    Ok(Json(FieldsResponse {
        namespace: ns,
        fields,
    }))
}

/// Handler for POST /ns/:ns/query
///
/// Values come back in request order, `null` for missing or expired fields.
pub async fn get_many_handler(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    Json(req): Json<GetManyRequest>,
) -> Result<Json<GetManyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.cache_for(&ns).await?;
    let values = cache.get_many(&req.keys).await?;

    Ok(Json(GetManyResponse { values }))
}

/// Handler for GET /ns/:ns/fields/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((ns, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let cache = state.cache_for(&ns).await?;
    let value = cache
        .get(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /ns/:ns/fields/:key
///
/// Deleting a missing field still succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((ns, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let cache = state.cache_for(&ns).await?;
    cache.delete(&key).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /ns/:ns/fields/:key/ttl
pub async fn ttl_handler(
    State(state): State<AppState>,
    Path((ns, key)): Path<(String, String)>,
) -> Result<Json<TtlResponse>> {
    let cache = state.cache_for(&ns).await?;
    let remaining = cache.ttl(&key).await?;

    Ok(Json(TtlResponse::new(key, remaining)))
}

/// Handler for POST /ns/:ns/vacuum
///
/// The body is optional; without a `delete_count` the configured count is used.
pub async fn vacuum_handler(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    req: Option<Json<VacuumRequest>>,
) -> Result<Json<VacuumResponse>> {
    let delete_count = req
        .and_then(|Json(req)| req.delete_count)
        .unwrap_or(state.settings.vacuum_delete_count);

    let cache = state.cache_for(&ns).await?;
    let removed = cache.vacuum(delete_count).await?;

    Ok(Json(VacuumResponse { removed }))
}

/// Handler for POST /ns/:ns/migrate
pub async fn migrate_handler(
    State(state): State<AppState>,
    Path(ns): Path<String>,
) -> Result<Json<MigrateResponse>> {
    let cache = state.cache_for(&ns).await?;
    let migrated = cache.migrator().run().await?;

    Ok(Json(MigrateResponse { migrated }))
}

/// Handler for GET /health
///
/// Returns server health status.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.settings.expiry_model.to_string()))
}
