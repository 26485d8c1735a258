//! Back-office control service for the Studydesk study app.
//!
//! Admin state lives in a single JSON blob behind [`store::AdminStore`];
//! lesson and syllabus resolution goes through [`content::ContentResolver`],
//! which only reaches the generation API when no admin-authored or cached
//! material exists.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api_envelope;
pub mod catalog;
pub mod config;
pub mod content;
pub mod rotation;
pub mod store;
pub mod types;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::api_envelope::{
    ApiErrorCode, ApiErrorTuple, conflict_error, error_response, not_found_error, ok_data,
    unauthorized_error, validation_error,
};
use crate::config::Config;
use crate::content::{ContentError, ContentResolver, ResolveParams, TestPaperTopic};
use crate::store::{
    AdminStore, ContentOverrideRecord, CreateUserInput, StoreError, SystemSettings,
    UpdateUserInput,
};
use crate::types::{Chapter, ClassLevel, ContentScope, ContentType, Language, Stream};

const SERVICE_NAME: &str = "studydesk-admin-service";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: AdminStore,
    resolver: ContentResolver,
}

pub fn build_router(config: Config) -> Router {
    let store = AdminStore::from_config(&config);
    let http = reqwest::Client::new();
    let resolver = ContentResolver::new(&config, store.clone(), http);
    let state = AppState {
        config: Arc::new(config),
        store,
        resolver,
    };

    let admin_router = Router::new()
        .route("/api/admin/users", get(list_users).post(create_user))
        .route(
            "/api/admin/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/api/admin/users/:id/messages", post(send_message))
        .route(
            "/api/admin/gift-codes",
            get(list_gift_codes).post(generate_gift_codes),
        )
        .route("/api/admin/gift-codes/redeem", post(redeem_gift_code))
        .route("/api/admin/gift-codes/:id", delete(delete_gift_code))
        .route("/api/admin/settings", get(get_settings).put(update_settings))
        .route("/api/admin/packages", post(add_package))
        .route("/api/admin/packages/:id", delete(remove_package))
        .route(
            "/api/admin/subjects",
            get(list_custom_subjects).post(upsert_subject),
        )
        .route("/api/admin/subjects/:id", delete(delete_subject))
        .route(
            "/api/admin/chapter-lists",
            get(get_chapter_list).put(save_chapter_list),
        )
        .route(
            "/api/admin/chapter-lists/delete-chapter",
            post(delete_chapter),
        )
        .route("/api/admin/content", get(list_overrides))
        .route(
            "/api/admin/content/:key",
            get(get_override).put(put_override).delete(delete_override),
        )
        .route("/api/admin/recycle-bin", get(list_recycle_bin))
        .route("/api/admin/recycle-bin/:id/restore", post(restore_entry))
        .route("/api/admin/recycle-bin/:id", delete(purge_entry))
        .route("/api/admin/demands", get(list_demands))
        .route("/api/admin/demands/:id", delete(delete_demand))
        .route("/api/admin/recovery-requests", get(list_recovery_requests))
        .route(
            "/api/admin/recovery-requests/:id/resolve",
            post(resolve_recovery_request),
        )
        .route(
            "/api/admin/activity-log",
            get(list_activity).post(log_activity),
        )
        .route(
            "/api/admin/db/:collection",
            get(export_collection).put(import_collection),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_token_gate,
        ));

    Router::new()
        .route("/healthz", get(health))
        .route("/api/subjects", get(list_subjects))
        .route("/api/content/resolve", post(resolve_content))
        .route("/api/content/chapters", post(fetch_chapters))
        .route("/api/content/test-paper", post(generate_test_paper))
        .route("/api/demands", post(add_demand))
        .route("/api/recovery-requests", post(add_recovery_request))
        .merge(admin_router)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

async fn admin_token_gate(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return unauthorized_error("Admin access token is not configured.").into_response();
    };

    match bearer_token(request.headers()) {
        Some(token) if token == expected => next.run(request).await,
        _ => unauthorized_error("Unauthenticated.").into_response(),
    }
}

fn store_error(error: StoreError) -> ApiErrorTuple {
    match error {
        StoreError::NotFound => not_found_error("Record not found."),
        StoreError::Validation { field, message } => validation_error(field, &message),
        StoreError::Conflict { message } => conflict_error(message),
        StoreError::Persistence { message } => {
            tracing::error!(target: "studydesk.api", %message, "store persistence failure");
            error_response(ApiErrorCode::InternalError, "Storage failure.")
        }
    }
}

fn content_error(error: ContentError) -> ApiErrorTuple {
    error_response(ApiErrorCode::UpstreamUnavailable, error.to_string())
}

/// Best-effort audit trail; a logging failure never fails the admin action.
async fn record_activity(state: &AppState, message: String) {
    if let Err(error) = state.store.log_activity(&message).await {
        tracing::warn!(
            target: "studydesk.api",
            error = %error,
            "failed to append activity log entry",
        );
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- public content routes ---

#[derive(Deserialize)]
struct SubjectsQuery {
    class_level: ClassLevel,
    #[serde(default)]
    stream: Option<Stream>,
}

async fn list_subjects(
    State(state): State<AppState>,
    Query(query): Query<SubjectsQuery>,
) -> impl IntoResponse {
    let settings = state.store.get_settings().await;
    let custom = state.store.list_custom_subjects().await;
    let subjects = catalog::subjects_for(
        query.class_level,
        query.stream,
        &custom,
        &settings.hidden_subjects,
    );
    ok_data(subjects)
}

#[derive(Deserialize)]
struct ResolveContentRequest {
    #[serde(flatten)]
    scope: ContentScope,
    chapter: Chapter,
    language: Language,
    content_type: ContentType,
    #[serde(default)]
    target_questions: Option<usize>,
}

async fn resolve_content(
    State(state): State<AppState>,
    Json(request): Json<ResolveContentRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let lesson = state
        .resolver
        .resolve_content(ResolveParams {
            scope: request.scope,
            chapter: request.chapter,
            language: request.language,
            content_type: request.content_type,
            target_questions: request.target_questions,
        })
        .await
        .map_err(content_error)?;
    Ok(ok_data(lesson))
}

#[derive(Deserialize)]
struct ChaptersRequest {
    #[serde(flatten)]
    scope: ContentScope,
    language: Language,
}

async fn fetch_chapters(
    State(state): State<AppState>,
    Json(request): Json<ChaptersRequest>,
) -> impl IntoResponse {
    let chapters = state
        .resolver
        .fetch_chapters(&request.scope, request.language)
        .await;
    ok_data(chapters)
}

#[derive(Deserialize)]
struct TestPaperRequest {
    topics: Vec<TestPaperTopic>,
    count: usize,
    language: Language,
}

async fn generate_test_paper(
    State(state): State<AppState>,
    Json(request): Json<TestPaperRequest>,
) -> impl IntoResponse {
    let paper = state
        .resolver
        .generate_test_paper(&request.topics, request.count.clamp(1, 100), request.language)
        .await;
    ok_data(paper)
}

#[derive(Deserialize)]
struct AddDemandRequest {
    #[serde(default)]
    user_name: Option<String>,
    detail: String,
}

async fn add_demand(
    State(state): State<AppState>,
    Json(request): Json<AddDemandRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let record = state
        .store
        .add_demand(request.user_name.as_deref(), &request.detail)
        .await
        .map_err(store_error)?;
    Ok(ok_data(record))
}

#[derive(Deserialize)]
struct AddRecoveryRequest {
    name: String,
    mobile: String,
}

async fn add_recovery_request(
    State(state): State<AppState>,
    Json(request): Json<AddRecoveryRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let record = state
        .store
        .add_recovery_request(&request.name, &request.mobile)
        .await
        .map_err(store_error)?;
    Ok(ok_data(record))
}

// --- users ---

#[derive(Deserialize)]
struct UsersQuery {
    #[serde(default)]
    search: Option<String>,
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> impl IntoResponse {
    ok_data(state.store.list_users(query.search.as_deref()).await)
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let user = state.store.create_user(input).await.map_err(store_error)?;
    record_activity(&state, format!("Created user {} ({})", user.name, user.id)).await;
    Ok(ok_data(user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let user = state.store.get_user(&id).await.map_err(store_error)?;
    Ok(ok_data(user))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUserInput>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let user = state
        .store
        .update_user(&id, input)
        .await
        .map_err(store_error)?;
    Ok(ok_data(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let entry = state.store.soft_delete_user(&id).await.map_err(store_error)?;
    record_activity(&state, format!("Moved user {} to recycle bin", entry.name)).await;
    Ok(ok_data(entry))
}

#[derive(Deserialize)]
struct SendMessageRequest {
    text: String,
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let user = state
        .store
        .send_message(&id, &request.text)
        .await
        .map_err(store_error)?;
    Ok(ok_data(user))
}

// --- gift codes ---

async fn list_gift_codes(State(state): State<AppState>) -> impl IntoResponse {
    ok_data(state.store.list_gift_codes().await)
}

#[derive(Deserialize)]
struct GenerateGiftCodesRequest {
    count: usize,
    amount: i64,
}

async fn generate_gift_codes(
    State(state): State<AppState>,
    Json(request): Json<GenerateGiftCodesRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let codes = state
        .store
        .generate_gift_codes(
            request.count,
            request.amount,
            &state.config.gift_code_prefix,
            Some("admin"),
        )
        .await
        .map_err(store_error)?;
    record_activity(
        &state,
        format!(
            "Generated {} gift codes worth {} credits each",
            codes.len(),
            request.amount
        ),
    )
    .await;
    Ok(ok_data(codes))
}

async fn delete_gift_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state.store.delete_gift_code(&id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct RedeemRequest {
    code: String,
    user_id: String,
}

#[derive(Serialize)]
struct RedeemResponse {
    code: store::GiftCodeRecord,
    user: store::UserRecord,
}

async fn redeem_gift_code(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let (code, user) = state
        .store
        .redeem_gift_code(&request.code, &request.user_id)
        .await
        .map_err(store_error)?;
    Ok(ok_data(RedeemResponse { code, user }))
}

// --- settings and packages ---

async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    ok_data(state.store.get_settings().await)
}

async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<SystemSettings>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let saved = state
        .store
        .update_settings(settings)
        .await
        .map_err(store_error)?;
    record_activity(&state, "Updated system settings".to_string()).await;
    Ok(ok_data(saved))
}

#[derive(Deserialize)]
struct AddPackageRequest {
    name: String,
    price: i64,
    credits: i64,
}

async fn add_package(
    State(state): State<AppState>,
    Json(request): Json<AddPackageRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let package = state
        .store
        .add_package(&request.name, request.price, request.credits)
        .await
        .map_err(store_error)?;
    Ok(ok_data(package))
}

async fn remove_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state.store.remove_package(&id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- subjects ---

async fn list_custom_subjects(State(state): State<AppState>) -> impl IntoResponse {
    ok_data(state.store.list_custom_subjects().await)
}

#[derive(Deserialize)]
struct UpsertSubjectRequest {
    name: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    color: String,
}

async fn upsert_subject(
    State(state): State<AppState>,
    Json(request): Json<UpsertSubjectRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let subject = state
        .store
        .upsert_subject(&request.name, &request.icon, &request.color)
        .await
        .map_err(store_error)?;
    Ok(ok_data(subject))
}

async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state.store.delete_subject(&id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- chapter lists ---

#[derive(Deserialize)]
struct ChapterListQuery {
    key: String,
}

async fn get_chapter_list(
    State(state): State<AppState>,
    Query(query): Query<ChapterListQuery>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let chapters = state
        .store
        .get_chapter_list(&query.key)
        .await
        .ok_or_else(|| not_found_error("No saved chapter list for that key."))?;
    Ok(ok_data(chapters))
}

#[derive(Deserialize)]
struct SaveChapterListRequest {
    key: String,
    chapters: Vec<Chapter>,
}

async fn save_chapter_list(
    State(state): State<AppState>,
    Json(request): Json<SaveChapterListRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let chapters = state
        .store
        .save_chapter_list(&request.key, request.chapters)
        .await
        .map_err(store_error)?;
    Ok(ok_data(chapters))
}

#[derive(Deserialize)]
struct DeleteChapterRequest {
    key: String,
    chapter_id: String,
}

async fn delete_chapter(
    State(state): State<AppState>,
    Json(request): Json<DeleteChapterRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let entry = state
        .store
        .delete_chapter(&request.key, &request.chapter_id)
        .await
        .map_err(store_error)?;
    record_activity(&state, format!("Moved chapter {} to recycle bin", entry.name)).await;
    Ok(ok_data(entry))
}

// --- content overrides ---

#[derive(Serialize)]
struct OverrideRow {
    key: String,
    record: ContentOverrideRecord,
}

async fn list_overrides(State(state): State<AppState>) -> impl IntoResponse {
    let rows: Vec<OverrideRow> = state
        .store
        .list_overrides()
        .await
        .into_iter()
        .map(|(key, record)| OverrideRow { key, record })
        .collect();
    ok_data(rows)
}

async fn get_override(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let record = state
        .store
        .get_override(&key)
        .await
        .ok_or_else(|| not_found_error("No override stored for that key."))?;
    Ok(ok_data(record))
}

async fn put_override(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(record): Json<ContentOverrideRecord>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let saved = state
        .store
        .put_override(&key, record)
        .await
        .map_err(store_error)?;
    Ok(ok_data(saved))
}

async fn delete_override(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state.store.delete_override(&key).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- recycle bin ---

async fn list_recycle_bin(State(state): State<AppState>) -> impl IntoResponse {
    ok_data(state.store.list_recycle_bin().await)
}

async fn restore_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let entry = state.store.restore_entry(&id).await.map_err(store_error)?;
    record_activity(&state, format!("Restored {} from recycle bin", entry.name)).await;
    Ok(ok_data(entry))
}

async fn purge_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state.store.purge_entry(&id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- demands and recovery ---

async fn list_demands(State(state): State<AppState>) -> impl IntoResponse {
    ok_data(state.store.list_demands().await)
}

async fn delete_demand(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state.store.delete_demand(&id).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_recovery_requests(State(state): State<AppState>) -> impl IntoResponse {
    ok_data(state.store.list_recovery_requests().await)
}

async fn resolve_recovery_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let record = state
        .store
        .resolve_recovery_request(&id)
        .await
        .map_err(store_error)?;
    Ok(ok_data(record))
}

// --- activity log ---

#[derive(Deserialize)]
struct ActivityQuery {
    #[serde(default = "default_activity_limit")]
    limit: usize,
}

fn default_activity_limit() -> usize {
    100
}

async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> impl IntoResponse {
    ok_data(state.store.list_activity(query.limit).await)
}

#[derive(Deserialize)]
struct LogActivityRequest {
    message: String,
}

async fn log_activity(
    State(state): State<AppState>,
    Json(request): Json<LogActivityRequest>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let entry = state
        .store
        .log_activity(&request.message)
        .await
        .map_err(store_error)?;
    Ok(ok_data(entry))
}

// --- raw collection access ---

async fn export_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    let value = state
        .store
        .export_collection(&collection)
        .await
        .map_err(store_error)?;
    Ok(ok_data(value))
}

async fn import_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiErrorTuple> {
    state
        .store
        .import_collection(&collection, payload)
        .await
        .map_err(store_error)?;
    record_activity(&state, format!("Replaced collection {collection} via editor")).await;
    Ok(ok_data(serde_json::json!({ "replaced": collection })))
}
