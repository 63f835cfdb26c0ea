//! HTTP request handlers for the buddy API.
//!
//! Routes mirror the platform's buddy endpoints. Every store access runs on
//! a blocking thread under the request deadline.

use crate::service::{self, ServiceError};
use crate::session::{RequestUser, SessionManager};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router as AxumRouter,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tandem_domain::{Booking, BuddyListing, CandidateSet, EdgeId, UserId};
use tandem_store::SqliteStore;
use tracing::{debug, error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The store, locked only inside blocking tasks
    pub store: Arc<Mutex<SqliteStore>>,
    /// Session manager for JWT token operations
    pub session_manager: Arc<SessionManager>,
    /// Deadline for the store work of one request
    pub request_timeout: Duration,
}

/// Cancels a store call when the request gives up on it
///
/// The flag belongs to one call only, so setting it late never reaches the
/// statements of the next request on the connection.
struct CancelOnDrop {
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

impl AppState {
    /// Build state around an opened store
    pub fn new(store: SqliteStore, session_manager: SessionManager, request_timeout: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            session_manager: Arc::new(session_manager),
            request_timeout,
        }
    }

    /// Run `op` against the store on a blocking thread
    ///
    /// The store lock is taken inside the blocking task. If the deadline
    /// passes or the calling future is dropped, `op` is skipped when it has
    /// not started yet. Otherwise its statement in progress is aborted and
    /// every further store call it makes fails.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStore) -> Result<T, ServiceError> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut guard = CancelOnDrop {
            cancelled: Arc::clone(&cancelled),
            armed: true,
        };

        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || {
            let mut store = store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if cancelled.load(Ordering::SeqCst) {
                return None;
            }
            store.set_cancel_flag(Some(cancelled));
            let result = op(&mut store);
            store.set_cancel_flag(None);
            Some(result)
        });

        match tokio::time::timeout(self.request_timeout, task).await {
            Err(_) => {
                warn!("Store call exceeded deadline of {:?}", self.request_timeout);
                Err(AppError::Timeout)
            }
            Ok(joined) => {
                guard.armed = false;
                match joined {
                    Ok(Some(result)) => result.map_err(AppError::from),
                    Ok(None) => Err(AppError::Timeout),
                    Err(e) => Err(AppError::Internal(format!("Store task failed: {}", e))),
                }
            }
        }
    }
}

/// Body of `POST /buddies`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBuddyRequest {
    /// User to add as a buddy
    pub buddy_id: String,
}

/// Response of `POST /buddies`
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    /// Identifier of the new buddy entry
    pub id: String,
}

/// Body of `PUT /buddies`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MutualBuddiesRequest {
    /// Candidates by user ID
    #[serde(default)]
    pub buddy_ids: Option<Vec<String>>,
    /// Candidates by email
    #[serde(default)]
    pub buddy_emails: Option<Vec<String>>,
}

/// Next booking of a buddy
#[derive(Debug, Serialize, Deserialize)]
pub struct BuddyBooking {
    /// Start of the booking
    pub enter: DateTime<Utc>,
    /// End of the booking
    pub leave: DateTime<Utc>,
    /// Booked space
    pub desk: String,
    /// Location of the space
    pub room: String,
}

/// One entry of `GET /buddies`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuddyResponse {
    /// Buddy entry identifier
    pub id: String,
    /// Followed user
    pub buddy_id: String,
    /// Followed user's email
    pub buddy_email: String,
    /// Followed user's next booking, if any
    pub buddy_first_booking: Option<BuddyBooking>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

fn to_datetime(secs: u64) -> Result<DateTime<Utc>, String> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| format!("Booking time {} out of range", secs))
}

impl TryFrom<Booking> for BuddyBooking {
    type Error = String;

    fn try_from(booking: Booking) -> Result<Self, Self::Error> {
        Ok(Self {
            enter: to_datetime(booking.enter)?,
            leave: to_datetime(booking.leave)?,
            desk: booking.space_name,
            room: booking.location_name,
        })
    }
}

impl TryFrom<BuddyListing> for BuddyResponse {
    type Error = String;

    fn try_from(listing: BuddyListing) -> Result<Self, Self::Error> {
        Ok(Self {
            id: listing.edge_id.to_string(),
            buddy_id: listing.buddy_id.to_string(),
            buddy_email: listing.buddy_email,
            buddy_first_booking: listing
                .first_upcoming_booking
                .map(BuddyBooking::try_from)
                .transpose()?,
        })
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed request
    BadRequest(String),
    /// No valid requester identity
    Unauthorized,
    /// Referenced resource does not exist
    NotFound(String),
    /// Error from a buddy operation
    Service(ServiceError),
    /// Request deadline exceeded
    Timeout,
    /// Internal server error
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Service(e) => match e {
                ServiceError::BadCandidate(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, e.to_string()),
                ServiceError::Storage(e) => {
                    error!("Storage failure: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string()),
            AppError::Internal(msg) => {
                error!("{}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        AppError::Service(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        state.session_manager.authenticate(token.trim()).map_err(|e| {
            debug!("Rejected session token: {}", e);
            AppError::Unauthorized
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// GET /buddies - List the requester's buddies
async fn list_buddies(
    State(state): State<AppState>,
    user: RequestUser,
) -> Result<Json<Vec<BuddyResponse>>, AppError> {
    let now = unix_now();
    let listing = state
        .with_store(move |store| service::list_buddies(store, user.user_id, now))
        .await?;

    let listing = listing
        .into_iter()
        .map(BuddyResponse::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::Internal)?;

    Ok(Json(listing))
}

/// POST /buddies - Add a buddy
async fn create_buddy(
    State(state): State<AppState>,
    user: RequestUser,
    body: Result<Json<CreateBuddyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    let buddy = UserId::from_string(&request.buddy_id).map_err(AppError::BadRequest)?;

    let id = state
        .with_store(move |store| service::create_buddy(store, user.user_id, buddy))
        .await?;

    Ok((
        StatusCode::CREATED,
        [("x-object-id", id.to_string())],
        Json(CreatedResponse { id: id.to_string() }),
    ))
}

/// PUT /buddies - Which of the given candidates are mutual buddies
///
/// Candidates are given either as `buddy_ids` or as `buddy_emails`; the
/// response lists the mutual ones in the same form.
async fn query_mutual_buddies(
    State(state): State<AppState>,
    user: RequestUser,
    body: Result<Json<MutualBuddiesRequest>, JsonRejection>,
) -> Result<Json<Vec<String>>, AppError> {
    let Json(request) = body?;
    let ids = request.buddy_ids.unwrap_or_default();
    let emails = request.buddy_emails.unwrap_or_default();

    let candidates = CandidateSet::from_request(&ids, &emails).map_err(|e| {
        debug!("Rejected mutual buddy query: {}", e);
        AppError::BadRequest(e.to_string())
    })?;

    let mutual = state
        .with_store(move |store| service::query_mutual_buddies(store, &user, &candidates))
        .await?;

    Ok(Json(mutual))
}

/// DELETE /buddies/:id - Remove one of the requester's buddies
async fn delete_buddy(
    State(state): State<AppState>,
    user: RequestUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let edge = EdgeId::from_string(&id)
        .map_err(|_| AppError::NotFound(format!("Buddy entry not found: {}", id)))?;

    state
        .with_store(move |store| service::delete_buddy(store, edge, user.user_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /health - Store liveness
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthCheckResponse>) {
    match state
        .with_store(|store| store.ping().map_err(ServiceError::from))
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthCheckResponse {
                status: "healthy".to_string(),
            }),
        ),
        Err(e) => {
            warn!("Health check failed: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthCheckResponse {
                    status: "unhealthy".to_string(),
                }),
            )
        }
    }
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route(
            "/buddies",
            get(list_buddies)
                .post(create_buddy)
                .put(query_mutual_buddies),
        )
        .route("/buddies/:id", delete(delete_buddy))
        .route("/health", get(health_check))
        .with_state(state)
}
