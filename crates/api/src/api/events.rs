// Event CRUD, search and reminder HTTP routes

use agenda_core::{Event, EventId, EventPatch, EventStore, NewEvent, Reminder, SortKey};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use super::common::{
    method_not_allowed, present, ApiError, ErrorResponse, JsonBody, MessageResponse,
    NOT_FOUND_MESSAGE,
};

pub const SEARCH_QUERY_REQUIRED: &str = "Search query parameter \"q\" is required";

/// Request to create a new event
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Event title. Required and non-empty.
    #[schema(example = "Team Sync")]
    pub title: Option<String>,
    /// Free-form description.
    #[schema(example = "Weekly team review")]
    pub description: Option<String>,
    /// ISO 8601 or "YYYY-MM-DD HH:MM:SS". Text without an offset is UTC.
    #[schema(example = "2024-05-01T10:00:00Z")]
    pub start_time: Option<String>,
    /// Must be after `start_time`.
    #[schema(example = "2024-05-01T11:00:00Z")]
    pub end_time: Option<String>,
    /// Opaque recurrence rule, stored as given.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub recurring: Value,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(req: CreateEventRequest) -> Self {
        NewEvent {
            title: req.title,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
            recurring: req.recurring,
        }
    }
}

/// Request to update an event. Only provided fields are changed.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    /// Ignored when empty.
    pub title: Option<String>,
    /// An empty string clears the description.
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// `null` clears the recurrence; omit to keep it.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Object>)]
    pub recurring: Option<Value>,
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(req: UpdateEventRequest) -> Self {
        EventPatch {
            title: req.title,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
            recurring: req.recurring,
        }
    }
}

/// A single event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    pub event: Event,
}

/// An event together with a confirmation message
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventMessageResponse {
    #[schema(example = "Event created successfully")]
    pub message: String,
    pub event: Event,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventListResponse {
    pub events: Vec<Event>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<Event>,
    pub count: usize,
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReminderListResponse {
    pub reminders: Vec<Reminder>,
    pub count: usize,
}

/// Raw query string pairs, in request order. Never rejects, so a repeated
/// or odd parameter cannot turn into a non-JSON error.
type QueryPairs = Vec<(String, String)>;

/// First value of `key`; later repeats are ignored.
fn first_param(pairs: &QueryPairs, key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    /// One of start_time, end_time, created_at, title. Anything else keeps
    /// creation order.
    pub sort_by: Option<String>,
}

impl From<QueryPairs> for ListEventsQuery {
    fn from(pairs: QueryPairs) -> Self {
        Self {
            sort_by: first_param(&pairs, "sort_by"),
        }
    }
}

#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive text matched against title and description.
    pub q: Option<String>,
}

impl From<QueryPairs> for SearchQuery {
    fn from(pairs: QueryPairs) -> Self {
        Self {
            q: first_param(&pairs, "q"),
        }
    }
}

/// App state for event routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,
}

impl AppState {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }
}

/// Create event routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/events",
            get(list_events)
                .post(create_event)
                .fallback(method_not_allowed),
        )
        .route(
            "/events/search",
            get(search_events).fallback(method_not_allowed),
        )
        .route(
            "/events/reminders",
            get(list_reminders).fallback(method_not_allowed),
        )
        .route(
            "/events/:id",
            get(get_event)
                .put(update_event)
                .delete(delete_event)
                .fallback(method_not_allowed),
        )
        .with_state(state)
}

/// Only plain ASCII digits name an event; anything else is an unknown route.
fn parse_event_id(raw: &str) -> Result<EventId, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::NotFound(NOT_FOUND_MESSAGE.to_string()));
    }
    raw.parse()
        .map_err(|_| ApiError::NotFound(NOT_FOUND_MESSAGE.to_string()))
}

/// POST /events - Create a new event
#[utoipa::path(
    post,
    path = "/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventMessageResponse),
        (status = 400, description = "Missing body or invalid fields", body = ErrorResponse),
        (status = 500, description = "Store could not be saved", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventMessageResponse>), ApiError> {
    let event = state.store.create(req.into())?;

    Ok((
        StatusCode::CREATED,
        Json(EventMessageResponse {
            message: "Event created successfully".to_string(),
            event,
        }),
    ))
}

/// GET /events - List all events
#[utoipa::path(
    get,
    path = "/events",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "All stored events", body = EventListResponse)
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Json<EventListResponse> {
    let query = ListEventsQuery::from(pairs);
    let sort_by = query
        .sort_by
        .as_deref()
        .map(SortKey::from)
        .unwrap_or_default();
    let events = state.store.list(sort_by);
    tracing::debug!(sort_by = %sort_by, count = events.len(), "Listed events");

    Json(EventListResponse {
        count: events.len(),
        events,
    })
}

/// GET /events/{id} - Get an event
#[utoipa::path(
    get,
    path = "/events/{id}",
    params(("id" = u64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event found", body = EventResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ApiError> {
    let id = parse_event_id(&id)?;
    let event = state.store.get(id)?;
    Ok(Json(EventResponse { event }))
}

/// PUT /events/{id} - Update an event
#[utoipa::path(
    put,
    path = "/events/{id}",
    params(("id" = u64, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventMessageResponse),
        (status = 400, description = "Missing body or invalid fields", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Store could not be saved", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateEventRequest>,
) -> Result<Json<EventMessageResponse>, ApiError> {
    let id = parse_event_id(&id)?;
    let event = state.store.update(id, req.into())?;

    Ok(Json(EventMessageResponse {
        message: "Event updated successfully".to_string(),
        event,
    }))
}

/// DELETE /events/{id} - Delete an event
#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(("id" = u64, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event deleted", body = MessageResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Store could not be saved", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_event_id(&id)?;
    state.store.delete(id)?;

    Ok(Json(MessageResponse::new("Event deleted successfully")))
}

/// GET /events/search - Search events by title or description
#[utoipa::path(
    get,
    path = "/events/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching events", body = SearchResponse),
        (status = 400, description = "Missing query", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn search_events(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = SearchQuery::from(pairs);
    let q = query
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest(SEARCH_QUERY_REQUIRED.to_string()))?;
    let results = state.store.search(&q);

    Ok(Json(SearchResponse {
        count: results.len(),
        results,
        query: q,
    }))
}

/// GET /events/reminders - Events starting within the next hour
#[utoipa::path(
    get,
    path = "/events/reminders",
    responses(
        (status = 200, description = "Upcoming events", body = ReminderListResponse)
    ),
    tag = "events"
)]
pub async fn list_reminders(State(state): State<AppState>) -> Json<ReminderListResponse> {
    let reminders = state.store.upcoming(Utc::now());

    Json(ReminderListResponse {
        count: reminders.len(),
        reminders,
    })
}
