// OpenAPI specification generation
//
// Served by the API binary at /api-doc/openapi.json alongside Swagger UI.

use crate::api;
use crate::api::events::{
    CreateEventRequest, EventListResponse, EventMessageResponse, EventResponse,
    ReminderListResponse, SearchResponse, UpdateEventRequest,
};
use crate::api::health::HealthResponse;
use crate::api::{ErrorResponse, MessageResponse};
use agenda_core::{Event, Reminder};
use utoipa::OpenApi;

/// OpenAPI documentation for the Agenda API
#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::events::create_event,
        api::events::list_events,
        api::events::get_event,
        api::events::update_event,
        api::events::delete_event,
        api::events::search_events,
        api::events::list_reminders,
    ),
    components(
        schemas(
            Event, Reminder,
            CreateEventRequest, UpdateEventRequest,
            EventResponse, EventMessageResponse, EventListResponse,
            SearchResponse, ReminderListResponse,
            MessageResponse, ErrorResponse, HealthResponse,
        )
    ),
    tags(
        (name = "events", description = "Event scheduling"),
        (name = "health", description = "Service liveness")
    ),
    info(
        title = "Agenda API",
        version = "0.1.0",
        description = "Create, search and get reminders for scheduled events"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_event_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in ["/health", "/events", "/events/{id}", "/events/search", "/events/reminders"] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected} in {paths:?}"
            );
        }
    }
}
