// Event store
// Decision: Every read and write goes through one mutex; there is no other
//           access path to the event map
// Decision: Mutations run against a copy and are swapped in only after the
//           file write succeeds, so a failed save never leaves memory and
//           disk out of step
//
// The store is small (a personal/team calendar), so cloning the whole map
// per mutation and rewriting the whole file are both acceptable.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::datetime::parse_datetime;
use crate::error::{Result, StoreError};
use crate::event::{Event, EventId, EventPatch, NewEvent, Reminder, SortKey};
use crate::persistence::{load_snapshot, save_snapshot_atomic, StoreSnapshot};

const REQUIRED_FIELDS_MESSAGE: &str = "Title, start_time, and end_time are required";
const INVALID_DATETIME_MESSAGE: &str =
    "Invalid datetime format. Use ISO format or 'YYYY-MM-DD HH:MM:SS'";
const START_BEFORE_END_MESSAGE: &str = "Start time must be before end time";

/// How far ahead [`EventStore::upcoming`] looks.
pub fn reminder_window() -> Duration {
    Duration::hours(1)
}

/// File-backed store of events.
pub struct EventStore {
    path: PathBuf,
    state: Mutex<StoreSnapshot>,
}

impl EventStore {
    /// Open the store persisted at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// an error; the caller decides whether to abort or start empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = load_snapshot(&path)?.unwrap_or_default();

        tracing::info!(
            path = %path.display(),
            events = snapshot.events.len(),
            next_id = snapshot.next_id,
            "Event store loaded"
        );

        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    /// An empty store that will persist to `path` on the first mutation.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(StoreSnapshot::default()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id the next created event will receive.
    pub fn next_id(&self) -> EventId {
        self.state.lock().next_id
    }

    /// Create an event from raw input.
    pub fn create(&self, input: NewEvent) -> Result<Event> {
        let title = non_empty(input.title);
        let start_text = non_empty(input.start_time);
        let end_text = non_empty(input.end_time);

        let (Some(title), Some(start_text), Some(end_text)) = (title, start_text, end_text) else {
            return Err(StoreError::validation(REQUIRED_FIELDS_MESSAGE));
        };

        let (Some(start_time), Some(end_time)) =
            (parse_datetime(&start_text), parse_datetime(&end_text))
        else {
            return Err(StoreError::validation(INVALID_DATETIME_MESSAGE));
        };

        if start_time >= end_time {
            return Err(StoreError::validation(START_BEFORE_END_MESSAGE));
        }

        let event = self.commit(|state| {
            let id = state.next_id;
            let next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
            let event = Event {
                id,
                title,
                description: input.description.unwrap_or_default(),
                start_time,
                end_time,
                recurring: input.recurring,
                created_at: Utc::now(),
                updated_at: None,
            };
            state.events.insert(id, event.clone());
            state.next_id = next_id;
            Ok(event)
        })?;

        tracing::info!(event_id = event.id, title = %event.title, "Event created");
        Ok(event)
    }

    /// All events in the requested order.
    pub fn list(&self, sort_by: SortKey) -> Vec<Event> {
        // BTreeMap iteration is ascending id, i.e. insertion order
        let mut events: Vec<Event> = self.state.lock().events.values().cloned().collect();

        match sort_by {
            SortKey::StartTime => events.sort_by_key(|e| e.start_time),
            SortKey::EndTime => events.sort_by_key(|e| e.end_time),
            SortKey::CreatedAt => events.sort_by_key(|e| e.created_at),
            SortKey::Title => events.sort_by_cached_key(|e| e.title.to_lowercase()),
            SortKey::Insertion => {}
        }

        events
    }

    pub fn get(&self, id: EventId) -> Result<Event> {
        self.state
            .lock()
            .events
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Apply the fields present in `patch` to event `id`.
    ///
    /// The merged record must still satisfy `start_time < end_time`. On any
    /// error the stored event is left untouched.
    pub fn update(&self, id: EventId, patch: EventPatch) -> Result<Event> {
        let event = self.commit(|state| {
            let mut event = state
                .events
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))?;

            // An empty title is ignored rather than rejected
            if let Some(title) = non_empty(patch.title) {
                event.title = title;
            }
            if let Some(description) = patch.description {
                event.description = description;
            }
            if let Some(text) = patch.start_time {
                event.start_time = parse_datetime(&text)
                    .ok_or_else(|| StoreError::validation("Invalid start_time format"))?;
            }
            if let Some(text) = patch.end_time {
                event.end_time = parse_datetime(&text)
                    .ok_or_else(|| StoreError::validation("Invalid end_time format"))?;
            }
            if let Some(recurring) = patch.recurring {
                event.recurring = recurring;
            }

            if event.start_time >= event.end_time {
                return Err(StoreError::validation(START_BEFORE_END_MESSAGE));
            }

            event.updated_at = Some(Utc::now());
            state.events.insert(id, event.clone());
            Ok(event)
        })?;

        tracing::info!(event_id = id, "Event updated");
        Ok(event)
    }

    pub fn delete(&self, id: EventId) -> Result<()> {
        self.commit(|state| {
            state
                .events
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound(id))
        })?;

        tracing::info!(event_id = id, "Event deleted");
        Ok(())
    }

    /// Events whose title or description contains `query`, ignoring case,
    /// ordered by start time.
    pub fn search(&self, query: &str) -> Vec<Event> {
        let needle = query.to_lowercase();
        let mut results: Vec<Event> = self
            .state
            .lock()
            .events
            .values()
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        results.sort_by_key(|e| e.start_time);
        results
    }

    /// Events starting between `now` and `now + 1h`, both ends inclusive,
    /// ordered by start time.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let window = reminder_window();
        let mut reminders: Vec<Reminder> = self
            .state
            .lock()
            .events
            .values()
            .filter_map(|event| {
                let until = event.start_time - now;
                if until < Duration::zero() || until > window {
                    return None;
                }
                Some(Reminder {
                    event: event.clone(),
                    minutes_until: until.num_seconds() / 60,
                })
            })
            .collect();

        reminders.sort_by_key(|r| r.event.start_time);
        reminders
    }

    /// Run `mutate` on a copy of the state, persist the copy, then swap it in.
    fn commit<T>(&self, mutate: impl FnOnce(&mut StoreSnapshot) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let output = mutate(&mut next)?;

        if let Err(e) = save_snapshot_atomic(&self.path, &next) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist events");
            return Err(e);
        }

        *state = next;
        Ok(output)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
