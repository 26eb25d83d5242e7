// Agenda core
//
// This crate holds everything that is not HTTP: the event model, the
// datetime parser, the file-backed event store and the reminder scanner.
//
// Key design decisions:
// - All times are UTC `DateTime`s; text is parsed once at the boundary
// - The store owns its state behind a single mutex and persists on every
//   successful mutation
// - Load failures are returned as typed errors so the binary decides how
//   loudly to fail
// - The reminder scanner is a cancellable tokio task with a pluggable notifier

pub mod datetime;
pub mod error;
pub mod event;
pub mod persistence;
pub mod reminders;
pub mod store;

// Telemetry (structured logging setup)
pub mod telemetry;

// Re-exports for convenience
pub use datetime::{format_datetime, parse_datetime};
pub use error::{Result, StoreError};
pub use event::{Event, EventId, EventPatch, NewEvent, Reminder, SortKey};
pub use reminders::{LogNotifier, ReminderHandle, ReminderNotifier, ReminderScanner};
pub use store::EventStore;
