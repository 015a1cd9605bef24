//! Wire-format and domain-constant crate: the event-type enumeration, the
//! threshold configuration tables, opaque room/viewer identifiers, and the
//! JSON message shapes crossing the presenter WebSocket and the
//! viewer-facing REST surface. No I/O lives here — `engine` and `server`
//! both depend on this crate so they never disagree about schema.

pub mod event_type;
pub mod ids;
pub mod messages;
pub mod threshold;

pub use event_type::{EventType, UnknownEventType};
pub use ids::{RoomId, ViewerId};
pub use messages::{
    EventRequest, EventResult, GameOverResponse, GameSummary, PresenterInbound, PresenterOutbound, PushEvent,
    SetViewerNameRequest, StatsEntry, ViewerCount, ViewerSummary,
};
pub use threshold::{EventConfig, config_for, multiplier_for, threshold_for};

/// Fixed 5-minute sliding window for the active-viewer count.
pub const ACTIVE_VIEWER_WINDOW_SECS: i64 = 300;

/// Sum of `push_count` across a single `push_events` submission must not
/// exceed this value.
pub const MAX_PUSH_COUNT_PER_REQUEST: u32 = 20;

/// Display-name length clamp, in Unicode scalar values (not bytes).
pub const VIEWER_NAME_MAX_CHARS: usize = 24;

/// Length of a monotonic-lexicographic opaque id (timestamp-prefixed random).
pub const OPAQUE_ID_LEN: usize = 26;

/// The event-bus channel name every instance publishes to and subscribes on.
pub const GAME_EVENTS_CHANNEL: &str = "game_events";
