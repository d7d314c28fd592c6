//! Operating window and input bounds enforced by the engine.

/// Earliest hour a session may start.
pub const OPENING_HOUR: u32 = 10;

/// Latest hour the studio is open; a session must end by this hour, so the
/// last valid start for an n-hour session is `LATEST_START_HOUR - n`.
pub const LATEST_START_HOUR: u32 = 20;

/// Session length assumed when a booking does not specify one.
pub const DEFAULT_DURATION_HOURS: u32 = 3;

pub const MIN_DURATION_HOURS: u32 = 1;

/// Bounded by the operating window: a longer session could not fit even when
/// starting at opening time.
pub const MAX_DURATION_HOURS: u32 = LATEST_START_HOUR - OPENING_HOUR;

/// How long a client gallery stays reachable after its first dispatch.
pub const GALLERY_TTL_MONTHS: u32 = 2;

/// Length of a gallery access code (Crockford base32, uppercase).
pub const GALLERY_CODE_LEN: usize = 8;

/// Single-line inputs: names, emails, service types, locations, URLs.
pub const MAX_FIELD_LEN: usize = 200;

/// Free-text inputs: special requests, testimonial quotes.
pub const MAX_TEXT_LEN: usize = 2000;

/// Path/date lists accepted in one request.
pub const MAX_LIST_LEN: usize = 200;
