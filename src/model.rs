use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::limits::DEFAULT_DURATION_HOURS;
use crate::store::HasId;

/// Date value a booking may carry when no calendar date has been agreed yet.
pub const BY_APPOINTMENT: &str = "to be scheduled by appointment";

/// Wall-clock time of day in minutes from midnight. Serialized as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTime(pub String);

impl fmt::Display for InvalidTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time {:?}, expected HH:MM", self.0)
    }
}

impl std::error::Error for InvalidTime {}

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn hour(&self) -> u32 {
        self.0 / 60
    }

    pub fn minute(&self) -> u32 {
        self.0 % 60
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidTime;

    /// Accepts `HH:MM` and bare `HH` (minutes default to zero).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, ':');
        let hour: u32 = parts
            .next()
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| InvalidTime(s.to_string()))?;
        let minute: u32 = match parts.next() {
            Some(m) => m.parse().map_err(|_| InvalidTime(s.to_string()))?,
            None => 0,
        };
        if hour >= 24 || minute >= 60 {
            return Err(InvalidTime(s.to_string()));
        }
        Ok(Self(hour * 60 + minute))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A session slot on one date: start time plus duration in whole hours.
/// Half-open in minutes, so a slot ending exactly when another starts does
/// not overlap it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: TimeOfDay,
    pub duration_hours: u32,
}

impl Slot {
    pub fn new(start: TimeOfDay, duration_hours: u32) -> Self {
        Self { start, duration_hours }
    }

    pub fn start_minutes(&self) -> u32 {
        self.start.minutes()
    }

    pub fn end_minutes(&self) -> u32 {
        self.start.minutes() + self.duration_hours * 60
    }

    pub fn end(&self) -> TimeOfDay {
        TimeOfDay::from_minutes(self.end_minutes())
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start_minutes() < other.end_minutes() && other.start_minutes() < self.end_minutes()
    }
}

/// Either a concrete calendar date or the by-appointment sentinel.
/// Serialized as a plain string either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingDate {
    Scheduled(NaiveDate),
    ByAppointment,
}

impl BookingDate {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s == BY_APPOINTMENT {
            return Some(Self::ByAppointment);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self::Scheduled)
    }

    pub fn scheduled(&self) -> Option<NaiveDate> {
        match self {
            Self::Scheduled(d) => Some(*d),
            Self::ByAppointment => None,
        }
    }
}

impl fmt::Display for BookingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::ByAppointment => f.write_str(BY_APPOINTMENT),
        }
    }
}

impl Serialize for BookingDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BookingDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BookingDate::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid booking date {s:?}"))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Active bookings hold their slot; completed/cancelled ones free it.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One reservation record, as stored and as served to the admin UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub service_type: String,
    pub date: BookingDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_photos: Vec<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_access_code: Option<String>,
    #[serde(default)]
    pub gallery_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gallery_photos: Vec<String>,
    #[serde(default)]
    pub notification_sent: bool,
}

impl Booking {
    pub fn duration_hours(&self) -> u32 {
        self.duration_hours.unwrap_or(DEFAULT_DURATION_HOURS)
    }

    /// The slot this booking occupies, when it has a start time.
    pub fn slot(&self) -> Option<Slot> {
        self.start_time.map(|start| Slot::new(start, self.duration_hours()))
    }
}

impl HasId for Booking {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Public submission payload for a new booking.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub service_type: String,
    pub date: String,
    pub start_time: Option<String>,
    pub duration_hours: Option<u32>,
    pub location: String,
    pub special_requests: Option<String>,
    #[serde(default)]
    pub reference_photos: Vec<String>,
}

/// Admin patch: every field optional, absent fields stay untouched.
/// `id` and `createdAt` are deliberately not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub duration_hours: Option<u32>,
    pub service_type: Option<String>,
    pub location: Option<String>,
    pub special_requests: Option<String>,
    pub gallery_photos: Option<Vec<String>>,
}

/// Result of a date or slot check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    pub fn open() -> Self {
        Self { available: true, reason: None }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { available: false, reason: Some(reason.into()) }
    }
}

/// An occupied window on a date, as shown to the public time picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedSlot {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub duration_hours: u32,
}

/// Explicit exceptions to the weekends-only default. Block wins over unlock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    #[serde(default)]
    pub blocked: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub unlocked: BTreeSet<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideAction {
    /// Mark unavailable; also drops the date from the unlocked list.
    Block,
    /// Remove an explicit block.
    Unblock,
    /// Mark a weekday available; also drops the date from the blocked list.
    Unlock,
    /// Remove an explicit unlock.
    Lock,
}

impl Overrides {
    pub fn apply(&mut self, action: OverrideAction, date: NaiveDate) {
        match action {
            OverrideAction::Block => {
                self.blocked.insert(date);
                self.unlocked.remove(&date);
            }
            OverrideAction::Unblock => {
                self.blocked.remove(&date);
            }
            OverrideAction::Unlock => {
                self.unlocked.insert(date);
                self.blocked.remove(&date);
            }
            OverrideAction::Lock => {
                self.unlocked.remove(&date);
            }
        }
    }
}

/// A client review shown on the public site once approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub quote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl HasId for Testimonial {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestimonial {
    pub name: String,
    pub role: Option<String>,
    pub quote: String,
    pub project: Option<String>,
    pub rating: Option<u8>,
    pub date: Option<String>,
    pub image: Option<String>,
    pub email: Option<String>,
}

/// What a valid gallery code unlocks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryView {
    pub booking: Booking,
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a gallery email dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryDispatch {
    pub access_code: String,
    pub recipient: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_parses_and_formats() {
        let t: TimeOfDay = "10:30".parse().unwrap();
        assert_eq!(t.hour(), 10);
        assert_eq!(t.minute(), 30);
        assert_eq!(t.to_string(), "10:30");
        assert_eq!("9".parse::<TimeOfDay>().unwrap().to_string(), "09:00");
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        assert!("25:00".parse::<TimeOfDay>().is_err());
        assert!("10:61".parse::<TimeOfDay>().is_err());
        assert!("half past".parse::<TimeOfDay>().is_err());
        assert!("".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn slot_overlap_is_symmetric() {
        let a = Slot::new("10:00".parse().unwrap(), 3);
        let b = Slot::new("12:00".parse().unwrap(), 3);
        let c = Slot::new("13:00".parse().unwrap(), 3);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn slot_touching_endpoints_do_not_overlap() {
        // 10:00-13:00 and 13:00-16:00 share a boundary, not time.
        let first = Slot::new("10:00".parse().unwrap(), 3);
        let second = Slot::new("13:00".parse().unwrap(), 3);
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn slot_end_accounts_for_minutes() {
        let s = Slot::new("10:30".parse().unwrap(), 2);
        assert_eq!(s.end().to_string(), "12:30");
    }

    #[test]
    fn booking_date_roundtrip() {
        let d = BookingDate::parse("2026-01-17").unwrap();
        assert_eq!(d.to_string(), "2026-01-17");
        assert_eq!(
            BookingDate::parse(BY_APPOINTMENT),
            Some(BookingDate::ByAppointment)
        );
        assert!(BookingDate::parse("next saturday").is_none());
        assert!(BookingDate::parse("2026-13-40").is_none());
    }

    #[test]
    fn status_activity() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Completed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
    }

    #[test]
    fn override_block_evicts_unlock() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 19).unwrap();
        let mut o = Overrides::default();
        o.apply(OverrideAction::Unlock, date);
        assert!(o.unlocked.contains(&date));
        o.apply(OverrideAction::Block, date);
        assert!(o.blocked.contains(&date));
        assert!(!o.unlocked.contains(&date));
    }

    #[test]
    fn override_unlock_evicts_block() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 19).unwrap();
        let mut o = Overrides::default();
        o.apply(OverrideAction::Block, date);
        o.apply(OverrideAction::Unlock, date);
        assert!(!o.blocked.contains(&date));
        assert!(o.unlocked.contains(&date));
        o.apply(OverrideAction::Lock, date);
        assert!(o.unlocked.is_empty());
    }

    #[test]
    fn booking_serde_uses_camel_case_and_defaults() {
        let json = r#"{
            "id": "booking-01jx",
            "lastName": "Doe",
            "firstName": "Jane",
            "email": "jane@example.com",
            "serviceType": "Portrait",
            "date": "2026-01-17",
            "startTime": "10:00",
            "location": "Studio",
            "status": "pending",
            "createdAt": "2026-01-09T08:00:31Z"
        }"#;
        let b: Booking = serde_json::from_str(json).unwrap();
        assert_eq!(b.duration_hours(), 3); // default applies when absent
        assert!(!b.gallery_created);
        assert!(b.gallery_photos.is_empty());
        let out = serde_json::to_string(&b).unwrap();
        assert!(out.contains("\"serviceType\":\"Portrait\""));
        assert!(out.contains("\"startTime\":\"10:00\""));
        assert!(!out.contains("durationHours")); // None stays absent
    }
}
