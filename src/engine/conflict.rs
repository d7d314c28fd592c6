use crate::limits::{LATEST_START_HOUR, OPENING_HOUR};
use crate::model::{Availability, Booking, Slot};

// ── Slot conflict rules ──────────────────────────────────────────
//
// A candidate slot passes when, in order:
//   1. its start hour falls inside the operating window [10, 20],
//   2. it does not run past the window end (last valid start is
//      20 − duration, so a 3h session can start no later than 17:00),
//   3. it overlaps no active booking on the same date.
//
// Overlap is half-open on minute offsets: [s1, e1) and [s2, e2) collide
// iff s1 < e2 && e1 > s2, so touching endpoints never conflict.

/// Why a slot violates the operating window, if it does. Window breaches are
/// validation failures, not conflicts with another booking.
pub fn window_violation(candidate: &Slot) -> Option<String> {
    let start_hour = candidate.start.hour();
    if start_hour < OPENING_HOUR || start_hour > LATEST_START_HOUR {
        return Some(format!(
            "bookings are only available between {OPENING_HOUR}:00 and {LATEST_START_HOUR}:00"
        ));
    }
    if start_hour > LATEST_START_HOUR - candidate.duration_hours {
        let last_start = LATEST_START_HOUR - candidate.duration_hours;
        return Some(format!(
            "this slot runs past {LATEST_START_HOUR}:00; the last start time for a {}h session is {last_start}:00",
            candidate.duration_hours
        ));
    }
    None
}

/// The first active booking's slot overlapping `candidate`, if any. Only
/// `pending`/`confirmed` bookings with a start time participate.
pub fn find_overlap(candidate: &Slot, existing: &[Booking]) -> Option<Slot> {
    existing
        .iter()
        .filter(|b| b.status.is_active())
        .filter_map(|b| b.slot())
        .find(|taken| candidate.overlaps(taken))
}

pub(crate) fn overlap_reason(taken: &Slot) -> String {
    format!(
        "this slot overlaps an existing booking from {} to {}",
        taken.start,
        taken.end()
    )
}

/// Pure check of `candidate` against the bookings already on that date.
/// Idempotent: same inputs, same answer, no mutation.
pub fn slot_availability(candidate: &Slot, existing: &[Booking]) -> Availability {
    if let Some(reason) = window_violation(candidate) {
        return Availability::unavailable(reason);
    }
    if let Some(taken) = find_overlap(candidate, existing) {
        return Availability::unavailable(overlap_reason(&taken));
    }
    Availability::open()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingDate, BookingStatus, TimeOfDay};
    use chrono::Utc;

    fn slot(start: &str, hours: u32) -> Slot {
        Slot::new(start.parse::<TimeOfDay>().unwrap(), hours)
    }

    fn booking(start: &str, hours: u32, status: BookingStatus) -> Booking {
        Booking {
            id: format!("booking-{start}"),
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            email: "jane@example.com".into(),
            service_type: "Portrait".into(),
            date: BookingDate::parse("2026-01-17").unwrap(),
            start_time: Some(start.parse().unwrap()),
            duration_hours: Some(hours),
            location: "Studio".into(),
            special_requests: None,
            reference_photos: Vec::new(),
            status,
            created_at: Utc::now(),
            gallery_access_code: None,
            gallery_created: false,
            gallery_expires_at: None,
            gallery_photos: Vec::new(),
            notification_sent: false,
        }
    }

    #[test]
    fn start_before_opening_is_refused() {
        let result = slot_availability(&slot("09:00", 3), &[]);
        assert!(!result.available);
        assert!(result.reason.unwrap().contains("between 10:00 and 20:00"));
    }

    #[test]
    fn start_after_latest_hour_is_refused() {
        let result = slot_availability(&slot("21:00", 1), &[]);
        assert!(!result.available);
    }

    #[test]
    fn slot_running_past_close_names_last_start() {
        // 18:00 + 3h would end at 21:00; the last 3h start is 17:00.
        let result = slot_availability(&slot("18:00", 3), &[]);
        assert!(!result.available);
        assert!(result.reason.unwrap().contains("17:00"));
    }

    #[test]
    fn last_valid_start_is_accepted() {
        assert!(slot_availability(&slot("17:00", 3), &[]).available);
    }

    #[test]
    fn overlapping_active_booking_is_refused() {
        // Existing 10:00-13:00; candidate 12:00-15:00 overlaps by an hour.
        let existing = vec![booking("10:00", 3, BookingStatus::Pending)];
        let result = slot_availability(&slot("12:00", 3), &existing);
        assert!(!result.available);
        assert!(result.reason.unwrap().contains("from 10:00 to 13:00"));
    }

    #[test]
    fn touching_slot_is_accepted() {
        // 13:00 starts exactly when 10:00-13:00 ends.
        let existing = vec![booking("10:00", 3, BookingStatus::Confirmed)];
        assert!(slot_availability(&slot("13:00", 3), &existing).available);
    }

    #[test]
    fn completed_booking_never_blocks() {
        let existing = vec![booking("10:00", 3, BookingStatus::Completed)];
        assert!(slot_availability(&slot("10:00", 3), &existing).available);
    }

    #[test]
    fn cancelled_booking_never_blocks() {
        let existing = vec![booking("10:00", 3, BookingStatus::Cancelled)];
        assert!(slot_availability(&slot("10:00", 3), &existing).available);
    }

    #[test]
    fn booking_without_start_time_never_blocks() {
        let mut open_date = booking("10:00", 3, BookingStatus::Pending);
        open_date.start_time = None;
        assert!(slot_availability(&slot("10:00", 3), &[open_date]).available);
    }

    #[test]
    fn overlap_lookup_is_symmetric() {
        let a = booking("10:00", 3, BookingStatus::Pending);
        let b = booking("12:00", 3, BookingStatus::Pending);
        let slot_a = a.slot().unwrap();
        let slot_b = b.slot().unwrap();
        assert_eq!(
            find_overlap(&slot_a, std::slice::from_ref(&b)).is_some(),
            find_overlap(&slot_b, std::slice::from_ref(&a)).is_some(),
        );
    }

    #[test]
    fn check_is_idempotent() {
        let existing = vec![booking("14:00", 3, BookingStatus::Pending)];
        let first = slot_availability(&slot("15:00", 2), &existing);
        let second = slot_availability(&slot("15:00", 2), &existing);
        assert_eq!(first, second);
    }
}
