use chrono::Utc;

use crate::limits::DEFAULT_DURATION_HOURS;
use crate::model::*;

use super::availability::date_availability;
use super::conflict::slot_availability;
use super::mutations::{parse_booking_date, parse_start_time, validate_duration};
use super::{Engine, EngineError};

impl Engine {
    /// Is this calendar date bookable? The by-appointment sentinel is always
    /// accepted.
    pub async fn check_date(&self, raw_date: &str) -> Result<Availability, EngineError> {
        let date = parse_booking_date(raw_date)?;
        match date.scheduled() {
            None => Ok(Availability::open()),
            Some(day) => {
                let overrides = self.overrides.read().await;
                Ok(date_availability(day, &overrides))
            }
        }
    }

    /// Can a session start at `raw_start` for `duration_hours` on this date?
    /// Reads the active bookings for the date; performs no mutation.
    pub async fn check_slot(
        &self,
        raw_date: &str,
        raw_start: &str,
        duration_hours: Option<u32>,
    ) -> Result<Availability, EngineError> {
        let date = parse_booking_date(raw_date)?;
        let Some(day) = date.scheduled() else {
            return Ok(Availability::open());
        };
        let hours = validate_duration(duration_hours.unwrap_or(DEFAULT_DURATION_HOURS))?;
        let start = parse_start_time(raw_start)?;
        let slot = Slot::new(start, hours);

        let same_day: Vec<Booking> = self
            .bookings
            .list_all()
            .await
            .into_iter()
            .filter(|b| b.date.scheduled() == Some(day))
            .collect();
        Ok(slot_availability(&slot, &same_day))
    }

    /// The occupied windows on a date, for the public time picker. Completed
    /// and cancelled bookings have released their slot and are not listed.
    pub async fn booked_times(&self, raw_date: &str) -> Result<Vec<BookedSlot>, EngineError> {
        let date = parse_booking_date(raw_date)?;
        let Some(day) = date.scheduled() else {
            return Err(EngineError::Validation("a calendar date is required".into()));
        };
        let slots = self
            .bookings
            .list_all()
            .await
            .into_iter()
            .filter(|b| b.status.is_active() && b.date.scheduled() == Some(day))
            .filter_map(|b| b.slot())
            .map(|slot| BookedSlot {
                start_time: slot.start,
                end_time: slot.end(),
                duration_hours: slot.duration_hours,
            })
            .collect();
        Ok(slots)
    }

    /// All bookings, newest first, for the admin list.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut bookings = self.bookings.list_all().await;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    pub async fn get_booking(&self, id: &str) -> Result<Booking, EngineError> {
        self.bookings
            .find_by_id(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))
    }

    pub async fn overrides(&self) -> Overrides {
        self.overrides.read().await
    }

    /// Resolve a gallery access code (case-insensitive) to its gallery,
    /// distinguishing an unknown code from an expired gallery.
    pub async fn verify_gallery(&self, code: &str) -> Result<GalleryView, EngineError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(EngineError::Validation("access code is required".into()));
        }
        let booking = self
            .bookings
            .list_all()
            .await
            .into_iter()
            .find(|b| {
                b.gallery_created
                    && b.gallery_access_code
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(code))
            })
            .ok_or_else(|| EngineError::NotFound("gallery access code".into()))?;

        if let Some(expires_at) = booking.gallery_expires_at
            && Utc::now() > expires_at {
                return Err(EngineError::Expired { expires_at });
            }

        Ok(GalleryView {
            photos: booking.gallery_photos.clone(),
            expires_at: booking.gallery_expires_at,
            booking,
        })
    }

    pub async fn list_testimonials(&self, include_unapproved: bool) -> Vec<Testimonial> {
        self.testimonials
            .list_all()
            .await
            .into_iter()
            .filter(|t| include_unapproved || t.approved)
            .collect()
    }

    pub async fn verification_codes(&self) -> std::collections::BTreeMap<String, String> {
        self.codes.read().await
    }

    /// Codes match case-insensitively: stored uppercase, compared against the
    /// uppercased input, keyed by lowercased email.
    pub async fn verify_testimonial_code(&self, email: &str, code: &str) -> bool {
        let codes = self.codes.read().await;
        let stored = codes.get(&email.trim().to_lowercase());
        stored.is_some_and(|s| s == &code.trim().to_uppercase())
    }
}
