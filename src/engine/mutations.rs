use chrono::{Months, NaiveDate, Utc};

use crate::limits::*;
use crate::mailer::{self, Email};
use crate::model::*;

use super::availability::date_availability;
use super::conflict::{find_overlap, overlap_reason, window_violation};
use super::{Engine, EngineError};

/// Who is submitting a testimonial. Clients must present the verification
/// code issued for their email; admin submissions are approved immediately.
pub enum TestimonialSubmitter {
    Admin,
    Client { verification_code: String },
}

fn required(value: &str, name: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{name} is required")));
    }
    if trimmed.len() > MAX_FIELD_LEN {
        return Err(EngineError::Validation(format!("{name} is too long")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>, name: &str) -> Result<Option<String>, EngineError> {
    match value {
        None => Ok(None),
        Some(v) => {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.len() > MAX_TEXT_LEN {
                return Err(EngineError::Validation(format!("{name} is too long")));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub(super) fn parse_booking_date(raw: &str) -> Result<BookingDate, EngineError> {
    BookingDate::parse(raw)
        .ok_or_else(|| EngineError::Validation(format!("invalid date {raw:?}, expected YYYY-MM-DD")))
}

pub(super) fn parse_start_time(raw: &str) -> Result<TimeOfDay, EngineError> {
    raw.parse()
        .map_err(|e: InvalidTime| EngineError::Validation(e.to_string()))
}

pub(super) fn validate_duration(hours: u32) -> Result<u32, EngineError> {
    if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&hours) {
        return Err(EngineError::Validation(format!(
            "duration must be between {MIN_DURATION_HOURS} and {MAX_DURATION_HOURS} hours"
        )));
    }
    Ok(hours)
}

impl Engine {
    /// Validate and persist a public booking submission.
    ///
    /// Date availability and slot conflicts are re-verified here even when
    /// the client already checked them, and the conflict check runs inside
    /// the collection's write lock so a concurrent submission cannot slip
    /// into the same slot.
    pub async fn create_booking(&self, new: NewBooking) -> Result<Booking, EngineError> {
        let last_name = required(&new.last_name, "lastName")?;
        let first_name = required(&new.first_name, "firstName")?;
        let email = required(&new.email, "email")?;
        let service_type = required(&new.service_type, "serviceType")?;
        let location = required(&new.location, "location")?;
        let date = parse_booking_date(&required(&new.date, "date")?)?;
        let special_requests = optional(new.special_requests, "specialRequests")?;

        if new.reference_photos.len() > MAX_LIST_LEN {
            return Err(EngineError::Validation("too many reference photos".into()));
        }

        let start_time = match &new.start_time {
            Some(raw) if !raw.trim().is_empty() => Some(parse_start_time(raw)?),
            _ => None,
        };
        let duration_hours = match new.duration_hours {
            Some(hours) => Some(validate_duration(hours)?),
            None => None,
        };
        if let Some(start) = start_time {
            let slot = Slot::new(start, duration_hours.unwrap_or(DEFAULT_DURATION_HOURS));
            if let Some(reason) = window_violation(&slot) {
                return Err(EngineError::Validation(reason));
            }
        }

        // The by-appointment sentinel bypasses both checks.
        if let Some(day) = date.scheduled() {
            let overrides = self.overrides.read().await;
            let result = date_availability(day, &overrides);
            if !result.available {
                metrics::counter!(crate::observability::SLOT_CONFLICTS_TOTAL).increment(1);
                return Err(EngineError::Conflict(
                    result.reason.unwrap_or_else(|| "this date is not available".into()),
                ));
            }
        }

        let booking = Booking {
            id: Self::new_booking_id(),
            last_name,
            first_name,
            email,
            service_type,
            date,
            start_time,
            duration_hours,
            location,
            special_requests,
            reference_photos: new.reference_photos,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            gallery_access_code: None,
            gallery_created: false,
            gallery_expires_at: None,
            gallery_photos: Vec::new(),
            notification_sent: false,
        };

        let stored = self
            .bookings
            .mutate(|records| {
                if let (Some(day), Some(slot)) = (booking.date.scheduled(), booking.slot()) {
                    let same_day: Vec<Booking> = records
                        .iter()
                        .filter(|b| b.date.scheduled() == Some(day))
                        .cloned()
                        .collect();
                    if let Some(taken) = find_overlap(&slot, &same_day) {
                        return Err(EngineError::Conflict(overlap_reason(&taken)));
                    }
                }
                records.push(booking.clone());
                Ok(booking.clone())
            })
            .await?
            .inspect_err(|_| {
                metrics::counter!(crate::observability::SLOT_CONFLICTS_TOTAL).increment(1);
            })?;

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::info!(id = %stored.id, date = %stored.date, "booking created");

        // Best-effort heads-up to the studio inbox.
        if let Some(contact) = self.contact_email.clone() {
            self.best_effort_send(new_booking_notice(&contact, &stored), "new-booking notice")
                .await;
        }

        Ok(stored)
    }

    /// Shallow-merge `patch` into the booking. Status may be set freely; the
    /// confirmation email fires only on a genuine transition into
    /// `confirmed`, and its failure comes back as a warning, never an error.
    pub async fn update_booking(
        &self,
        id: &str,
        patch: BookingPatch,
    ) -> Result<(Booking, Option<String>), EngineError> {
        let date = match &patch.date {
            Some(raw) => Some(parse_booking_date(raw)?),
            None => None,
        };
        let start_time = match &patch.start_time {
            Some(raw) => Some(parse_start_time(raw)?),
            None => None,
        };
        let duration_hours = match patch.duration_hours {
            Some(hours) => Some(validate_duration(hours)?),
            None => None,
        };
        if let Some(photos) = &patch.gallery_photos
            && photos.len() > MAX_LIST_LEN {
                return Err(EngineError::Validation("too many gallery photos".into()));
            }

        let (updated, was_confirmed) = self
            .bookings
            .mutate(|records| {
                let Some(record) = records.iter_mut().find(|b| b.id == id) else {
                    return Err(EngineError::NotFound(format!("booking {id}")));
                };
                let was_confirmed = record.status == BookingStatus::Confirmed;
                if let Some(status) = patch.status {
                    record.status = status;
                }
                if let Some(date) = date {
                    record.date = date;
                }
                if let Some(start) = start_time {
                    record.start_time = Some(start);
                }
                if let Some(hours) = duration_hours {
                    record.duration_hours = Some(hours);
                }
                if let Some(service) = &patch.service_type {
                    record.service_type = service.trim().to_string();
                }
                if let Some(location) = &patch.location {
                    record.location = location.trim().to_string();
                }
                if let Some(requests) = &patch.special_requests {
                    record.special_requests = Some(requests.clone());
                }
                if let Some(photos) = &patch.gallery_photos {
                    record.gallery_photos = photos.clone();
                }
                Ok((record.clone(), was_confirmed))
            })
            .await??;

        let mut warning = None;
        if !was_confirmed && updated.status == BookingStatus::Confirmed {
            warning = self
                .best_effort_send(confirmation_email(&updated), "confirmation email")
                .await;
        }

        Ok((updated, warning))
    }

    pub async fn remove_booking(&self, id: &str) -> Result<(), EngineError> {
        if self.bookings.remove_by_id(id).await? {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("booking {id}")))
        }
    }

    /// Send (or resend) the gallery email for a booking.
    ///
    /// The access code is generated once and the expiration date is set once
    /// to now + 2 months; a resend reuses both unchanged. The email itself is
    /// the operation here, so a transport failure aborts before any record
    /// mutation. An address that fails the shape check is rejected before
    /// delivery is attempted.
    pub async fn dispatch_gallery_email(
        &self,
        id: &str,
        gallery_url: &str,
    ) -> Result<GalleryDispatch, EngineError> {
        let gallery_url = required(gallery_url, "galleryUrl")?;
        let booking = self
            .bookings
            .find_by_id(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))?;

        mailer::parse_address(&booking.email)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let code = booking
            .gallery_access_code
            .clone()
            .unwrap_or_else(Self::new_gallery_code);
        let expires_at = booking
            .gallery_expires_at
            .unwrap_or_else(|| Utc::now() + Months::new(GALLERY_TTL_MONTHS));

        let email = gallery_email(&booking, &code, &gallery_url, expires_at);
        self.mailer.send(&email).await.map_err(|e| {
            metrics::counter!(crate::observability::EMAILS_FAILED_TOTAL).increment(1);
            EngineError::Email(e.to_string())
        })?;
        metrics::counter!(crate::observability::EMAILS_SENT_TOTAL).increment(1);
        metrics::counter!(crate::observability::GALLERY_DISPATCHES_TOTAL).increment(1);

        let stored_code = code.clone();
        let updated = self
            .bookings
            .update_by_id(id, |record| {
                record.gallery_access_code.get_or_insert(stored_code);
                if record.gallery_expires_at.is_none() {
                    record.gallery_expires_at = Some(expires_at);
                }
                record.gallery_created = true;
                record.notification_sent = true;
            })
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))?;

        tracing::info!(id = %updated.id, recipient = %updated.email, "gallery email dispatched");
        Ok(GalleryDispatch {
            access_code: updated.gallery_access_code.unwrap_or(code),
            recipient: updated.email,
        })
    }

    /// Apply a block/unblock/unlock/lock action to one or more dates.
    pub async fn apply_override(
        &self,
        action: OverrideAction,
        dates: Vec<NaiveDate>,
    ) -> Result<Overrides, EngineError> {
        if dates.is_empty() {
            return Err(EngineError::Validation("at least one date is required".into()));
        }
        if dates.len() > MAX_LIST_LEN {
            return Err(EngineError::Validation("too many dates in one request".into()));
        }
        let updated = self
            .overrides
            .update(|overrides| {
                for date in dates {
                    overrides.apply(action, date);
                }
            })
            .await?;
        Ok(updated)
    }

    pub async fn add_testimonial(
        &self,
        new: NewTestimonial,
        submitter: TestimonialSubmitter,
    ) -> Result<Testimonial, EngineError> {
        let name = required(&new.name, "name")?;
        let quote = match optional(Some(new.quote), "quote")? {
            Some(q) => q,
            None => return Err(EngineError::Validation("quote is required".into())),
        };
        let rating = new.rating.unwrap_or(5);
        if !(1..=5).contains(&rating) {
            return Err(EngineError::Validation("rating must be between 1 and 5".into()));
        }

        let approved = match submitter {
            TestimonialSubmitter::Admin => true,
            TestimonialSubmitter::Client { verification_code } => {
                let email = new
                    .email
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| {
                        EngineError::Validation("email and verification code are required".into())
                    })?;
                if !self.verify_testimonial_code(email, &verification_code).await {
                    return Err(EngineError::Validation("invalid verification code".into()));
                }
                false
            }
        };

        let testimonial = Testimonial {
            id: Self::new_testimonial_id(),
            name,
            role: new.role,
            quote,
            project: new.project,
            rating,
            date: new.date,
            image: new.image,
            email: new.email,
            approved,
            created_at: Utc::now(),
        };
        Ok(self.testimonials.append(testimonial).await?)
    }

    pub async fn approve_testimonial(&self, id: &str) -> Result<Testimonial, EngineError> {
        self.testimonials
            .update_by_id(id, |t| t.approved = true)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("testimonial {id}")))
    }

    pub async fn remove_testimonial(&self, id: &str) -> Result<(), EngineError> {
        if self.testimonials.remove_by_id(id).await? {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("testimonial {id}")))
        }
    }

    /// Codes are stored uppercased against the lowercased email, so lookups
    /// are effectively case-insensitive.
    pub async fn set_verification_code(&self, email: &str, code: &str) -> Result<(), EngineError> {
        let email = required(email, "email")?.to_lowercase();
        let code = required(code, "code")?.to_uppercase();
        self.codes
            .update(|codes| {
                codes.insert(email, code);
            })
            .await?;
        Ok(())
    }

    pub async fn remove_verification_code(&self, email: &str) -> Result<(), EngineError> {
        let email = required(email, "email")?.to_lowercase();
        self.codes
            .update(|codes| {
                codes.remove(&email);
            })
            .await?;
        Ok(())
    }

    /// Send `email`, reporting failure as a warning instead of an error.
    async fn best_effort_send(&self, email: Email, context: &str) -> Option<String> {
        match self.mailer.send(&email).await {
            Ok(()) => {
                metrics::counter!(crate::observability::EMAILS_SENT_TOTAL).increment(1);
                None
            }
            Err(e) => {
                metrics::counter!(crate::observability::EMAILS_FAILED_TOTAL).increment(1);
                tracing::error!(error = %e, "{context} failed");
                Some(format!("{context} failed: {e}"))
            }
        }
    }
}

fn format_booking_date(date: &BookingDate) -> String {
    match date.scheduled() {
        Some(day) => day.format("%A %-d %B %Y").to_string(),
        None => BY_APPOINTMENT.to_string(),
    }
}

fn confirmation_email(booking: &Booking) -> Email {
    let mut body = format!(
        "Hello {},\n\nYour photo session is confirmed.\n\nDate: {}\n",
        booking.first_name,
        format_booking_date(&booking.date),
    );
    if let Some(slot) = booking.slot() {
        body.push_str(&format!(
            "Time: {} - {} ({}h)\n",
            slot.start,
            slot.end(),
            slot.duration_hours
        ));
    }
    body.push_str(&format!(
        "Location: {}\nService: {}\n\nPlease arrive on time. If you need to change anything, just reply to this email.\n\nSee you soon,\nThe studio team\n",
        booking.location, booking.service_type,
    ));
    Email {
        to: booking.email.trim().to_string(),
        subject: "Your booking is confirmed".to_string(),
        body,
    }
}

fn gallery_email(
    booking: &Booking,
    code: &str,
    gallery_url: &str,
    expires_at: chrono::DateTime<Utc>,
) -> Email {
    let body = format!(
        "Hello {},\n\nYour photos are ready. Your private gallery is now online.\n\nGallery: {}\nAccess code: {}\n\nThe gallery stays available until {}. You can also leave a review from the gallery page.\n\nEnjoy,\nThe studio team\n",
        booking.first_name,
        gallery_url,
        code,
        expires_at.format("%-d %B %Y"),
    );
    Email {
        to: booking.email.trim().to_string(),
        subject: "Your photos are ready".to_string(),
        body,
    }
}

fn new_booking_notice(contact: &str, booking: &Booking) -> Email {
    let mut body = format!(
        "New booking received.\n\nName: {} {}\nEmail: {}\nService: {}\nDate: {}\n",
        booking.first_name,
        booking.last_name,
        booking.email,
        booking.service_type,
        format_booking_date(&booking.date),
    );
    if let Some(slot) = booking.slot() {
        body.push_str(&format!("Time: {} ({}h)\n", slot.start, slot.duration_hours));
    }
    body.push_str(&format!("Location: {}\n", booking.location));
    if let Some(requests) = &booking.special_requests {
        body.push_str(&format!("Special requests: {requests}\n"));
    }
    Email {
        to: contact.to_string(),
        subject: "New booking received".to_string(),
        body,
    }
}
