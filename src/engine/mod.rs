mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{available_dates_in_range, date_availability};
pub use conflict::slot_availability;
pub use error::EngineError;
pub use mutations::TestimonialSubmitter;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ulid::Ulid;

use crate::limits::GALLERY_CODE_LEN;
use crate::mailer::Mailer;
use crate::model::{Booking, Overrides, Testimonial};
use crate::store::{Collection, Document, StoreError};

/// Owns every collection and runs all booking, availability, gallery, and
/// testimonial operations against them. One instance per process; each
/// collection's lock serializes its writers.
pub struct Engine {
    pub(crate) bookings: Collection<Booking>,
    pub(crate) testimonials: Collection<Testimonial>,
    /// Lowercased email → uppercased verification code.
    pub(crate) codes: Document<BTreeMap<String, String>>,
    pub(crate) overrides: Document<Overrides>,
    pub(crate) mailer: Arc<dyn Mailer>,
    /// Studio inbox for new-booking notifications, when configured.
    pub(crate) contact_email: Option<String>,
}

impl Engine {
    /// Load every collection from `data_dir`.
    pub fn open(
        data_dir: &Path,
        mailer: Arc<dyn Mailer>,
        contact_email: Option<String>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            bookings: Collection::open(data_dir, "bookings")?,
            testimonials: Collection::open(data_dir, "testimonials")?,
            codes: Document::open(data_dir, "codes")?,
            overrides: Document::open(data_dir, "overrides")?,
            mailer,
            contact_email,
        })
    }

    pub(crate) fn new_booking_id() -> String {
        format!("booking-{}", Ulid::new().to_string().to_lowercase())
    }

    pub(crate) fn new_testimonial_id() -> String {
        format!("testimonial-{}", Ulid::new().to_string().to_lowercase())
    }

    /// Opaque uppercase access code, taken from the random tail of a fresh
    /// ULID (Crockford base32, so already A-Z0-9).
    pub(crate) fn new_gallery_code() -> String {
        let ulid = Ulid::new().to_string();
        ulid[ulid.len() - GALLERY_CODE_LEN..].to_string()
    }
}
