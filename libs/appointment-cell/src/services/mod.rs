pub mod availability;
pub mod booking;
pub mod concurrency;
pub mod conflict;
pub mod defaults;
pub mod lifecycle;
pub mod repository;
pub mod validation;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use conflict::{ConflictDetectionService, ConflictResult, SlotCandidate};
pub use defaults::ResolvedBooking;
