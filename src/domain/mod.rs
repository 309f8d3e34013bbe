mod email;
mod event;
mod phone;
mod platform;
mod queue_job;

pub use email::fingerprint_email;
pub use email::normalize_email;
pub use email::ContactEmail;
pub use event::AcquisitionBlock;
pub use event::CurrentTouch;
pub use event::Event;
pub use event::EventStatus;
pub use event::EventType;
pub use event::EmailValidationStatus;
pub use event::PurchaseBlock;
pub use phone::CanonicalPhone;
pub use phone::PhoneError;
pub use platform::PlatformDefinition;
pub use platform::PlatformType;
pub use queue_job::JobStatus;
pub use queue_job::QueueJob;
