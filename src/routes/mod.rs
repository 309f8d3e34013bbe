mod health_check;
mod lead;
mod purchase;
mod stats;

pub use health_check::health_check;
pub use lead::submit_lead;
pub use purchase::submit_purchase;
pub use stats::stats;
