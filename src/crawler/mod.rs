pub mod controller;
pub mod detail;
pub mod listing;
pub mod record;
pub mod tracker;

// Re-export common types
pub use controller::RunScheduler;
