pub mod behavior;
pub mod context;
pub mod interaction;
pub mod readiness;
pub mod script;
pub mod session;

// Re-export common types
pub use session::BrowserSession;
