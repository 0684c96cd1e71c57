//! Database models split into domain-specific modules.

pub mod ingredient;
pub mod menu;
pub mod recipe;
pub mod user;

pub use ingredient::*;
pub use menu::*;
pub use recipe::*;
pub use user::*;

/// Current time in the format stored in `created_at`/`updated_at`
pub(crate) fn now() -> String {
    // Fixed precision keeps the strings ordered lexicographically
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
