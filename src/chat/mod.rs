//! Tool-augmented chat: the driver loop and its prompt profiles.

pub mod driver;
pub mod error;
pub mod profile;

pub use driver::{ChatDriver, ChatOutcome};
pub use error::{ChatError, ChatResult};
pub use profile::{ChatProfile, ProfilePreset};
