//! User records backed by `SQLite`.

pub mod error;
pub mod model;
pub mod password;
pub mod store;

pub use error::{UserError, UserResult};
pub use model::{NewUser, User};
pub use password::hash_password;
pub use store::{SqliteUserStore, StoreFuture, UserStore};
