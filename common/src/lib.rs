pub mod config;
pub mod models;
pub mod utils;

pub use self::config::*;
pub use models::session::{Role, SessionClaims, SessionPayload};
pub use utils::*;
