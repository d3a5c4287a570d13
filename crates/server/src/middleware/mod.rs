pub mod auth;
pub mod model_loaders;

pub use auth::require_user;
pub use model_loaders::*;
