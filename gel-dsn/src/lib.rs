mod env;
mod file;
#[cfg(feature = "gel")]
pub mod gel;
mod host;
#[cfg(feature = "postgres")]
pub mod postgres;
mod user;

pub use env::EnvVar;
pub use file::FileAccess;
pub use host::{Host, HostTarget, HostType};
pub use user::UserProfile;
