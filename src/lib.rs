pub mod api;
#[cfg(feature = "chrome")]
pub mod browser;
pub mod core;
pub mod errors;
pub mod extract;
pub mod modules;
pub mod sessions;
pub mod testing;
pub mod types;

pub use api::AppState;
pub use core::Config;
pub use errors::{Result, SurfError};
pub use extract::ContentFetcher;
pub use modules::{AuthModule, ModuleRegistry};
pub use sessions::{Session, SessionManager};
pub use types::*;
