pub mod manager;
pub mod session;

pub use manager::SessionManager;
pub use session::{ScratchValue, Session};
