pub mod config;
pub mod driver;

pub use config::{BrowserConfig, Config, FetchConfig, ServerConfig, SessionConfig, Viewport};
pub use driver::{BrowserDriver, DriverLauncher, ImageFormat, PageElement, PageHandle};
