pub mod chrome;

pub use chrome::{ChromeDriver, ChromeLauncher, ChromePage};
