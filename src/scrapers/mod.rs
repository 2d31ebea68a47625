pub mod browser;
pub mod controller;
pub mod extract;
pub mod http;
pub mod traits;

pub use browser::ChromeDriver;
pub use controller::{ControllerHandle, ScrapeController, ScrapeStatus};
pub use extract::extract_listings;
pub use http::SnapshotDriver;
pub use traits::PageDriver;
