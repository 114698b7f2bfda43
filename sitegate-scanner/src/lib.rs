pub mod driver;
pub mod error;
pub mod http_driver;
pub mod result;

pub use driver::{DriverFactory, InteractivePage, NavigateOptions, PageDriver, WaitUntil};
pub use error::ScanError;
pub use http_driver::{HttpDriver, HttpDriverFactory};
pub use result::{ConsoleMessage, ElementHandle, ElementInfo, NetworkResponse, PageResponse};
