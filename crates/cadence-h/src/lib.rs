pub mod cdp;
pub mod driver;
pub mod network;
mod script;

pub use driver::ChromiumDriver;
