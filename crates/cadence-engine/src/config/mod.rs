pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader, Credentials};
pub use schema::{BrowserConfig, CadenceConfig, PortalConfig, TimingConfig};
