use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_report_name")]
    pub report_name: String,
    /// chrono strftime format for the start date.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Tenant profile YAML; the built-in selectors are used when unset.
    #[serde(default)]
    pub profile: Option<PathBuf>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            report_name: default_report_name(),
            date_format: default_date_format(),
            profile: None,
        }
    }
}

fn default_url() -> String {
    "https://www.realpage.com/login/identity/Account/SignIn".to_string()
}

fn default_report_name() -> String {
    "1. STYL Variance Report (Custom/MagTech Monthly Financials)".to_string()
}

fn default_date_format() -> String {
    "%m/%d/%Y".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_network_idle_quiet_ms")]
    pub network_idle_quiet_ms: u64,
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
    #[serde(default = "default_frame_settle_ms")]
    pub frame_settle_ms: u64,
    #[serde(default = "default_value_read_timeout_ms")]
    pub value_read_timeout_ms: u64,
    #[serde(default = "default_suite_settle_ms")]
    pub suite_settle_ms: u64,
    #[serde(default = "default_favorites_settle_ms")]
    pub favorites_settle_ms: u64,
    #[serde(default = "default_reports_settle_ms")]
    pub reports_settle_ms: u64,
    #[serde(default = "default_table_settle_ms")]
    pub table_settle_ms: u64,
    #[serde(default = "default_form_settle_ms")]
    pub form_settle_ms: u64,
    #[serde(default = "default_form_frame_settle_ms")]
    pub form_frame_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            network_idle_quiet_ms: default_network_idle_quiet_ms(),
            frame_timeout_ms: default_frame_timeout_ms(),
            frame_settle_ms: default_frame_settle_ms(),
            value_read_timeout_ms: default_value_read_timeout_ms(),
            suite_settle_ms: default_suite_settle_ms(),
            favorites_settle_ms: default_favorites_settle_ms(),
            reports_settle_ms: default_reports_settle_ms(),
            table_settle_ms: default_table_settle_ms(),
            form_settle_ms: default_form_settle_ms(),
            form_frame_settle_ms: default_form_frame_settle_ms(),
        }
    }
}

impl TimingConfig {
    /// All timeouts set to `timeout_ms` and every settle delay to zero.
    pub fn immediate(timeout_ms: u64) -> Self {
        Self {
            default_timeout_ms: timeout_ms,
            poll_interval_ms: 5,
            network_idle_quiet_ms: 0,
            frame_timeout_ms: timeout_ms,
            frame_settle_ms: 0,
            value_read_timeout_ms: timeout_ms,
            suite_settle_ms: 0,
            favorites_settle_ms: 0,
            reports_settle_ms: 0,
            table_settle_ms: 0,
            form_settle_ms: 0,
            form_frame_settle_ms: 0,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn network_idle_quiet(&self) -> Duration {
        Duration::from_millis(self.network_idle_quiet_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn frame_settle(&self) -> Duration {
        Duration::from_millis(self.frame_settle_ms)
    }

    pub fn value_read_timeout(&self) -> Duration {
        Duration::from_millis(self.value_read_timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_network_idle_quiet_ms() -> u64 {
    500
}

fn default_frame_timeout_ms() -> u64 {
    10_000
}

fn default_frame_settle_ms() -> u64 {
    2_000
}

fn default_value_read_timeout_ms() -> u64 {
    3_000
}

fn default_suite_settle_ms() -> u64 {
    10_000
}

fn default_favorites_settle_ms() -> u64 {
    5_000
}

fn default_reports_settle_ms() -> u64 {
    8_000
}

fn default_table_settle_ms() -> u64 {
    3_000
}

fn default_form_settle_ms() -> u64 {
    3_000
}

fn default_form_frame_settle_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run headed. Defaults to true.
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            visible: default_visible(),
            chrome_executable: None,
            user_data_dir: None,
        }
    }
}

fn default_visible() -> bool {
    true
}
