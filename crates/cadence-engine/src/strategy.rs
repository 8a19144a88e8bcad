//! Ordered selector strategies keyed by logical target.
//!
//! Tenant skins differ only in the concrete selectors, so the workflow asks
//! for a [`LogicalTarget`] and the active [`StrategyTable`] supplies the
//! fallback chain. A tenant profile overrides individual targets; anything it
//! leaves out comes from the built-in table.

use crate::driver::Selector;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalTarget {
    UsernameInput,
    NextButton,
    PasswordInput,
    LoginButton,
    SuiteTile,
    FavoritesMenu,
    FavoritesDropdown,
    ReportsMenuItem,
    ReportRows,
    ReportNameCell,
    ScheduleLink,
    StartDateInput,
    IntervalInput,
    SaveButton,
}

impl LogicalTarget {
    pub const ALL: [LogicalTarget; 14] = [
        LogicalTarget::UsernameInput,
        LogicalTarget::NextButton,
        LogicalTarget::PasswordInput,
        LogicalTarget::LoginButton,
        LogicalTarget::SuiteTile,
        LogicalTarget::FavoritesMenu,
        LogicalTarget::FavoritesDropdown,
        LogicalTarget::ReportsMenuItem,
        LogicalTarget::ReportRows,
        LogicalTarget::ReportNameCell,
        LogicalTarget::ScheduleLink,
        LogicalTarget::StartDateInput,
        LogicalTarget::IntervalInput,
        LogicalTarget::SaveButton,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalTarget::UsernameInput => "username input",
            LogicalTarget::NextButton => "next button",
            LogicalTarget::PasswordInput => "password input",
            LogicalTarget::LoginButton => "login button",
            LogicalTarget::SuiteTile => "suite tile",
            LogicalTarget::FavoritesMenu => "favorites menu",
            LogicalTarget::FavoritesDropdown => "favorites dropdown",
            LogicalTarget::ReportsMenuItem => "reports menu item",
            LogicalTarget::ReportRows => "report rows",
            LogicalTarget::ReportNameCell => "report name cell",
            LogicalTarget::ScheduleLink => "schedule link",
            LogicalTarget::StartDateInput => "start date input",
            LogicalTarget::IntervalInput => "interval input",
            LogicalTarget::SaveButton => "save button",
        }
    }
}

impl fmt::Display for LogicalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Strategy for '{0}' has no selectors")]
    Empty(LogicalTarget),
}

/// Non-empty, priority-ordered list of selectors for one target. Most
/// tenant-specific first, most generic last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStrategy {
    selectors: Vec<Selector>,
}

impl SelectorStrategy {
    pub fn new(target: LogicalTarget, selectors: Vec<Selector>) -> Result<Self, StrategyError> {
        if selectors.is_empty() {
            return Err(StrategyError::Empty(target));
        }
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.selectors.iter()
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Builds a built-in strategy; the lists below are never empty.
    fn builtin(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }
}

/// Strategy table for one tenant skin.
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    name: Option<String>,
    overrides: HashMap<LogicalTarget, SelectorStrategy>,
}

impl StrategyTable {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("default")
    }

    pub fn strategy(&self, target: LogicalTarget) -> Cow<'_, SelectorStrategy> {
        match self.overrides.get(&target) {
            Some(strategy) => Cow::Borrowed(strategy),
            None => Cow::Owned(builtin_strategy(target)),
        }
    }

    pub fn with_override(mut self, target: LogicalTarget, strategy: SelectorStrategy) -> Self {
        self.overrides.insert(target, strategy);
        self
    }

    pub fn is_overridden(&self, target: LogicalTarget) -> bool {
        self.overrides.contains_key(&target)
    }

    /// Parse a tenant profile from YAML.
    pub fn from_yaml(content: &str) -> Result<Self, ProfileError> {
        let raw: RawProfile = serde_yaml::from_str(content)?;
        let mut overrides = HashMap::new();
        for (target, selectors) in raw.targets {
            let selectors = selectors.into_iter().map(RawSelector::into_selector).collect();
            overrides.insert(target, SelectorStrategy::new(target, selectors)?);
        }
        Ok(Self {
            name: raw.name,
            overrides,
        })
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to parse tenant profile: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

#[derive(Deserialize)]
struct RawProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    targets: HashMap<LogicalTarget, Vec<RawSelector>>,
}

/// Bare strings in a profile are CSS selectors.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Css(String),
    Full(Selector),
}

impl RawSelector {
    fn into_selector(self) -> Selector {
        match self {
            RawSelector::Css(css) => Selector::css(css),
            RawSelector::Full(selector) => selector,
        }
    }
}

fn css_list(list: &[&str]) -> Vec<Selector> {
    list.iter().map(|s| Selector::css(*s)).collect()
}

/// Selectors that work against the generic portal skin.
fn builtin_strategy(target: LogicalTarget) -> SelectorStrategy {
    let selectors = match target {
        LogicalTarget::UsernameInput => css_list(&[
            "input[type='email']",
            "input[name='username']",
            "input[autocomplete='username']",
            "input[aria-label='Username']",
            "input[placeholder*='User']",
        ]),
        LogicalTarget::NextButton => vec![
            Selector::css(".login-page-form-button button[type='submit']"),
            Selector::text("button", "Next"),
            Selector::css("button[type='submit']"),
        ],
        LogicalTarget::PasswordInput => css_list(&[
            "input[type='password']",
            "input[name='password']",
            "input[autocomplete='current-password']",
            "input[aria-label='Password']",
        ]),
        LogicalTarget::LoginButton => vec![
            Selector::css(".login-page-form-button button[type='submit']"),
            Selector::text("button", "Login"),
            Selector::text("button", "Sign in"),
            Selector::css("input[type='submit']"),
        ],
        LogicalTarget::SuiteTile => vec![
            Selector::has("a", Selector::css("raul-icon[title='Financial Suite']")),
            Selector::text("a", "Financial Suite"),
        ],
        LogicalTarget::FavoritesMenu => css_list(&["#favorites-menu"]),
        LogicalTarget::FavoritesDropdown => css_list(&[".qx-siamenu-favorites.active"]),
        LogicalTarget::ReportsMenuItem => vec![
            Selector::css(
                "#siaappsmenu > div.qx-siamenu-favorites.qx-siamenu-cnt.active > div.qx-siamenu-fav-content > div.qx-fav-content.qx-menu-hover-scroll.sortable > div:nth-child(1) > div > a.qx-nav-name",
            ),
            Selector::text(".qx-siamenu-favorites.active a.qx-nav-name", "Financial reports"),
        ],
        LogicalTarget::ReportRows => css_list(&["#listcontent tbody tr"]),
        LogicalTarget::ReportNameCell => css_list(&["td font", "td"]),
        LogicalTarget::ScheduleLink => vec![
            Selector::text("td a[href*='editor.phtml']", "Schedule"),
            Selector::text("td a", "Schedule"),
        ],
        LogicalTarget::StartDateInput => css_list(&[
            "#_obj__STARTDATE",
            "#obj__STARTDATE",
            "input[id*='obj__STARTDATE']",
            "input[name*='STARTDATE']",
            "input[aria-label*='Start Date']",
            "input[placeholder*='Start']",
            "input[name*='start'][type='text']",
            "input#start-date",
        ]),
        LogicalTarget::IntervalInput => css_list(&[
            "#_obj__INTERVAL",
            "#obj__INTERVAL",
            "input[id*='obj__INTERVAL']",
            "input[id*='INTERVAL']",
            "input[name*='INTERVAL']",
            "input[aria-label*='Every']",
            "input[name*='every']",
            "input#every",
        ]),
        LogicalTarget::SaveButton => vec![
            Selector::text("button", "Save"),
            Selector::text("button", "Update"),
            Selector::css("input[type='submit']"),
            Selector::css("button[type='submit']"),
        ],
    };
    SelectorStrategy::builtin(selectors)
}
