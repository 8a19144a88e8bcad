use serde::Serialize;
use std::fmt;

/// Workflow states in the order the portal is walked. Each state names the
/// step that reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkflowState {
    LoggedOut,
    Authenticating,
    Authenticated,
    SuiteTileClicked,
    SuiteWindowOpen,
    FavoritesMenuOpen,
    ReportsListLoaded,
    ScheduleFormOpen,
    FieldsUpdated,
    Saved,
    Failed,
}

impl WorkflowState {
    /// The state after this one, or `None` for the terminal states.
    pub fn next(self) -> Option<WorkflowState> {
        use WorkflowState::*;
        match self {
            LoggedOut => Some(Authenticating),
            Authenticating => Some(Authenticated),
            Authenticated => Some(SuiteTileClicked),
            SuiteTileClicked => Some(SuiteWindowOpen),
            SuiteWindowOpen => Some(FavoritesMenuOpen),
            FavoritesMenuOpen => Some(ReportsListLoaded),
            ReportsListLoaded => Some(ScheduleFormOpen),
            ScheduleFormOpen => Some(FieldsUpdated),
            FieldsUpdated => Some(Saved),
            Saved | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Saved | WorkflowState::Failed)
    }

    pub fn name(self) -> &'static str {
        use WorkflowState::*;
        match self {
            LoggedOut => "logged_out",
            Authenticating => "authenticating",
            Authenticated => "authenticated",
            SuiteTileClicked => "suite_tile_clicked",
            SuiteWindowOpen => "suite_window_open",
            FavoritesMenuOpen => "favorites_menu_open",
            ReportsListLoaded => "reports_list_loaded",
            ScheduleFormOpen => "schedule_form_open",
            FieldsUpdated => "fields_updated",
            Saved => "saved",
            Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
