use crate::error::AckError;
use crate::types::{PrSummary, VerdictCategory};
use crate::view::Column;

#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    PageUp,
    PageDown,
    GoToTop,
    GoToBottom,
    Resize(u16, u16),

    // Detail sub-view
    OpenDetail,
    CloseDetail,

    // Commands
    SetSort(VerdictCategory),
    SetFilter(Column, String),
    ClearFilters,

    // Refresh
    Refresh,
    RefreshLoaded(Vec<PrSummary>, u64),
    RefreshFailed(String, u64),

    OpenInBrowser,

    Error(String),
    None,
}

impl From<AckError> for Action {
    fn from(err: AckError) -> Self {
        Action::Error(err.to_string())
    }
}
