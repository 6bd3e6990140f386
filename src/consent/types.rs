use serde::Serialize;

use super::analytics::GtagCommand;

pub const ACCEPTED: &str = "accepted";
pub const DECLINED: &str = "declined";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    #[default]
    Unset,
    Accepted,
    Declined,
}

impl ConsentDecision {
    /// Unknown stored values read as `Unset` so the user is asked again.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(ACCEPTED) => ConsentDecision::Accepted,
            Some(DECLINED) => ConsentDecision::Declined,
            _ => ConsentDecision::Unset,
        }
    }

    pub fn as_stored(self) -> Option<&'static str> {
        match self {
            ConsentDecision::Unset => None,
            ConsentDecision::Accepted => Some(ACCEPTED),
            ConsentDecision::Declined => Some(DECLINED),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyticsLoadState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptState {
    Hidden,
    Scheduled,
    Visible,
}

impl PromptState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => PromptState::Scheduled,
            2 => PromptState::Visible,
            _ => PromptState::Hidden,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            PromptState::Hidden => 0,
            PromptState::Scheduled => 1,
            PromptState::Visible => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsView {
    pub script_src: String,
    pub commands: Vec<serde_json::Value>,
}

impl AnalyticsView {
    pub(crate) fn new(script_src: &str, commands: &[GtagCommand]) -> Self {
        Self {
            script_src: script_src.to_string(),
            commands: commands.iter().map(GtagCommand::to_args).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentSnapshot {
    pub decision: ConsentDecision,
    pub prompt_visible: bool,
    pub prompt_delay_ms: Option<u64>,
    pub analytics_state: AnalyticsLoadState,
    pub analytics: Option<AnalyticsView>,
}
