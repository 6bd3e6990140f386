mod analytics;
mod gate;
mod store;
mod types;

pub use analytics::{AnalyticsTag, COOKIE_FLAGS, ConfigParams, GTAG_SCRIPT_BASE, GtagCommand};
pub use gate::{ConsentGate, DEFAULT_PROMPT_DELAY};
pub use store::{CONSENT_KEY, ConsentStore, MemoryStore, StoreError};
pub use types::{
    AnalyticsLoadState, AnalyticsView, ConsentDecision, ConsentSnapshot, PromptState,
};
