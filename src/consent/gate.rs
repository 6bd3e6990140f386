use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::analytics::{AnalyticsTag, GtagCommand};
use super::store::{CONSENT_KEY, ConsentStore};
use super::types::{AnalyticsLoadState, ConsentDecision, ConsentSnapshot, PromptState};

pub const DEFAULT_PROMPT_DELAY: Duration = Duration::from_millis(1000);

/// Prompt visibility shared with the reveal task.
#[derive(Debug, Clone)]
struct PromptSlot(Arc<AtomicU8>);

impl PromptSlot {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PromptState::Hidden.as_u8())))
    }

    fn get(&self) -> PromptState {
        PromptState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: PromptState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Only a still-scheduled prompt may become visible.
    fn reveal(&self) -> bool {
        self.0
            .compare_exchange(
                PromptState::Scheduled.as_u8(),
                PromptState::Visible.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

pub struct ConsentGate<S: ConsentStore> {
    store: S,
    measurement_id: Option<String>,
    prompt_delay: Duration,
    decision: ConsentDecision,
    prompt: PromptSlot,
    reveal: Option<JoinHandle<()>>,
    analytics: Option<AnalyticsTag>,
}

impl<S: ConsentStore> ConsentGate<S> {
    pub fn new(store: S, measurement_id: Option<String>, prompt_delay: Duration) -> Self {
        Self {
            store,
            measurement_id: measurement_id.filter(|id| !id.trim().is_empty()),
            prompt_delay,
            decision: ConsentDecision::Unset,
            prompt: PromptSlot::new(),
            reveal: None,
            analytics: None,
        }
    }

    /// Starts a page lifetime: reads the stored decision and acts on it.
    ///
    /// `Unset` schedules the prompt after the configured delay, `Accepted`
    /// bootstraps analytics straight away, `Declined` does nothing.
    pub fn mount(&mut self) -> ConsentDecision {
        self.cancel_reveal();
        self.prompt.set(PromptState::Hidden);
        self.analytics = None;
        self.decision = self.read_decision();
        debug!(decision = ?self.decision, "consent gate mounted");

        match self.decision {
            ConsentDecision::Unset => self.schedule_reveal(),
            ConsentDecision::Accepted => {
                self.bootstrap_analytics();
            }
            ConsentDecision::Declined => {}
        }
        self.decision
    }

    /// Tears the page down. A pending reveal never fires after this.
    pub fn unmount(&mut self) {
        self.cancel_reveal();
        self.prompt.set(PromptState::Hidden);
    }

    pub fn accept(&mut self) {
        self.record(ConsentDecision::Accepted);
        self.bootstrap_analytics();
    }

    /// Declining after the tag is present asks it to stop recording; the
    /// injected script itself stays.
    pub fn decline(&mut self) {
        self.record(ConsentDecision::Declined);
        if let Some(tag) = self.analytics.as_mut() {
            tag.push(GtagCommand::DenyAnalyticsStorage);
            info!("analytics storage denied after load");
        }
    }

    /// Injects and configures the analytics tag at most once per page lifetime.
    /// Returns whether this call performed the injection.
    pub fn bootstrap_analytics(&mut self) -> bool {
        let Some(measurement_id) = self.measurement_id.as_deref() else {
            warn!("analytics measurement id not configured, analytics disabled");
            return false;
        };
        if self.analytics.is_some() {
            debug!("analytics tag already present, skipping bootstrap");
            return false;
        }

        self.analytics = Some(AnalyticsTag::bootstrap(measurement_id, Utc::now()));
        info!(measurement_id, "analytics tag injected");
        true
    }

    pub fn decision(&self) -> ConsentDecision {
        self.decision
    }

    pub fn prompt_state(&self) -> PromptState {
        self.prompt.get()
    }

    pub fn is_prompt_visible(&self) -> bool {
        self.prompt.get() == PromptState::Visible
    }

    pub fn load_state(&self) -> AnalyticsLoadState {
        self.analytics
            .as_ref()
            .map_or(AnalyticsLoadState::NotLoaded, AnalyticsTag::state)
    }

    pub fn analytics(&self) -> Option<&AnalyticsTag> {
        self.analytics.as_ref()
    }

    /// Called by the host once the tag has been emitted into the page.
    pub fn confirm_analytics_loaded(&mut self) {
        if let Some(tag) = self.analytics.as_mut() {
            tag.confirm_loaded();
        }
    }

    pub fn snapshot(&self) -> ConsentSnapshot {
        ConsentSnapshot {
            decision: self.decision,
            prompt_visible: self.is_prompt_visible(),
            prompt_delay_ms: self.pending_prompt_delay_ms(),
            analytics_state: self.load_state(),
            analytics: self.analytics.as_ref().map(AnalyticsTag::view),
        }
    }

    /// Delay before a still-scheduled prompt shows, for hosts that reveal it themselves.
    fn pending_prompt_delay_ms(&self) -> Option<u64> {
        (self.prompt.get() == PromptState::Scheduled)
            .then(|| u64::try_from(self.prompt_delay.as_millis()).unwrap_or(u64::MAX))
    }

    fn record(&mut self, decision: ConsentDecision) {
        self.cancel_reveal();
        self.prompt.set(PromptState::Hidden);
        self.decision = decision;

        if let Some(value) = decision.as_stored() {
            if let Err(error) = self.store.set(CONSENT_KEY, value) {
                warn!(%error, "failed to persist consent decision");
            }
        }
        info!(?decision, "consent decision recorded");
    }

    fn read_decision(&self) -> ConsentDecision {
        match self.store.get(CONSENT_KEY) {
            Ok(value) => ConsentDecision::from_stored(value.as_deref()),
            Err(error) => {
                warn!(%error, "consent store unreadable, treating decision as unset");
                ConsentDecision::Unset
            }
        }
    }

    fn schedule_reveal(&mut self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime available, consent prompt stays hidden");
            return;
        };

        self.prompt.set(PromptState::Scheduled);
        let prompt = self.prompt.clone();
        let deadline = Instant::now() + self.prompt_delay;
        self.reveal = Some(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if prompt.reveal() {
                debug!("consent prompt revealed");
            }
        }));
    }

    fn cancel_reveal(&mut self) {
        if let Some(task) = self.reveal.take() {
            task.abort();
        }
    }
}

impl<S: ConsentStore> Drop for ConsentGate<S> {
    fn drop(&mut self) {
        self.cancel_reveal();
        self.prompt.set(PromptState::Hidden);
    }
}
