//! The navigate / narrate / listen / act loop for one destination page.
//!
//! A session is an explicit state machine: `advance` performs exactly one
//! transition, and every suspension point (page readiness, fetches,
//! listening, actuation) races the session's cancellation token so a
//! process shutdown ends it promptly. Within a session steps never overlap:
//! inspect, narrate, listen, interpret, actuate, in that order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::brain::PageSummarizer;
use crate::hands::BrowserActuator;
use crate::inspector::PageInspector;
use crate::interpreter::ActionInterpreter;
use crate::types::{Action, AgentEvent, PageSnapshot, Session, SessionOutcome, SessionState};
use crate::voice::Narrator;

pub const SUMMARY_FALLBACK: &str = "Unable to generate a formal summary for this website.";
pub const NOT_UNDERSTOOD: &str = "I did not understand your command. Please try again.";
pub const SESSION_ENDED: &str = "Session ended.";
pub const FAILURE_APOLOGY: &str =
    "Sorry, I could not control the browser, so I am ending this session.";

/// How long to wait for pages to finish updating.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Upper bound on waiting for the browser's readiness signal.
    pub ready_timeout: Duration,
    /// Sleep used when no readiness signal arrives.
    pub settle_fallback: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(10),
            settle_fallback: Duration::from_secs(3),
        }
    }
}

/// Collaborators shared by every session.
pub struct SessionContext {
    pub inspector: Arc<dyn PageInspector>,
    pub summarizer: Arc<dyn PageSummarizer>,
    pub narrator: Arc<dyn Narrator>,
    pub actuator: BrowserActuator,
    pub interpreter: ActionInterpreter,
    pub timing: SessionTiming,
    pub events: broadcast::Sender<AgentEvent>,
}

#[derive(Debug)]
struct Cancelled;

pub struct SessionController {
    ctx: Arc<SessionContext>,
    session: Session,
    state: SessionState,
    cancel: CancellationToken,
}

impl SessionController {
    pub fn new(ctx: Arc<SessionContext>, address: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            ctx,
            session: Session::new(address),
            state: SessionState::Start,
            cancel,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drive the session until it terminates, fails, or is cancelled.
    pub async fn run(mut self) -> (Session, SessionOutcome) {
        info!("Session started for {}", self.session.current_address);
        loop {
            match &self.state {
                SessionState::Terminated => {
                    info!("Session ended at {}", self.session.current_address);
                    return (self.session, SessionOutcome::Completed);
                }
                SessionState::Failed { reason } => {
                    warn!("Session failed: {}", reason);
                    let outcome = SessionOutcome::Failed(reason.clone());
                    return (self.session, outcome);
                }
                _ => {}
            }

            if self.step().await.is_err() {
                info!("Session cancelled at {}", self.session.current_address);
                self.session.terminated = true;
                return (self.session, SessionOutcome::Cancelled);
            }
        }
    }

    /// Perform a single transition.
    async fn step(&mut self) -> Result<(), Cancelled> {
        let state = self.state.clone();
        debug!("Session state: {:?}", state);
        self.state = self.advance(state).await?;
        Ok(())
    }

    async fn advance(&mut self, state: SessionState) -> Result<SessionState, Cancelled> {
        let next = match state {
            SessionState::Start => {
                let address = self.session.current_address.clone();
                let navigated = self.suspend(self.ctx.actuator.navigate(&address)).await?;
                if let Err(e) = navigated {
                    return Ok(self.fail(e.to_string()).await);
                }
                self.settle(None).await?;
                SessionState::Summarizing { address }
            }

            SessionState::Summarizing { address } => {
                let summary = match self.suspend(self.ctx.summarizer.summarize(&address)).await? {
                    Ok(summary) => summary,
                    Err(e) => {
                        warn!("Error generating formal summary: {}", e);
                        SUMMARY_FALLBACK.to_string()
                    }
                };
                self.say(&summary).await?;

                let snapshot = match self.suspend(self.ctx.inspector.inspect(&address)).await? {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!("Inspection failed, presenting an empty page: {}", e);
                        PageSnapshot::default()
                    }
                };
                self.session.observe(address, snapshot);

                let prompt = describe_options(
                    &self.session.last_snapshot,
                    self.ctx.interpreter.first_known_action(),
                );
                self.say(&prompt).await?;
                SessionState::AwaitingReply
            }

            SessionState::AwaitingReply => {
                let reply = self.suspend(self.ctx.narrator.listen()).await?;
                info!("User response for further action: '{}'", reply);
                SessionState::Interpreting { reply }
            }

            SessionState::Interpreting { reply } => {
                let action = self
                    .ctx
                    .interpreter
                    .interpret(&reply, &self.session.last_snapshot);
                SessionState::Actuating { action }
            }

            SessionState::Actuating { action } => match action {
                Action::Stop => {
                    self.say(SESSION_ENDED).await?;
                    self.session.terminated = true;
                    SessionState::Terminated
                }
                Action::Unrecognized => {
                    self.say(NOT_UNDERSTOOD).await?;
                    SessionState::AwaitingReply
                }
                Action::TypeInSearch(ref query) | Action::ClickButton(ref query) => {
                    let confirmation = match &action {
                        Action::TypeInSearch(_) => format!("Proceeding with search for '{}'.", query),
                        _ => format!("Proceeding to click the '{}' button.", query),
                    };
                    self.say(&confirmation).await?;
                    let _ = self.ctx.events.send(AgentEvent::Action {
                        description: format!("{:?}", action),
                    });

                    let before = self.suspend(self.ctx.actuator.page_marker()).await?;
                    match self.suspend(self.ctx.actuator.actuate(&action)).await? {
                        Ok(()) => SessionState::Reinspecting { before },
                        Err(e) => self.fail(e.to_string()).await,
                    }
                }
            },

            SessionState::Reinspecting { before } => {
                self.settle(before.as_deref()).await?;
                let current = &self.session.current_address;
                let address = match self.suspend(self.ctx.actuator.current_address()).await? {
                    Ok(address) if !address.is_empty() => {
                        if &address != current {
                            info!("Browser moved from {} to {}", current, address);
                        }
                        address
                    }
                    Ok(_) => current.clone(),
                    Err(e) => {
                        warn!("Could not read the current address, keeping {}: {}", current, e);
                        current.clone()
                    }
                };
                SessionState::Summarizing { address }
            }

            terminal @ (SessionState::Terminated | SessionState::Failed { .. }) => terminal,
        };
        Ok(next)
    }

    async fn fail(&mut self, reason: String) -> SessionState {
        warn!("Actuation failed: {}", reason);
        // The apology is spoken even if shutdown is underway.
        self.ctx.narrator.say(FAILURE_APOLOGY).await;
        self.session.terminated = true;
        SessionState::Failed { reason }
    }

    async fn say(&self, text: &str) -> Result<(), Cancelled> {
        self.suspend(self.ctx.narrator.say(text)).await
    }

    async fn settle(&self, before: Option<&str>) -> Result<(), Cancelled> {
        let timing = self.ctx.timing;
        self.suspend(
            self.ctx
                .actuator
                .settle(before, timing.ready_timeout, timing.settle_fallback),
        )
        .await
    }

    async fn suspend<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            output = fut => Ok(output),
        }
    }
}

/// The spoken question that follows the page summary.
pub fn describe_options(snapshot: &PageSnapshot, first_known_action: Option<&str>) -> String {
    if snapshot.has_search_field {
        let action = first_known_action.or_else(|| {
            snapshot
                .button_labels
                .iter()
                .map(String::as_str)
                .find(|label| !label.is_empty())
        });
        return match action {
            Some(action) => format!(
                "I see a search box. Would you like to type in the search box or press the '{}' button?",
                action
            ),
            None => "I see a search box. Would you like to type in the search box?".to_string(),
        };
    }

    format!(
        "The page shows the following buttons: {} and links: {}. Would you like to do something else?",
        list_or_none(&snapshot.button_labels),
        list_or_none(&snapshot.link_labels)
    )
}

fn list_or_none(labels: &[String]) -> String {
    if labels.is_empty() {
        "none".to_string()
    } else {
        labels.join(", ")
    }
}
