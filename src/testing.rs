//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::brain::{PageSummarizer, QuestionAnswerer};
use crate::error::{ActuationError, CollaboratorError, FetchError};
use crate::hands::BrowserControl;
use crate::inspector::PageInspector;
use crate::types::PageSnapshot;
use crate::voice::Narrator;

/// Serves canned snapshots; unknown addresses answer with a 500.
#[derive(Default)]
pub struct FakeInspector {
    pages: HashMap<String, PageSnapshot>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, address: &str, snapshot: PageSnapshot) -> Self {
        self.pages.insert(address.to_string(), snapshot);
        self
    }
}

#[async_trait]
impl PageInspector for FakeInspector {
    async fn inspect(&self, address: &str) -> Result<PageSnapshot, FetchError> {
        self.pages.get(address).cloned().ok_or_else(|| FetchError::Status {
            address: address.to_string(),
            status: 500,
        })
    }
}

pub struct FakeSummarizer;

#[async_trait]
impl PageSummarizer for FakeSummarizer {
    async fn summarize(&self, address: &str) -> Result<String, CollaboratorError> {
        Ok(format!("Summary of {}", address))
    }
}

/// Summarizer whose service is always down.
pub struct FailingSummarizer;

#[async_trait]
impl PageSummarizer for FailingSummarizer {
    async fn summarize(&self, _address: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}

pub struct FakeAnswerer;

#[async_trait]
impl QuestionAnswerer for FakeAnswerer {
    async fn answer(&self, question: &str) -> Result<String, CollaboratorError> {
        Ok(format!("Answer to: {}", question))
    }
}

pub struct FailingAnswerer;

#[async_trait]
impl QuestionAnswerer for FailingAnswerer {
    async fn answer(&self, _question: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::InvalidResponse("no choices".to_string()))
    }
}

/// Replays queued replies and records everything said.
///
/// Once the queue is empty it answers "stop", or never answers at all after
/// `hang_when_empty`.
pub struct ScriptedNarrator {
    replies: Mutex<VecDeque<String>>,
    spoken: Mutex<Vec<String>>,
    hang: AtomicBool,
}

impl ScriptedNarrator {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            spoken: Mutex::new(Vec::new()),
            hang: AtomicBool::new(false),
        }
    }

    pub fn hang_when_empty(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn say(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }

    async fn listen(&self) -> String {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None if self.hang.load(Ordering::SeqCst) => std::future::pending().await,
            None => "stop".to_string(),
        }
    }
}

/// Where the fake browser currently is. Every committed navigation gets a
/// fresh document number, which doubles as the page marker.
#[derive(Debug)]
struct Location {
    address: String,
    document: u64,
}

impl Location {
    fn commit(&mut self, address: &str) {
        self.address = address.to_string();
        self.document += 1;
    }
}

/// A browser with a fixed set of buttons and a current address.
pub struct FakeBrowser {
    location: Arc<Mutex<Location>>,
    buttons: Vec<String>,
    destinations: HashMap<String, String>,
    navigation_delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    clicked: Mutex<Vec<String>>,
    available: bool,
    actions_fail: bool,
    address_fails: bool,
    ready_signal: bool,
}

impl FakeBrowser {
    pub fn new(address: &str) -> Self {
        Self {
            location: Arc::new(Mutex::new(Location {
                address: address.to_string(),
                document: 0,
            })),
            buttons: Vec::new(),
            destinations: HashMap::new(),
            navigation_delay: None,
            calls: Mutex::new(Vec::new()),
            clicked: Mutex::new(Vec::new()),
            available: true,
            actions_fail: false,
            address_fails: false,
            ready_signal: true,
        }
    }

    pub fn with_buttons(mut self, buttons: &[&str]) -> Self {
        self.buttons = buttons.iter().map(|b| b.to_string()).collect();
        self
    }

    /// Clicking `button` moves the browser to `address`.
    pub fn navigates_on_click(mut self, button: &str, address: &str) -> Self {
        self.destinations.insert(button.to_string(), address.to_string());
        self
    }

    /// Click-triggered navigations commit only after `delay`. Until then the
    /// old page stays and keeps reporting ready.
    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = Some(delay);
        self
    }

    /// Every call fails as if Chrome were gone.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Typing and clicking fail; navigation still works.
    pub fn fail_actions(mut self) -> Self {
        self.actions_fail = true;
        self
    }

    /// Reading the current address fails; everything else works.
    pub fn fail_address_reads(mut self) -> Self {
        self.address_fails = true;
        self
    }

    pub fn without_ready_signal(mut self) -> Self {
        self.ready_signal = false;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clicked(&self) -> Vec<String> {
        self.clicked.lock().unwrap().clone()
    }

    fn check(&self, acting: bool) -> Result<(), ActuationError> {
        if !self.available || (acting && self.actions_fail) {
            return Err(ActuationError::Unavailable("browser closed".to_string()));
        }
        Ok(())
    }

    fn document(&self) -> u64 {
        self.location.lock().unwrap().document
    }
}

#[async_trait]
impl BrowserControl for FakeBrowser {
    async fn navigate(&self, address: &str) -> Result<(), ActuationError> {
        self.check(false)?;
        self.calls.lock().unwrap().push(format!("navigate:{}", address));
        self.location.lock().unwrap().commit(address);
        Ok(())
    }

    async fn current_address(&self) -> Result<String, ActuationError> {
        self.check(false)?;
        if self.address_fails {
            return Err(ActuationError::Unavailable("location unreadable".to_string()));
        }
        Ok(self.location.lock().unwrap().address.clone())
    }

    async fn type_into_first_text_field(&self, value: &str) -> Result<bool, ActuationError> {
        self.check(true)?;
        self.calls.lock().unwrap().push(format!("type:{}", value));
        Ok(true)
    }

    async fn click_button_containing(&self, needle: &str) -> Result<bool, ActuationError> {
        self.check(true)?;
        self.calls.lock().unwrap().push(format!("click:{}", needle));
        let needle = needle.to_lowercase();
        let Some(button) = self
            .buttons
            .iter()
            .find(|b| b.to_lowercase().contains(&needle))
        else {
            return Ok(false);
        };
        self.clicked.lock().unwrap().push(button.clone());
        if let Some(next) = self.destinations.get(button).cloned() {
            match self.navigation_delay {
                Some(delay) => {
                    let location = self.location.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        location.lock().unwrap().commit(&next);
                    });
                }
                None => self.location.lock().unwrap().commit(&next),
            }
        }
        Ok(true)
    }

    async fn wait_until_ready(&self, _timeout: Duration) -> Result<bool, ActuationError> {
        self.check(false)?;
        Ok(self.ready_signal)
    }

    async fn page_marker(&self) -> Result<Option<String>, ActuationError> {
        self.check(false)?;
        Ok(Some(format!("document-{}", self.document())))
    }

    async fn wait_for_new_page(
        &self,
        previous: &str,
        timeout: Duration,
    ) -> Result<bool, ActuationError> {
        self.check(false)?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if format!("document-{}", self.document()) != previous {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
