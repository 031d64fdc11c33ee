//! Run supervisor
//!
//! Drives a scheduler past the outcomes it leaves to its caller: asks the
//! operator for feedback on interrupts and retries transient failures after a
//! delay. With a history path the chat log is saved as entries arrive and
//! resynced whenever a retry or resume rewrites its tail.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::history::HistoryFile;
use crate::chat::{Outcome, Scheduler};
use crate::core::{ConveneError, Result, Route};

/// Operator answer to an interrupt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Stop supervising
    Exit,
    /// Let the interrupted agent reply on its own
    Auto,
    /// Speak as the interrupted agent
    Reply(String),
}

impl Feedback {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "" => Feedback::Auto,
            "exit" => Feedback::Exit,
            text => Feedback::Reply(text.to_string()),
        }
    }
}

/// Where operator feedback comes from
#[async_trait]
pub trait FeedbackSource: Send {
    async fn ask(&mut self, route: &Route) -> Result<Feedback>;
}

/// Reads feedback from standard input
#[derive(Debug, Default)]
pub struct StdinFeedback;

#[async_trait]
impl FeedbackSource for StdinFeedback {
    async fn ask(&mut self, route: &Route) -> Result<Feedback> {
        let prompt = format!(
            "\n💬 Reply to {} as {} (empty for an automatic reply, \"exit\" to stop): ",
            route.to, route.from
        );

        // Stdin reads block, so keep them off the runtime's workers
        let line = tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
            print!("{}", prompt);
            io::stdout().flush()?;

            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            Ok(Some(line))
        })
        .await
        .map_err(|e| ConveneError::Other(format!("Feedback reader failed: {}", e)))??;

        Ok(line.map_or(Feedback::Exit, |line| Feedback::parse(&line)))
    }
}

pub struct Supervisor<F> {
    scheduler: Scheduler,
    feedback: F,
    retry_delay: Duration,
    history: Option<Arc<HistoryFile>>,
}

impl<F: FeedbackSource> Supervisor<F> {
    pub fn new(scheduler: Scheduler, feedback: F) -> Self {
        Self {
            scheduler,
            feedback,
            retry_delay: Duration::from_secs(60),
            history: None,
        }
    }

    /// Wait before retrying a transient failure
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Keep the chat log saved at `path` for the rest of the run
    pub fn with_history(mut self, path: impl Into<PathBuf>) -> Self {
        let history = Arc::new(HistoryFile::new(path).with_entries(self.scheduler.log().entries()));
        self.scheduler.events.subscribe(history.clone());
        self.history = Some(history);
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Start a conversation and supervise it to the end
    pub async fn start(&mut self, route: Route, content: &str) -> Result<Outcome> {
        let outcome = self.scheduler.start(route, content).await?;
        self.run(outcome).await
    }

    /// Supervise from `outcome` until the conversation ends, fails for good
    /// or the operator exits
    pub async fn run(&mut self, mut outcome: Outcome) -> Result<Outcome> {
        loop {
            self.save_history()?;
            outcome = match outcome {
                Outcome::Interrupted { route } => match self.feedback.ask(&route).await? {
                    Feedback::Exit => return Ok(Outcome::Interrupted { route }),
                    Feedback::Auto => self.scheduler.resume(None).await?,
                    Feedback::Reply(text) => self.scheduler.resume(Some(text.as_str())).await?,
                },
                Outcome::Failed {
                    route,
                    retryable: true,
                } => {
                    info!(route = %route, delay = ?self.retry_delay, "retrying after delay");
                    tokio::time::sleep(self.retry_delay).await;
                    self.scheduler.retry().await?
                }
                other => return Ok(other),
            };
        }
    }

    fn save_history(&self) -> Result<()> {
        match &self.history {
            Some(history) => history.sync(self.scheduler.log()),
            None => Ok(()),
        }
    }
}
