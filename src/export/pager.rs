//! Walks the paginated history and replies endpoints of one conversation.
//!
//! Pages arrive newest first. After each page the `latest` bound moves to the
//! timestamp of the last accumulated message, so the next request asks for
//! strictly older messages. If the bound fails to move, the walk falls back
//! to the oldest timestamp seen so far.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::rate_limit::{RateLimitedCaller, Sleeper};
use crate::api::{ConversationApi, HistoryPage};
use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::message::{sort_chronologically, Message, SlackTimestamp};

/// Delays and limits applied while walking pages
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Pause between pages of one walk
    pub page_delay: Duration,
    /// Pause before each thread walk
    pub thread_delay: Duration,
    /// Abort a walk after this many pages
    pub max_pages: Option<u32>,
}

impl Pacing {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            page_delay: config.page_delay(),
            thread_delay: config.thread_delay(),
            max_pages: config.max_pages,
        }
    }
}

/// Which endpoint a walk pages through
#[derive(Debug, Clone, Copy)]
pub(crate) enum Endpoint<'r> {
    History,
    Replies { root: &'r str },
}

impl Endpoint<'_> {
    fn label(&self, channel: &str) -> String {
        match self {
            Endpoint::History => format!("conversations.history {channel}"),
            Endpoint::Replies { root } => format!("conversations.replies {channel}/{root}"),
        }
    }
}

/// Result of moving the cursor after a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAdvance {
    /// Bound moved to the last accumulated message
    Advanced,
    /// Bound stalled and was reset to the oldest accumulated message
    Recovered,
    /// Bound stalled and the oldest message is the stalled one
    Stuck,
}

/// `latest` bound for the next request, plus the bound used for the current one
#[derive(Debug, Clone, Default)]
pub struct PaginationCursor {
    latest: Option<String>,
    previous: Option<String>,
}

impl PaginationCursor {
    /// Bound for the next request; None means "most recent"
    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Move the bound to `candidate`, or to the oldest of `accumulated` when
    /// `candidate` repeats the bound just used.
    pub fn advance(
        &mut self,
        candidate: &str,
        accumulated: &[Message],
    ) -> Result<CursorAdvance, ExportError> {
        self.previous = self.latest.take();

        if self.previous.as_deref() != Some(candidate) {
            self.latest = Some(candidate.to_string());
            return Ok(CursorAdvance::Advanced);
        }

        let stalled = SlackTimestamp::parse(candidate)?;
        let mut oldest: Option<(SlackTimestamp, &str)> = None;
        for message in accumulated {
            let ts = message.timestamp()?;
            if oldest.is_none_or(|(min, _)| ts < min) {
                oldest = Some((ts, message.ts.as_str()));
            }
        }

        let (oldest_ts, oldest_raw) = oldest.unwrap_or((stalled, candidate));
        self.latest = Some(oldest_raw.to_string());

        Ok(if oldest_ts == stalled {
            CursorAdvance::Stuck
        } else {
            CursorAdvance::Recovered
        })
    }
}

/// Fetches complete message histories, one conversation at a time
pub struct PageWalker<'a, A: ?Sized, S> {
    api: &'a A,
    caller: &'a RateLimitedCaller<S>,
    pacing: Pacing,
}

impl<'a, A, S> PageWalker<'a, A, S>
where
    A: ConversationApi + ?Sized,
    S: Sleeper,
{
    pub fn new(api: &'a A, caller: &'a RateLimitedCaller<S>, pacing: Pacing) -> Self {
        Self { api, caller, pacing }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    pub(crate) fn caller(&self) -> &RateLimitedCaller<S> {
        self.caller
    }

    /// Every top-level message of `channel`, ascending by timestamp
    pub fn fetch_all_messages(&self, channel: &str, page_size: u32) -> Result<Vec<Message>, ExportError> {
        let mut messages = self.walk(channel, Endpoint::History, page_size)?;
        sort_chronologically(&mut messages)?;
        Ok(messages)
    }

    /// Page through `endpoint` until the server reports no more pages.
    /// Returns messages in arrival order.
    pub(crate) fn walk(
        &self,
        channel: &str,
        endpoint: Endpoint<'_>,
        page_size: u32,
    ) -> Result<Vec<Message>, ExportError> {
        let label = endpoint.label(channel);
        let mut cursor = PaginationCursor::default();
        let mut accumulated: Vec<Message> = Vec::new();
        let mut pages: u32 = 0;

        loop {
            if let Some(limit) = self.pacing.max_pages {
                if pages >= limit {
                    return Err(ExportError::PaginationLimit { call: label, limit });
                }
            }

            let page: HistoryPage = self.caller.call(&label, || match endpoint {
                Endpoint::History => self.api.history(channel, cursor.latest(), page_size),
                Endpoint::Replies { root } => {
                    self.api.replies(channel, root, cursor.latest(), page_size)
                }
            })?;
            pages += 1;

            debug!(
                call = %label,
                page = pages,
                received = page.messages.len(),
                has_more = page.has_more,
                "fetched page"
            );
            accumulated.extend(page.messages);

            if !page.has_more {
                break;
            }

            let Some(last) = accumulated.last() else {
                warn!(call = %label, "server reported more pages but returned no messages");
                break;
            };
            let candidate = last.ts.clone();

            self.caller.pause(self.pacing.page_delay);

            match cursor.advance(&candidate, &accumulated)? {
                CursorAdvance::Advanced => {}
                CursorAdvance::Recovered => info!(
                    call = %label,
                    stalled = %candidate,
                    latest = cursor.latest().unwrap_or_default(),
                    "cursor stalled; restarting from oldest message seen"
                ),
                CursorAdvance::Stuck => warn!(
                    call = %label,
                    latest = %candidate,
                    "cursor is not changing; possible infinite loop"
                ),
            }
        }

        if pages > 1 {
            info!(call = %label, pages, messages = accumulated.len(), "walk complete");
        }

        Ok(accumulated)
    }
}
