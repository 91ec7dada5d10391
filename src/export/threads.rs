//! Thread reply expansion.

use tracing::debug;

use super::pager::{Endpoint, PageWalker};
use super::rate_limit::Sleeper;
use crate::api::ConversationApi;
use crate::error::ExportError;
use crate::message::{sort_chronologically, Message};

/// Fetches the replies of every thread opened in a conversation
pub struct ThreadExpander<'w, 'a, A: ?Sized, S> {
    walker: &'w PageWalker<'a, A, S>,
}

impl<'w, 'a, A, S> ThreadExpander<'w, 'a, A, S>
where
    A: ConversationApi + ?Sized,
    S: Sleeper,
{
    pub fn new(walker: &'w PageWalker<'a, A, S>) -> Self {
        Self { walker }
    }

    /// Replies to the thread rooted at `root_ts`, ascending, root excluded.
    ///
    /// The replies endpoint always returns the root as the oldest message; if
    /// it does not, the thread is not what we asked for and the export stops.
    pub fn fetch_thread_replies(
        &self,
        channel: &str,
        root_ts: &str,
        page_size: u32,
    ) -> Result<Vec<Message>, ExportError> {
        let mut messages = self
            .walker
            .walk(channel, Endpoint::Replies { root: root_ts }, page_size)?;
        sort_chronologically(&mut messages)?;

        let root_matches = match messages.first() {
            Some(first) => first.ts == root_ts,
            None => false,
        };
        if !root_matches {
            return Err(ExportError::ThreadRootMismatch {
                root: root_ts.to_string(),
                found: messages.first().map(|m| m.ts.clone()),
            });
        }

        messages.remove(0);
        Ok(messages)
    }

    /// Replies for every thread root in `primary`, in root order
    pub fn expand(
        &self,
        channel: &str,
        primary: &[Message],
        page_size: u32,
    ) -> Result<Vec<Message>, ExportError> {
        let mut replies = Vec::new();
        let mut threads = 0usize;

        for root in primary.iter().filter(|m| m.is_thread_root()) {
            self.walker.caller().pause(self.walker.pacing().thread_delay);
            let thread = self.fetch_thread_replies(channel, &root.ts, page_size)?;
            debug!(channel, root = %root.ts, replies = thread.len(), "expanded thread");
            replies.extend(thread);
            threads += 1;
        }

        if threads > 0 {
            debug!(channel, threads, replies = replies.len(), "thread expansion complete");
        }

        Ok(replies)
    }
}
