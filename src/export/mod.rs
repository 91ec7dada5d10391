//! History retrieval: paginated walks, thread expansion and rate limiting.

pub mod pager;
pub mod rate_limit;
pub mod threads;

#[cfg(test)]
pub(crate) mod testing;

pub use pager::{CursorAdvance, Pacing, PageWalker, PaginationCursor};
pub use rate_limit::{RateLimitedCaller, RetryPolicy, Sleeper, ThreadSleeper};
pub use threads::ThreadExpander;

use crate::api::ConversationApi;
use crate::error::ExportError;
use crate::message::{sort_chronologically, Message};

/// Full message stream of one conversation: top-level history plus every
/// thread's replies, ascending by timestamp with no repeated timestamps.
pub fn fetch_conversation<A, S>(
    walker: &PageWalker<'_, A, S>,
    channel: &str,
    page_size: u32,
) -> Result<Vec<Message>, ExportError>
where
    A: ConversationApi + ?Sized,
    S: Sleeper,
{
    let mut messages = walker.fetch_all_messages(channel, page_size)?;
    let replies = ThreadExpander::new(walker).expand(channel, &messages, page_size)?;

    messages.extend(replies);
    sort_chronologically(&mut messages)?;
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::{msg, page, reply, thread_root, timestamps, RecordingSleeper, ScriptedApi};
    use super::*;

    #[test]
    fn thread_replies_merge_without_duplicating_the_root() {
        let api = ScriptedApi::default()
            .with_history(page(vec![msg("30.000001"), thread_root("20.000001"), msg("10.000001")], false))
            .with_replies(
                "20.000001",
                page(
                    vec![thread_root("20.000001"), reply("21.000001", "20.000001"), reply("35.000001", "20.000001")],
                    false,
                ),
            );
        let sleeper = RecordingSleeper::default();
        let caller = RateLimitedCaller::new(RetryPolicy::default(), &sleeper);
        let walker = PageWalker::new(
            &api,
            &caller,
            Pacing {
                page_delay: Duration::ZERO,
                thread_delay: Duration::ZERO,
                max_pages: None,
            },
        );

        let messages = fetch_conversation(&walker, "C1", 1000).unwrap();

        assert_eq!(
            timestamps(&messages),
            vec!["10.000001", "20.000001", "21.000001", "30.000001", "35.000001"]
        );
        assert_eq!(messages.iter().filter(|m| m.ts == "20.000001").count(), 1);
    }

    #[test]
    fn broadcast_reply_in_history_is_not_duplicated() {
        let mut broadcast = reply("25.000001", "20.000001");
        broadcast.subtype = Some("thread_broadcast".to_string());

        let api = ScriptedApi::default()
            .with_history(page(vec![broadcast, thread_root("20.000001")], false))
            .with_replies(
                "20.000001",
                page(vec![thread_root("20.000001"), reply("25.000001", "20.000001")], false),
            );
        let sleeper = RecordingSleeper::default();
        let caller = RateLimitedCaller::new(RetryPolicy::default(), &sleeper);
        let walker = PageWalker::new(
            &api,
            &caller,
            Pacing {
                page_delay: Duration::ZERO,
                thread_delay: Duration::ZERO,
                max_pages: None,
            },
        );

        let messages = fetch_conversation(&walker, "C1", 1000).unwrap();
        assert_eq!(timestamps(&messages), vec!["20.000001", "25.000001"]);
    }
}
