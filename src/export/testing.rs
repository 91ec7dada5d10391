//! Scripted API fakes shared by the export tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::rate_limit::Sleeper;
use crate::api::{ConversationApi, HistoryPage};
use crate::error::ApiError;
use crate::message::Message;

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

/// A request the fake received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    History {
        latest: Option<String>,
    },
    Replies {
        ts: String,
        latest: Option<String>,
    },
}

type Script = VecDeque<Result<HistoryPage, ApiError>>;

/// Serves pre-arranged pages in order; panics when a script runs dry
#[derive(Default)]
pub struct ScriptedApi {
    history: RefCell<Script>,
    replies: RefCell<HashMap<String, Script>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedApi {
    pub fn with_history(mut self, page: Result<HistoryPage, ApiError>) -> Self {
        self.history.get_mut().push_back(page);
        self
    }

    pub fn with_replies(mut self, root: &str, page: Result<HistoryPage, ApiError>) -> Self {
        self.replies
            .get_mut()
            .entry(root.to_string())
            .or_default()
            .push_back(page);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl ConversationApi for ScriptedApi {
    fn history(&self, _channel: &str, latest: Option<&str>, _limit: u32) -> Result<HistoryPage, ApiError> {
        self.calls.borrow_mut().push(Call::History {
            latest: latest.map(str::to_string),
        });
        self.history
            .borrow_mut()
            .pop_front()
            .expect("history script exhausted")
    }

    fn replies(
        &self,
        _channel: &str,
        ts: &str,
        latest: Option<&str>,
        _limit: u32,
    ) -> Result<HistoryPage, ApiError> {
        self.calls.borrow_mut().push(Call::Replies {
            ts: ts.to_string(),
            latest: latest.map(str::to_string),
        });
        self.replies
            .borrow_mut()
            .get_mut(ts)
            .and_then(VecDeque::pop_front)
            .expect("replies script exhausted")
    }
}

pub fn msg(ts: &str) -> Message {
    Message::new(ts)
}

pub fn thread_root(ts: &str) -> Message {
    let mut message = Message::new(ts);
    message.thread_ts = Some(ts.to_string());
    message
}

pub fn reply(ts: &str, root: &str) -> Message {
    let mut message = Message::new(ts);
    message.thread_ts = Some(root.to_string());
    message
}

pub fn page(messages: Vec<Message>, has_more: bool) -> Result<HistoryPage, ApiError> {
    Ok(HistoryPage { messages, has_more })
}

pub fn timestamps(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.ts.as_str()).collect()
}
