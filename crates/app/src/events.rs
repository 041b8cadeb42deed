use std::{collections::HashSet, time::Duration};

use axum::response::sse::{Event, KeepAlive};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViewEventKind {
    #[serde(rename = "candidates.replaced")]
    CandidatesReplaced,
    #[serde(rename = "candidates.patched")]
    CandidatesPatched,
    #[serde(rename = "selection.changed")]
    SelectionChanged,
    #[serde(rename = "refresh.failed")]
    RefreshFailed,
}

impl ViewEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CandidatesReplaced => "candidates.replaced",
            Self::CandidatesPatched => "candidates.patched",
            Self::SelectionChanged => "selection.changed",
            Self::RefreshFailed => "refresh.failed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "candidates.replaced" => Some(Self::CandidatesReplaced),
            "candidates.patched" => Some(Self::CandidatesPatched),
            "selection.changed" => Some(Self::SelectionChanged),
            "refresh.failed" => Some(Self::RefreshFailed),
            _ => None,
        }
    }
}

/// Notification that the locally held view changed.
#[derive(Debug, Clone, Serialize)]
pub struct ViewEvent {
    pub ts: DateTime<Utc>,
    pub kind: ViewEventKind,
    pub seq: u64,
    pub detail: Value,
}

impl ViewEvent {
    pub fn into_sse_event(self) -> Result<Event, serde_json::Error> {
        let data = serde_json::to_string(&self)?;
        Ok(Event::default()
            .event(self.kind.as_str())
            .id(self.seq.to_string())
            .data(data))
    }
}

#[derive(Clone)]
pub struct ViewHub {
    sender: broadcast::Sender<ViewEvent>,
}

impl ViewHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(128);
        Self { sender }
    }

    pub fn publish(&self, event: ViewEvent) {
        // Nobody rendering is the normal headless state.
        if self.sender.receiver_count() == 0 {
            return;
        }
        if let Err(err) = self.sender.send(event) {
            debug!(stage = "sync", error = %err, "view event dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.sender.subscribe()
    }
}

impl Default for ViewHub {
    fn default() -> Self {
        Self::new()
    }
}

pub fn view_stream(
    hub: &ViewHub,
    kinds: Option<HashSet<ViewEventKind>>,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    BroadcastStream::new(hub.subscribe()).filter_map(move |result| match result {
        Ok(event) if kinds.as_ref().map_or(true, |k| k.contains(&event.kind)) => {
            Some(event.into_sse_event())
        }
        Ok(_) => None,
        Err(_) => None,
    })
}

pub fn view_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(20))
        .text("heartbeat")
}

pub fn parse_kind_list(value: Option<String>) -> Result<Option<HashSet<ViewEventKind>>, String> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let mut set = HashSet::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind =
            ViewEventKind::parse(&item.to_lowercase()).ok_or_else(|| format!("unknown event kind '{item}'"))?;
        set.insert(kind);
    }

    if set.is_empty() {
        Ok(None)
    } else {
        Ok(Some(set))
    }
}
