//! Hand-off of content captured from a page into the memo editor.
//!
//! # Responsibility
//! - Model captured text/image/link payloads as one tagged type.
//! - Deliver the latest capture to a single consumer within a freshness
//!   window.
//!
//! # Invariants
//! - Only the most recent capture is ever delivered.
//! - A capture is delivered at most once; stale captures are discarded.
//! - After `take_fresh` returns, no earlier capture remains queued.

use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

/// Default window in which a capture may still be dropped into a memo.
pub const DEFAULT_CAPTURE_FRESHNESS_MS: i64 = 5_000;

/// Alt text used when an image capture carries none.
const DEFAULT_IMAGE_ALT: &str = "image";

/// Payload variants a page can hand to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CaptureKind {
    /// Selected text.
    Text { content: String },
    /// Image source address with its alt text.
    Image {
        content: String,
        #[serde(default)]
        alt: String,
    },
    /// Link target with its anchor text.
    Link {
        content: String,
        #[serde(default)]
        text: String,
    },
}

/// One captured payload plus its page provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedContent {
    #[serde(flatten)]
    pub kind: CaptureKind,
    pub source_url: String,
    pub source_title: String,
    /// Epoch ms at which the capture happened.
    pub timestamp: i64,
}

impl CapturedContent {
    /// Renders the capture as markup ready to append to a memo body.
    pub fn to_markup(&self) -> String {
        match &self.kind {
            CaptureKind::Text { content } => content.clone(),
            CaptureKind::Image { content, alt } => {
                let alt = if alt.is_empty() {
                    DEFAULT_IMAGE_ALT
                } else {
                    alt.as_str()
                };
                format!("![{alt}]({content})")
            }
            CaptureKind::Link { content, text } => {
                let text = if text.is_empty() {
                    content.as_str()
                } else {
                    text.as_str()
                };
                format!("[{text}]({content})")
            }
        }
    }

    /// Returns whether this capture is still usable at `now`.
    ///
    /// `timestamp` is host-supplied and may be arbitrary.
    pub fn is_fresh(&self, now: i64, freshness_ms: i64) -> bool {
        self.age_ms(now) < freshness_ms
    }

    fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }
}

/// Creates a connected capture producer/consumer pair.
pub fn capture_channel(freshness_ms: i64) -> (CaptureSender, CaptureReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        CaptureSender { tx },
        CaptureReceiver { rx, freshness_ms },
    )
}

/// Producer side, held by page-capture collaborators. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CaptureSender {
    tx: Sender<CapturedContent>,
}

impl CaptureSender {
    /// Offers a capture. Returns `false` when the editor side is gone.
    pub fn offer(&self, content: CapturedContent) -> bool {
        match self.tx.send(content) {
            Ok(()) => true,
            Err(_) => {
                debug!("event=capture_offer module=capture status=skipped reason=receiver_closed");
                false
            }
        }
    }
}

/// Consumer side, owned by the editor.
#[derive(Debug)]
pub struct CaptureReceiver {
    rx: Receiver<CapturedContent>,
    freshness_ms: i64,
}

impl CaptureReceiver {
    /// Drains the channel and returns the latest capture if it is fresh at `now`.
    pub fn take_fresh(&self, now: i64) -> Option<CapturedContent> {
        let latest = self.rx.try_iter().last()?;
        if latest.is_fresh(now, self.freshness_ms) {
            Some(latest)
        } else {
            debug!(
                "event=capture_take module=capture status=skipped reason=stale age_ms={}",
                latest.age_ms(now)
            );
            None
        }
    }

    pub fn freshness_ms(&self) -> i64 {
        self.freshness_ms
    }
}

/// Appends `insert` to `existing`, separating with a newline when needed.
pub fn append_content(existing: &str, insert: &str) -> String {
    if insert.is_empty() {
        return existing.to_string();
    }
    let separator = if !existing.is_empty() && !existing.ends_with('\n') {
        "\n"
    } else {
        ""
    };
    format!("{existing}{separator}{insert}")
}
