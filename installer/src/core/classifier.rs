//! Incremental classification of a streamed model message.
//!
//! The classifier buffers text until it can commit, exactly once, to a
//! [`MessageKind`]. Until then nothing reaches the caller, so a sentinel that is
//! split across chunks is never shown half-written. Every decision is made
//! against the whole accumulated text.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::fence::fenced_blocks;
use crate::core::marker::{COMMENT_OPEN, Marker, find_marker, sentinels, strip_sentinels};
use crate::core::mode::SessionMode;
use crate::core::scanner::find_value_start;

/// Characters buffered before an undecided message falls back to prose.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 500;

/// Terminal classification of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Conversational,
    SingleAction,
    FileEmission,
    StructuredInstallation,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Conversational => "conversational",
            MessageKind::SingleAction => "single_action",
            MessageKind::FileEmission => "file_emission",
            MessageKind::StructuredInstallation => "structured_installation",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output produced while feeding chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Emitted once, when the message kind is decided.
    Committed(MessageKind),
    /// Text that may be shown to the user.
    Text(String),
    /// A new destination path appeared in a file-emission message (1-based).
    FileDetected { index: usize, path: String },
}

/// Final state of a classified message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedMessage {
    pub kind: MessageKind,
    /// Full accumulated text, sentinels included.
    pub text: String,
    /// Everything that was surfaced to the user.
    pub surfaced: String,
    /// Distinct file paths detected, in order.
    pub files: Vec<String>,
}

/// Per-message classification state machine.
#[derive(Debug, Clone)]
pub struct StreamClassifier {
    mode: SessionMode,
    threshold: usize,
    buffer: String,
    kind: Option<MessageKind>,
    surfaced: String,
    spans_emitted: usize,
    files: Vec<String>,
}

impl StreamClassifier {
    pub fn new(mode: SessionMode, threshold: usize) -> Self {
        Self {
            mode,
            threshold,
            buffer: String::new(),
            kind: None,
            surfaced: String::new(),
            spans_emitted: 0,
            files: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Feed one chunk and return whatever became visible because of it.
    pub fn push(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        match self.kind {
            None => {
                if let Some(kind) = self.classify() {
                    self.commit(kind, &mut events);
                }
            }
            Some(MessageKind::Conversational) => {
                if !chunk.is_empty() {
                    self.surface(chunk.to_string(), &mut events);
                }
            }
            Some(MessageKind::FileEmission) => self.detect_files(&mut events),
            Some(MessageKind::StructuredInstallation) => self.surface_sections(&mut events),
            Some(MessageKind::SingleAction) => {}
        }
        events
    }

    /// Close the message. An undecided message becomes prose and is flushed
    /// with any recognized sentinels removed.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.kind.is_none() {
            debug!(buffered = self.buffer.len(), "end of message while unclassified");
            self.kind = Some(MessageKind::Conversational);
            events.push(StreamEvent::Committed(MessageKind::Conversational));
            let flushed = strip_sentinels(&self.buffer);
            if !flushed.is_empty() {
                self.surface(flushed, &mut events);
            }
        }
        events
    }

    pub fn into_message(self) -> ClassifiedMessage {
        ClassifiedMessage {
            kind: self.kind.unwrap_or(MessageKind::Conversational),
            text: self.buffer,
            surfaced: self.surfaced,
            files: self.files,
        }
    }

    /// Apply the transition rules in priority order.
    fn classify(&self) -> Option<MessageKind> {
        if self.mode.prose_only() {
            return Some(MessageKind::Conversational);
        }
        let text = self.buffer.as_str();

        if self.mode.detects(MessageKind::FileEmission)
            && fenced_blocks(text).iter().any(|block| block.path().is_some())
        {
            return Some(MessageKind::FileEmission);
        }
        if self.mode.detects(MessageKind::StructuredInstallation)
            && sentinels(text).any(|s| s.marker().is_some_and(Marker::starts_section))
        {
            return Some(MessageKind::StructuredInstallation);
        }
        if self.mode.detects(MessageKind::SingleAction) && action_has_payload(text) {
            return Some(MessageKind::SingleAction);
        }

        match pending_prefix(text) {
            Some(pos) if text[pos..].chars().count() > self.threshold => {
                Some(MessageKind::Conversational)
            }
            Some(_) => None,
            None if text.chars().count() > self.threshold => Some(MessageKind::Conversational),
            None => None,
        }
    }

    fn commit(&mut self, kind: MessageKind, events: &mut Vec<StreamEvent>) {
        debug!(?kind, buffered = self.buffer.len(), "classified message");
        self.kind = Some(kind);
        events.push(StreamEvent::Committed(kind));
        match kind {
            MessageKind::Conversational => {
                let flushed = strip_sentinels(&self.buffer);
                if !flushed.is_empty() {
                    self.surface(flushed, events);
                }
            }
            MessageKind::SingleAction => {
                let prose = action_preamble(&self.buffer);
                if !prose.is_empty() {
                    self.surface(prose, events);
                }
            }
            MessageKind::FileEmission => self.detect_files(events),
            MessageKind::StructuredInstallation => self.surface_sections(events),
        }
    }

    fn surface(&mut self, text: String, events: &mut Vec<StreamEvent>) {
        self.surfaced.push_str(&text);
        events.push(StreamEvent::Text(text));
    }

    fn surface_sections(&mut self, events: &mut Vec<StreamEvent>) {
        let spans = section_spans(&self.buffer);
        for span in spans.into_iter().skip(self.spans_emitted) {
            self.spans_emitted += 1;
            if span.is_empty() {
                continue;
            }
            let text = if self.surfaced.is_empty() {
                span
            } else {
                format!("\n\n{span}")
            };
            self.surface(text, events);
        }
    }

    fn detect_files(&mut self, events: &mut Vec<StreamEvent>) {
        let paths: Vec<String> = fenced_blocks(&self.buffer)
            .iter()
            .filter_map(|block| block.path())
            .map(str::to_string)
            .collect();
        for path in paths {
            if self.files.contains(&path) {
                continue;
            }
            self.files.push(path.clone());
            debug!(index = self.files.len(), path = %path, "file detected");
            events.push(StreamEvent::FileDetected {
                index: self.files.len(),
                path,
            });
        }
    }
}

/// An action sentinel followed by the start of a JSON value.
fn action_has_payload(text: &str) -> bool {
    find_marker(text, Marker::Action, 0)
        .is_some_and(|sentinel| find_value_start(text, sentinel.end).is_some())
}

fn action_preamble(text: &str) -> String {
    let end = find_marker(text, Marker::Action, 0).map_or(text.len(), |s| s.start);
    strip_sentinels(&text[..end]).trim().to_string()
}

/// Position of a comment-like prefix that has not resolved into a decision:
/// the first `<!--`, or a partial `<!--` at the very end of the buffer.
fn pending_prefix(text: &str) -> Option<usize> {
    if let Some(pos) = text.find(COMMENT_OPEN) {
        return Some(pos);
    }
    (1..COMMENT_OPEN.len())
        .rev()
        .find(|&len| text.ends_with(&COMMENT_OPEN[..len]))
        .map(|len| text.len() - len)
}

/// Complete section-start/section-end spans, cleaned for display.
fn section_spans(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for sentinel in sentinels(text) {
        match (sentinel.marker(), open) {
            (Some(Marker::SectionStart), None) => open = Some(sentinel.end),
            (Some(Marker::SectionEnd), Some(start)) => {
                spans.push(strip_sentinels(&text[start..sentinel.start]).trim().to_string());
                open = None;
            }
            _ => {}
        }
    }
    spans
}
