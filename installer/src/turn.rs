//! One model turn: stream in, classified message and typed payload out.

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::core::action::{Action, parse_actions};
use crate::core::classifier::{MessageKind, StreamClassifier, StreamEvent};
use crate::core::files::{FileBlock, extract_file_blocks};
use crate::core::marker::{Marker, extract_marker};
use crate::core::mode::SessionMode;
use crate::core::types::{ContentRecord, SchemaDefinition};
use crate::io::config::ClassifierConfig;

/// What the generation endpoint yields for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    Chunk(String),
    /// End of turn with the final accumulated text.
    End { text: String, turn_id: String },
}

/// A finished turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTurn {
    /// Empty when the stream ended without an end-of-turn event.
    pub turn_id: String,
    pub kind: MessageKind,
    pub text: String,
    pub surfaced: String,
    pub files: Vec<String>,
}

/// Typed payload recovered from a finished turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPayload {
    Installation {
        schemas: Vec<SchemaDefinition>,
        records: Vec<ContentRecord>,
    },
    Actions(Vec<Action>),
    Files(Vec<FileBlock>),
    Prose,
}

/// Feed a generation stream through the classifier.
///
/// `on_event` sees every stream event as soon as the chunk that produced it is
/// classified.
#[instrument(skip_all, fields(mode = %mode))]
pub async fn drive_turn<S>(
    stream: S,
    mode: SessionMode,
    config: &ClassifierConfig,
    on_event: &mut dyn FnMut(&StreamEvent),
) -> CompletedTurn
where
    S: Stream<Item = GenerationEvent>,
{
    let mut stream = std::pin::pin!(stream);
    let mut classifier = StreamClassifier::new(mode, config.buffer_threshold_chars);
    let mut end = None;

    while let Some(event) = stream.next().await {
        match event {
            GenerationEvent::Chunk(chunk) => {
                for event in classifier.push(&chunk) {
                    on_event(&event);
                }
            }
            GenerationEvent::End { text, turn_id } => {
                end = Some((text, turn_id));
                break;
            }
        }
    }

    // The final text may carry a tail the chunks never delivered.
    if let Some((text, _)) = &end
        && let Some(rest) = text.strip_prefix(classifier.text())
        && !rest.is_empty()
    {
        for event in classifier.push(rest) {
            on_event(&event);
        }
    }
    for event in classifier.finish() {
        on_event(&event);
    }

    let message = classifier.into_message();
    let (text, turn_id) = match end {
        Some((text, turn_id)) if !text.is_empty() => (text, turn_id),
        Some((_, turn_id)) => (message.text, turn_id),
        None => {
            debug!("stream ended without end-of-turn");
            (message.text, String::new())
        }
    };
    CompletedTurn {
        turn_id,
        kind: message.kind,
        text,
        surfaced: message.surfaced,
        files: message.files,
    }
}

impl CompletedTurn {
    /// Extract the payload matching the turn's kind.
    ///
    /// A finished turn whose payload cannot be recovered is prose.
    pub fn payload(&self) -> TurnPayload {
        match self.kind {
            MessageKind::Conversational => TurnPayload::Prose,
            MessageKind::StructuredInstallation => {
                let schemas: Vec<SchemaDefinition> =
                    parse_items(extract_marker(&self.text, Marker::Schemas), "schema");
                let records: Vec<ContentRecord> =
                    parse_items(extract_marker(&self.text, Marker::Records), "record");
                if schemas.is_empty() && records.is_empty() {
                    TurnPayload::Prose
                } else {
                    TurnPayload::Installation { schemas, records }
                }
            }
            MessageKind::SingleAction => {
                let actions = extract_marker(&self.text, Marker::Action)
                    .map(parse_actions)
                    .unwrap_or_default();
                if actions.is_empty() {
                    TurnPayload::Prose
                } else {
                    TurnPayload::Actions(actions)
                }
            }
            MessageKind::FileEmission => {
                let blocks = extract_file_blocks(&self.text);
                if blocks.is_empty() {
                    TurnPayload::Prose
                } else {
                    TurnPayload::Files(blocks)
                }
            }
        }
    }
}

/// Deserialize each array item on its own, skipping the malformed ones.
fn parse_items<T: DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(kind = what, index = idx, error = %err, "skipping malformed item");
                None
            }
        })
        .collect()
}

/// Split `text` into chunks of at most `chunk_size` characters.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Replay a saved transcript as a generation stream.
pub fn replay(text: &str, chunk_size: usize) -> impl Stream<Item = GenerationEvent> + use<> {
    let mut events: Vec<GenerationEvent> = chunk_text(text, chunk_size)
        .into_iter()
        .map(GenerationEvent::Chunk)
        .collect();
    events.push(GenerationEvent::End {
        text: text.to_string(),
        turn_id: Uuid::new_v4().to_string(),
    });
    stream::iter(events)
}
