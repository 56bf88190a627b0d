//! Session mode passed explicitly into classification entry points.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::classifier::MessageKind;

/// What the surrounding chat session is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Questions only; every message is prose.
    Ask,
    /// Site building: files, installations, and actions.
    #[default]
    Build,
    /// Content editing: installations and actions.
    Content,
    /// Repository edits: file emission only.
    Repo,
}

impl SessionMode {
    /// Whether messages of `kind` may be committed in this mode.
    pub fn detects(self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Conversational => true,
            MessageKind::FileEmission => matches!(self, SessionMode::Build | SessionMode::Repo),
            MessageKind::StructuredInstallation | MessageKind::SingleAction => {
                matches!(self, SessionMode::Build | SessionMode::Content)
            }
        }
    }

    /// True when nothing but prose can ever be committed.
    pub fn prose_only(self) -> bool {
        self == SessionMode::Ask
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Ask => "ask",
            SessionMode::Build => "build",
            SessionMode::Content => "content",
            SessionMode::Repo => "repo",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(SessionMode::Ask),
            "build" => Ok(SessionMode::Build),
            "content" => Ok(SessionMode::Content),
            "repo" => Ok(SessionMode::Repo),
            other => Err(format!(
                "unknown session mode '{other}' (expected ask, build, content, repo)"
            )),
        }
    }
}
