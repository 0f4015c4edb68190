//! Transcript and Turn domain types.
//!
//! The transcript is the model's working memory for one task: an ordered,
//! append-only list of turns. Nothing can remove, reorder, or rewrite a
//! turn once it has been pushed.

use serde::{Deserialize, Serialize};

/// The role of a turn, independent of any backend's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Highest-priority context (policy, identity, knowledge).
    Instruction,
    /// The caller's request.
    User,
    /// A decision the model made.
    Decision,
    /// The result of dispatching a decision's action.
    Observation,
}

/// "This turn proposed action X with arguments Y."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    /// Call identifier, shared with the matching observation (e.g. `step_3`).
    pub id: String,

    /// The action's tool tag.
    pub name: String,

    /// The action serialized as JSON.
    pub arguments: String,
}

/// A single entry in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    Instruction {
        content: String,
    },
    User {
        content: String,
    },
    Decision {
        content: String,
        call: ActionCall,
    },
    Observation {
        call_id: String,
        content: String,
    },
}

impl Turn {
    /// Create an instruction turn.
    pub fn instruction(content: impl Into<String>) -> Self {
        Self::Instruction {
            content: content.into(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a decision turn.
    pub fn decision(content: impl Into<String>, call: ActionCall) -> Self {
        Self::Decision {
            content: content.into(),
            call,
        }
    }

    /// Create an observation turn answering `call_id`.
    pub fn observation(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Observation {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> TurnRole {
        match self {
            Self::Instruction { .. } => TurnRole::Instruction,
            Self::User { .. } => TurnRole::User,
            Self::Decision { .. } => TurnRole::Decision,
            Self::Observation { .. } => TurnRole::Observation,
        }
    }

    /// The text body of the turn.
    pub fn content(&self) -> &str {
        match self {
            Self::Instruction { content }
            | Self::User { content }
            | Self::Decision { content, .. }
            | Self::Observation { content, .. } => content,
        }
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. This is the only mutation a transcript supports.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::instruction("rules"));
        transcript.push(Turn::user("hello"));
        transcript.push(Turn::decision(
            "thinking\n\nNext step: look",
            ActionCall {
                id: "step_1".into(),
                name: "list_projects".into(),
                arguments: "{}".into(),
            },
        ));
        transcript.push(Turn::observation("step_1", "[]"));

        let roles: Vec<TurnRole> = transcript.turns().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            vec![
                TurnRole::Instruction,
                TurnRole::User,
                TurnRole::Decision,
                TurnRole::Observation
            ]
        );
        assert_eq!(transcript.last().unwrap().content(), "[]");
    }

    #[test]
    fn turn_serializes_with_role_tag() {
        let json = serde_json::to_value(Turn::observation("step_2", "ok")).unwrap();
        assert_eq!(json["role"], "observation");
        assert_eq!(json["call_id"], "step_2");
    }
}
