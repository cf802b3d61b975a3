//! Persona definitions.
//!
//! A persona is everything an agent is told about itself. It is fixed when the
//! agent is built and never changes during a run.

use serde::{Deserialize, Serialize};

/// Instruction appended to every bidding prompt so [`crate::bidding::BidParser`]
/// can find the number.
pub const BID_FORMAT_INSTRUCTIONS: &str =
    "Your response should be an integer delimited by angled brackets, like this: <int>.";

/// The identity and instructions of one participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    /// Display name, unique within a run.
    pub name: String,
    /// What the participant is (host, candidate, researcher).
    pub role: Option<String>,
    /// Where the participant is located, for scenarios that use it.
    pub location: Option<String>,
    /// Short character description.
    pub description: String,
    /// Context block shared by the system message and the bidding template.
    pub header: String,
    /// System instruction sent with every generation.
    pub system_message: String,
}

impl Persona {
    /// Create a persona with only a system message.
    pub fn new(name: impl Into<String>, system_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            location: None,
            description: String::new(),
            header: String::new(),
            system_message: system_message.into(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// The line an agent's prompt ends with, cueing it to speak.
    pub fn speaking_cue(&self) -> String {
        format!("{}: ", self.name)
    }

    /// Name plus role, e.g. "Ada (Host)".
    pub fn display_name_with_role(&self) -> String {
        match &self.role {
            Some(role) => format!("{} ({})", self.name, role),
            None => self.name.clone(),
        }
    }
}

/// Prompt used to ask an agent how urgently it wants the next turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BiddingTemplate {
    pub header: String,
    pub format_instructions: String,
}

impl BiddingTemplate {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            format_instructions: BID_FORMAT_INSTRUCTIONS.to_string(),
        }
    }

    /// Substitute the conversation into the template.
    pub fn render(&self, message_history: &str, recent_message: &str) -> String {
        format!(
            "{header}\n\n```\n{history}\n```\n\n\
             On a scale of 1 to 10, where 1 means the message does not contradict your views \
             at all and 10 means it contradicts them completely, rate the following message.\n\n\
             ```\n{recent}\n```\n\n{instructions}\nDo nothing else.",
            header = self.header,
            history = message_history,
            recent = recent_message,
            instructions = self.format_instructions,
        )
    }
}
