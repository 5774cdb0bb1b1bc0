//! Identifier newtypes for everything a scenario document names.
//!
//! Scenario data addresses stakeholders, phases, decisions, choices and events by
//! string keys. Wrapping each in its own type keeps a decision id from being passed
//! where an event id is expected.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a stakeholder (ministry, community group, donor...).
    StakeholderId
);
string_id!(
    /// Identifier of a phase in the fixed phase sequence.
    PhaseId
);
string_id!(
    /// Identifier of a decision the participants must take.
    DecisionId
);
string_id!(
    /// Identifier of a choice inside a decision or event.
    ChoiceId
);
string_id!(
    /// Identifier of a scripted, curveball or dynamic event.
    EventId
);
