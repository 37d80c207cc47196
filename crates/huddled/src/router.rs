//! Message router - decides who receives a line.
//!
//! Routing is split in two: `plan` inspects a membership snapshot and
//! produces a `DeliveryPlan`; the registry actor executes the plan while
//! it still owns that snapshot, so membership cannot change mid-delivery.
//!
//! | Command   | Recipients                                   | Sender closes |
//! |-----------|----------------------------------------------|---------------|
//! | Exit      | every other active session                   | yes           |
//! | Whisper   | the target, if active and not the sender     | no            |
//! | Broadcast | every other active session                   | no            |

use std::collections::HashMap;

use huddle_core::SessionName;
use huddle_protocol::{Command, Message};

/// Deliveries computed for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPlan {
    /// Line written to every recipient (terminator not included)
    pub payload: String,
    /// Sessions that receive `payload`
    pub recipients: Vec<SessionName>,
    /// Remove the sender once the deliveries are queued
    pub close_sender: bool,
}

impl DeliveryPlan {
    /// Returns true if nobody receives the message.
    pub fn is_silent(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Plans delivery of `message` against the active `sessions`.
///
/// The sender never appears among the recipients. A whisper whose target
/// is absent (or is the sender) yields an empty plan.
pub fn plan<V>(sessions: &HashMap<SessionName, V>, message: &Message) -> DeliveryPlan {
    let sender = message.sender();

    let (recipients, close_sender) = match message.command() {
        Command::Exit => (everyone_but(sessions, sender), true),
        Command::Whisper { target } => {
            let recipients = if target != sender && sessions.contains_key(target) {
                vec![target.clone()]
            } else {
                Vec::new()
            };
            (recipients, false)
        }
        Command::Broadcast => (everyone_but(sessions, sender), false),
    };

    DeliveryPlan {
        payload: message.render(),
        recipients,
        close_sender,
    }
}

fn everyone_but<V>(sessions: &HashMap<SessionName, V>, sender: &SessionName) -> Vec<SessionName> {
    sessions
        .keys()
        .filter(|name| *name != sender)
        .cloned()
        .collect()
}
