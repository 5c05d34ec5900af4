//! Control text-frame schema (C9): inbound commands/actions from the
//! client and the outbound status/initial/restart envelopes.

use serde::{Deserialize, Serialize};

use crate::rocket::{Action, RocketStateExport};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Pause,
    Start,
    Restart,
    ToggleAgent,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActionPayload {
    pub throttle: f64,
    #[serde(rename = "coldGas")]
    pub cold_gas: f64,
}

impl From<ActionPayload> for Action {
    fn from(p: ActionPayload) -> Self {
        Action::new(p.throttle, p.cold_gas)
    }
}

/// Inbound messages are mutually exclusive shapes on the wire; an unknown
/// or malformed payload fails to deserialize into any variant and is
/// dropped by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Command {
        command: CommandKind,
    },
    Speed {
        speed: f64,
    },
    Action {
        action: ActionPayload,
        rocket_index: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusFrame {
    pub status: &'static str,
    pub agent_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitialStep {
    pub state: Vec<RocketStateExport>,
    pub reward: Option<f64>,
    pub done: Vec<bool>,
    pub prev_action_taken: Option<Action>,
}

impl InitialStep {
    pub fn fresh(states: Vec<RocketStateExport>) -> Self {
        let done = vec![false; states.len()];
        Self {
            state: states,
            reward: None,
            done,
            prev_action_taken: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitialFrame {
    pub step: InitialStep,
    pub initial: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartFrame {
    pub step: InitialStep,
    pub restart: bool,
}

impl InitialFrame {
    pub fn new(states: Vec<RocketStateExport>) -> Self {
        Self {
            step: InitialStep::fresh(states),
            initial: true,
        }
    }
}

impl RestartFrame {
    pub fn new(states: Vec<RocketStateExport>) -> Self {
        Self {
            step: InitialStep::fresh(states),
            restart: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frame_parses() {
        let msg: InboundMessage = serde_json::from_str(r#"{"command":"toggle_agent"}"#).unwrap();
        assert!(matches!(
            msg,
            InboundMessage::Command {
                command: CommandKind::ToggleAgent
            }
        ));
    }

    #[test]
    fn speed_frame_parses() {
        let msg: InboundMessage = serde_json::from_str(r#"{"speed":2.5}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Speed { speed } if speed == 2.5));
    }

    #[test]
    fn action_frame_parses() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"action":{"throttle":1.0,"coldGas":-0.5},"rocket_index":2}"#)
                .unwrap();
        match msg {
            InboundMessage::Action { action, rocket_index } => {
                assert_eq!(rocket_index, 2);
                assert_eq!(action.throttle, 1.0);
                assert_eq!(action.cold_gas, -0.5);
            }
            _ => panic!("expected Action variant"),
        }
    }

    #[test]
    fn malformed_payload_fails_to_parse() {
        let result: Result<InboundMessage, _> = serde_json::from_str(r#"{"bogus":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn status_frame_serializes_expected_shape() {
        let frame = StatusFrame {
            status: "playing",
            agent_enabled: true,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["status"], "playing");
        assert_eq!(json["agent_enabled"], true);
    }
}
