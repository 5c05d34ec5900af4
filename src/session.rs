//! Connection Session (C9): adapts inbound control/action messages to the
//! controller and assembles outbound frames (binary telemetry, JSON
//! control) for a single connection. Generic over the transport's
//! sink/stream halves so it carries no assumption about the duplex byte
//! stream beneath it.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::codec::{self, TelemetryRecord};
use crate::control::{
    ActionPayload, CommandKind, InboundMessage, InitialFrame, RestartFrame, StatusFrame,
};
use crate::controller;
use crate::controller::{ControllerConfig, SimulationController, TickOutput};
use crate::logging::EpisodeLog;
use crate::policy::PolicyAdapter;
use crate::rocket::RocketStateExport;

/// Runs one connection's session to completion: forwards inbound control
/// frames to the controller and outbound tick frames to the sink. Returns
/// once the peer disconnects or the sink rejects a write.
pub async fn run_session<T, E>(
    mut transport: T,
    cfg: ControllerConfig,
    policy: Option<Arc<PolicyAdapter>>,
    log: EpisodeLog,
    seed: u64,
) where
    T: Sink<Message, Error = E> + Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<TickOutput>();
    let controller = Arc::new(SimulationController::new(cfg, policy, seed, tick_tx, log));

    let initial_states = controller.states();
    if send_json(&mut transport, &InitialFrame::new(initial_states))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            inbound = transport.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let was_restart = handle_inbound_text(&controller, &text);

                        let (status, agent_enabled) = controller.status();
                        let frame = StatusFrame { status, agent_enabled };
                        if send_json(&mut transport, &frame).await.is_err() {
                            return;
                        }

                        if was_restart {
                            // restart() itself runs on a ~100ms delayed task so
                            // the in-flight tick's frame can drain; wait a little
                            // past that before reading the post-reset state.
                            tokio::time::sleep(controller::RESTART_DELAY + std::time::Duration::from_millis(20)).await;
                            let frame = RestartFrame::new(controller.states());
                            if send_json(&mut transport, &frame).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        controller.stop();
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary/ping/pong frames carry no session semantics inbound.
                    }
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "inbound transport error, dropping");
                    }
                }
            }
            tick = tick_rx.recv() => {
                match tick {
                    Some(output) => {
                        let frame = encode_tick(&controller, &output);
                        if transport.send(Message::Binary(frame)).await.is_err() {
                            controller.stop();
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

/// Applies one inbound text frame to the controller. Returns `true` when
/// the command was `restart`, so the caller can emit the restart envelope
/// in addition to the usual status frame.
fn handle_inbound_text(controller: &Arc<SimulationController>, text: &str) -> bool {
    let parsed: Result<InboundMessage, _> = serde_json::from_str(text);
    let message = match parsed {
        Ok(m) => m,
        Err(err) => {
            tracing::debug!(error = %err, raw = text, "malformed inbound control frame, ignoring");
            return false;
        }
    };

    match message {
        InboundMessage::Command { command } => match command {
            CommandKind::Pause => {
                controller.pause();
                false
            }
            CommandKind::Start => {
                controller.start();
                false
            }
            CommandKind::Restart => {
                controller.restart();
                true
            }
            CommandKind::ToggleAgent => {
                controller.toggle_agent();
                false
            }
        },
        InboundMessage::Speed { speed } => {
            controller.set_sim_speed(speed);
            false
        }
        InboundMessage::Action {
            action,
            rocket_index,
        } => {
            let ActionPayload { throttle, cold_gas } = action;
            controller.set_pending_action(rocket_index, crate::rocket::Action::new(throttle, cold_gas));
            false
        }
    }
}

fn encode_tick(controller: &Arc<SimulationController>, output: &TickOutput) -> Vec<u8> {
    let records: Vec<TelemetryRecord> = output
        .states
        .iter()
        .zip(output.rewards.iter())
        .zip(output.dones.iter())
        .zip(output.prev_action_taken.iter())
        .enumerate()
        .map(|(i, (((state, reward), done), action))| match reward {
            // Already inactive before this tick: no live state, emit from cache.
            None => {
                let cached = controller.final_outcome(i).map(|(code, _)| code).unwrap_or(0);
                TelemetryRecord::inactive(cached)
            }
            // Stepped this tick, possibly on its terminal step.
            Some(reward) => {
                let landing_code = if *done {
                    controller.final_outcome(i).map(|(code, _)| code).unwrap_or(0)
                } else {
                    0
                };
                to_record(state, *reward, *action, landing_code, true)
            }
        })
        .collect();
    codec::encode_frame(&records)
}

fn to_record(
    state: &RocketStateExport,
    reward: f64,
    action: crate::rocket::Action,
    landing_code: u8,
    is_active: bool,
) -> TelemetryRecord {
    TelemetryRecord {
        x: state.x as f32,
        y: state.y as f32,
        vx: state.vx as f32,
        vy: state.vy as f32,
        ax: state.ax as f32,
        ay: state.ay as f32,
        angle: state.angle as f32,
        angular_velocity: state.angular_velocity as f32,
        angular_acceleration: state.angular_acceleration as f32,
        mass: state.mass as f32,
        fuel_mass: state.fuel_mass as f32,
        reward: reward as f32,
        throttle: action.throttle as f32,
        cold_gas: action.cold_gas as f32,
        landing_code: landing_code as f32,
        is_active: if is_active { 1.0 } else { 0.0 },
    }
}

async fn send_json<T, E, M>(transport: &mut T, message: &M) -> Result<(), ()>
where
    T: Sink<Message, Error = E> + Unpin,
    M: serde::Serialize,
{
    let Ok(text) = serde_json::to_string(message) else {
        return Err(());
    };
    transport.send(Message::Text(text)).await.map_err(|_| ())
}

