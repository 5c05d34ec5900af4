//! Simulation Controller (C7): per-connection scheduler. Owns all rockets
//! for a connection, drives the fixed-dt tick loop, merges operator and
//! policy actions, tracks per-rocket done status, buffers episode logs,
//! and emits outbound frames through a channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::RocketFault;
use crate::landing::{self, LandingThresholds, RewardConfig};
use crate::logging::{EpisodeLog, LogRecord};
use crate::physics::PhysicsConfig;
use crate::policy::PolicyAdapter;
use crate::rocket::{Action, Rocket, RocketStateExport, SamplerConfig};

pub const RESTART_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Paused,
    Running,
    Stopped,
}

/// One tick's worth of output for every rocket in the connection, handed
/// to the outbound sink via the controller's callback channel.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub states: Vec<RocketStateExport>,
    pub rewards: Vec<Option<f64>>,
    pub dones: Vec<bool>,
    pub prev_action_taken: Vec<Action>,
}

struct Inner {
    rockets: Vec<Rocket>,
    done: Vec<bool>,
    step_count: Vec<u32>,
    pending_actions: Vec<Action>,
    final_outcomes: HashMap<usize, (u8, f64)>,
    policy: Option<Arc<PolicyAdapter>>,
    agent_enabled: bool,
    state: LifecycleState,
    sim_speed: f64,
    log: EpisodeLog,
    rng: ChaCha8Rng,
}

/// Static per-connection configuration, fixed for the lifetime of the
/// controller (only rocket states and lifecycle flags mutate at runtime).
pub struct ControllerConfig {
    pub num_rockets: usize,
    pub dt: f64,
    pub max_steps: u32,
    pub loop_episodes: bool,
    pub physics: PhysicsConfig,
    pub sampler: SamplerConfig,
    pub thresholds: LandingThresholds,
    pub rewards: RewardConfig,
}

pub struct SimulationController {
    inner: Arc<Mutex<Inner>>,
    cfg: Arc<ControllerConfig>,
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    outbound: mpsc::UnboundedSender<TickOutput>,
}

impl SimulationController {
    pub fn new(
        cfg: ControllerConfig,
        policy: Option<Arc<PolicyAdapter>>,
        seed: u64,
        outbound: mpsc::UnboundedSender<TickOutput>,
        log: EpisodeLog,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rockets = (0..cfg.num_rockets)
            .map(|_| Rocket::new(&mut rng, cfg.physics, cfg.sampler, cfg.dt))
            .collect::<Vec<_>>();
        let n = rockets.len();
        let agent_enabled = policy.is_some();
        let inner = Inner {
            rockets,
            done: vec![false; n],
            step_count: vec![0; n],
            pending_actions: vec![Action::zero(); n],
            final_outcomes: HashMap::new(),
            policy,
            agent_enabled,
            state: LifecycleState::Idle,
            sim_speed: 1.0,
            log,
            rng,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            cfg: Arc::new(cfg),
            loop_handle: Arc::new(Mutex::new(None)),
            outbound,
        }
    }

    pub fn num_rockets(&self) -> usize {
        self.cfg.num_rockets
    }

    pub fn states(&self) -> Vec<RocketStateExport> {
        let inner = self.inner.lock();
        inner.rockets.iter().map(|r| r.get_state()).collect()
    }

    /// Moves to `Paused`, resets all rockets and session caches, and
    /// starts a fresh episode log.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        for rocket in &mut inner.rockets {
            rocket.reset(&mut inner.rng);
        }
        let n = inner.rockets.len();
        inner.done = vec![false; n];
        inner.step_count = vec![0; n];
        inner.pending_actions = vec![Action::zero(); n];
        inner.final_outcomes.clear();
        inner.state = LifecycleState::Paused;
        inner.log.flush();
        inner.log = inner.log.rotate();
    }

    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        inner.state = LifecycleState::Paused;
        inner.log.flush();
    }

    pub fn toggle_agent(&self) {
        let mut inner = self.inner.lock();
        if inner.policy.is_some() {
            inner.agent_enabled = !inner.agent_enabled;
        }
    }

    pub fn set_sim_speed(&self, speed: f64) {
        let mut inner = self.inner.lock();
        inner.sim_speed = speed.clamp(0.01, 10.0);
    }

    pub fn set_pending_action(&self, rocket_index: usize, action: Action) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.pending_actions.get_mut(rocket_index) {
            *slot = action;
        }
    }

    pub fn status(&self) -> (&'static str, bool) {
        let inner = self.inner.lock();
        let status = match inner.state {
            LifecycleState::Running => "playing",
            _ => "paused",
        };
        (status, inner.agent_enabled)
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.state = LifecycleState::Stopped;
        inner.log.flush();
        drop(inner);
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
    }

    /// From `Paused`/`Idle`, moves to `Running` and spawns exactly one
    /// loop task. From `Running` this is a no-op.
    pub fn start(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            if inner.state == LifecycleState::Running {
                return;
            }
            inner.state = LifecycleState::Running;
        }
        let controller = Arc::clone(self);
        let handle = tokio::spawn(async move { controller.run_loop().await });
        *self.loop_handle.lock() = Some(handle);
    }

    /// Non-synchronous: scheduled after a short delay so the in-flight
    /// tick's frame has a chance to drain first.
    pub fn restart(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(RESTART_DELAY).await;
            controller.reset();
            controller.start();
        });
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let tick_start = Instant::now();
            let state = { self.inner.lock().state };
            match state {
                LifecycleState::Stopped => return,
                LifecycleState::Paused | LifecycleState::Idle => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
                LifecycleState::Running => {}
            }

            let (output, all_done, sim_speed) = self.tick();
            if self.outbound.send(output).is_err() {
                self.stop();
                return;
            }

            if all_done && self.cfg.loop_episodes {
                self.restart();
                return;
            }

            let elapsed = tick_start.elapsed().as_secs_f64();
            let budget = (self.cfg.dt / sim_speed.max(0.01) - elapsed).max(0.0);
            if budget > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(budget)).await;
            }
        }
    }

    /// Runs exactly one tick synchronously. Exposed for deterministic
    /// tests that drive the loop without a live scheduler.
    pub fn tick(&self) -> (TickOutput, bool, f64) {
        let mut inner = self.inner.lock();
        let n = inner.rockets.len();

        let snapshot_states: Vec<_> = inner.rockets.iter().map(|r| *r.state()).collect();
        let mut actions = inner.pending_actions.clone();

        if inner.agent_enabled {
            let candidates: Vec<usize> = (0..n).filter(|&i| !inner.done[i]).collect();
            if !candidates.is_empty() {
                if let Some(policy) = inner.policy.clone() {
                    let refs: Vec<&_> = candidates.iter().map(|&i| &snapshot_states[i]).collect();
                    match policy.predict_batch(&refs) {
                        Ok(predicted) => {
                            for (slot, action) in candidates.iter().zip(predicted) {
                                actions[*slot] = action;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, batch_size = candidates.len(), "policy batch prediction failed, falling back to zero action");
                            for &slot in &candidates {
                                actions[slot] = Action::zero();
                            }
                        }
                    }
                }
            }
        }

        let mut states = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        let mut dones = Vec::with_capacity(n);
        let mut prev_action_taken = Vec::with_capacity(n);

        for i in 0..n {
            if inner.done[i] {
                states.push(inner.rockets[i].get_state());
                rewards.push(None);
                dones.push(true);
                prev_action_taken.push(Action::zero());
                continue;
            }

            let action = actions[i];
            let before = *inner.rockets[i].state();
            let step_result = inner.rockets[i].step(action);
            let after = *inner.rockets[i].state();

            let (reward, terminated, fault) = match step_result {
                Ok(()) => {
                    let (reward, terminated) = landing::compute_reward(
                        &self.cfg.thresholds,
                        &self.cfg.rewards,
                        &before,
                        action,
                        &after,
                    );
                    (reward, terminated, None)
                }
                Err(RocketFault::Degenerate) => {
                    tracing::warn!(
                        rocket_index = i,
                        "degenerate total mass, physics skipped this tick"
                    );
                    (0.0, false, Some(RocketFault::Degenerate))
                }
                Err(RocketFault::Fatal) => (-1.0e4, true, Some(RocketFault::Fatal)),
            };

            inner.step_count[i] += 1;
            let episode_timeout = inner.step_count[i] >= self.cfg.max_steps;
            let is_done = terminated || episode_timeout;
            if is_done {
                let landing_code = if terminated && fault.is_none() {
                    landing::evaluate_landing(&after, &self.cfg.thresholds).message.code()
                } else if fault == Some(RocketFault::Fatal) {
                    4
                } else {
                    0
                };
                inner.final_outcomes.insert(i, (landing_code, reward));
            }
            inner.done[i] = inner.done[i] || is_done;

            inner.log.push(LogRecord {
                rocket_index: i,
                step: inner.step_count[i],
                action,
                state: after,
                reward,
                done: inner.done[i],
            });

            states.push(inner.rockets[i].get_state());
            rewards.push(Some(reward));
            dones.push(inner.done[i]);
            prev_action_taken.push(action);
        }

        for slot in inner.pending_actions.iter_mut() {
            *slot = Action::zero();
        }

        let all_done = inner.done.iter().all(|&d| d);
        let sim_speed = inner.sim_speed;
        if inner.log.should_flush() {
            inner.log.flush();
        }

        (
            TickOutput {
                states,
                rewards,
                dones,
                prev_action_taken,
            },
            all_done,
            sim_speed,
        )
    }

    pub fn final_outcome(&self, rocket_index: usize) -> Option<(u8, f64)> {
        self.inner.lock().final_outcomes.get(&rocket_index).copied()
    }
}
