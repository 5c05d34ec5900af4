//! Policy Adapter (C6): converts rocket state to an observation vector,
//! normalizes it with saved running statistics, and invokes batched
//! prediction. Pure with respect to simulation state — it never mutates a
//! rocket.

use crate::error::{PolicyLoadError, PolicyPredictError};
use crate::rocket::{Action, RocketState};

/// Field order fixed by the spec: `[x, y, vx, vy, ax, ay, angle, angularVelocity]`.
pub type Observation = [f32; 8];

fn to_observation(state: &RocketState) -> Observation {
    [
        state.x as f32,
        state.y as f32,
        state.vx as f32,
        state.vy as f32,
        state.ax as f32,
        state.ay as f32,
        state.angle as f32,
        state.angular_velocity as f32,
    ]
}

/// Running observation normalization statistics, loaded from an opaque
/// blob produced by the training collaborator (mirrors a `VecNormalize`
/// stats file: two 8-entry `f32` arrays, mean then variance, little-endian).
#[derive(Debug, Clone, Copy)]
pub struct NormStats {
    pub mean: Observation,
    pub var: Observation,
}

const EPS: f32 = 1e-8;

impl NormStats {
    pub fn identity() -> Self {
        Self {
            mean: [0.0; 8],
            var: [1.0; 8],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PolicyLoadError> {
        const EXPECTED: usize = 16 * 4;
        if bytes.len() != EXPECTED {
            return Err(PolicyLoadError::MalformedStats {
                expected: EXPECTED,
                got: bytes.len(),
            });
        }
        let mut mean = [0.0f32; 8];
        let mut var = [0.0f32; 8];
        for (i, slot) in mean.iter_mut().enumerate() {
            *slot = f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        for (i, slot) in var.iter_mut().enumerate() {
            let offset = 32 + i * 4;
            *slot = f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        }
        Ok(Self { mean, var })
    }

    fn normalize(&self, obs: &Observation, clip: f32) -> Observation {
        let mut out = [0.0f32; 8];
        for i in 0..8 {
            let scaled = (obs[i] - self.mean[i]) / (self.var[i] + EPS).sqrt();
            out[i] = scaled.clamp(-clip, clip);
        }
        out
    }
}

/// Opaque, externally-trained batch-prediction interface. The core never
/// trains or inspects the policy's internals. Fallible: an inference
/// backend may reject a batch (backend unavailable, shape mismatch), and
/// the caller falls back to the zero action for that tick rather than
/// treating it as fatal.
pub trait Policy: Send + Sync {
    fn predict_batch(&self, observations: &[Observation]) -> Result<Vec<Action>, PolicyPredictError>;
}

/// Adapts a raw [`Policy`] plus [`NormStats`] to operate directly on
/// [`RocketState`]s. Holds the policy as a trait object so a controller
/// can store one adapter regardless of which concrete policy backs it.
pub struct PolicyAdapter {
    policy: Box<dyn Policy>,
    stats: NormStats,
    clip_obs: f32,
}

impl PolicyAdapter {
    pub fn new(policy: Box<dyn Policy>, stats: NormStats, clip_obs: f32) -> Self {
        Self {
            policy,
            stats,
            clip_obs,
        }
    }

    pub fn predict_batch(&self, states: &[&RocketState]) -> Result<Vec<Action>, PolicyPredictError> {
        let observations: Vec<Observation> = states
            .iter()
            .map(|s| self.stats.normalize(&to_observation(s), self.clip_obs))
            .collect();
        let actions = self.policy.predict_batch(&observations)?;
        Ok(actions
            .into_iter()
            .map(|a| Action::new(a.throttle, a.cold_gas))
            .collect())
    }
}

/// A constant-action stub, used in tests and as a harmless default when no
/// trained model is configured (mirrors `spec.md` §8 scenario 5).
pub struct ConstantPolicy {
    pub action: Action,
}

impl ConstantPolicy {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}

impl Policy for ConstantPolicy {
    fn predict_batch(&self, observations: &[Observation]) -> Result<Vec<Action>, PolicyPredictError> {
        Ok(vec![self.action; observations.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> RocketState {
        RocketState {
            x: 10.0,
            y: 200.0,
            vx: -1.0,
            vy: -5.0,
            ax: 0.0,
            ay: -9.8,
            angle: 3.0,
            angular_velocity: 0.5,
            angular_acceleration: 0.0,
            mass: 1000.0,
            fuel_mass: 50.0,
        }
    }

    #[test]
    fn constant_policy_returns_same_action_for_every_row() {
        let adapter = PolicyAdapter::new(
            Box::new(ConstantPolicy::new(Action::new(1.0, 0.0))),
            NormStats::identity(),
            10.0,
        );
        let s = sample_state();
        let states = vec![&s, &s, &s];
        let actions = adapter.predict_batch(&states).unwrap();
        assert_eq!(actions.len(), 3);
        for a in actions {
            assert_eq!(a.throttle, 1.0);
            assert_eq!(a.cold_gas, 0.0);
        }
    }

    #[test]
    fn never_predicts_when_batch_is_empty() {
        let adapter = PolicyAdapter::new(
            Box::new(ConstantPolicy::new(Action::new(1.0, 0.0))),
            NormStats::identity(),
            10.0,
        );
        let actions = adapter.predict_batch(&[]).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn norm_stats_round_trip_through_bytes() {
        let mut bytes = Vec::with_capacity(64);
        let mean = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let var = [1.0f32; 8];
        for v in mean.iter().chain(var.iter()) {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let stats = NormStats::from_bytes(&bytes).unwrap();
        assert_eq!(stats.mean, mean);
        assert_eq!(stats.var, var);
    }

    #[test]
    fn malformed_stats_blob_is_rejected() {
        assert!(NormStats::from_bytes(&[0u8; 10]).is_err());
    }
}
