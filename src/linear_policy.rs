//! A minimal loaded-from-bytes policy implementation. The training
//! collaborator's actual policy format is opaque to the core; this is the
//! one concrete [`Policy`](crate::policy::Policy) the core ships so
//! `model.version` configs have something real to load instead of always
//! falling back to [`crate::policy::ConstantPolicy`]. It is a single
//! linear layer with a tanh squash, the smallest architecture that can
//! exercise the full adapter/normalization pipeline.

use crate::error::{PolicyLoadError, PolicyPredictError};
use crate::policy::{Observation, Policy};
use crate::rocket::Action;

const INPUT_DIM: usize = 8;
const OUTPUT_DIM: usize = 2;
const WEIGHTS_LEN: usize = INPUT_DIM * OUTPUT_DIM;
const BLOB_LEN: usize = (WEIGHTS_LEN + OUTPUT_DIM) * 4;

pub struct LinearPolicy {
    weights: [[f32; INPUT_DIM]; OUTPUT_DIM],
    bias: [f32; OUTPUT_DIM],
}

impl LinearPolicy {
    /// `bytes` is `weights` (row-major, `OUTPUT_DIM x INPUT_DIM`, f32 LE)
    /// followed by `bias` (`OUTPUT_DIM` f32 LE).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PolicyLoadError> {
        if bytes.len() != BLOB_LEN {
            return Err(PolicyLoadError::MalformedStats {
                expected: BLOB_LEN,
                got: bytes.len(),
            });
        }
        let read_f32 = |i: usize| f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        let mut weights = [[0.0f32; INPUT_DIM]; OUTPUT_DIM];
        for (row, weight_row) in weights.iter_mut().enumerate() {
            for (col, weight) in weight_row.iter_mut().enumerate() {
                *weight = read_f32(row * INPUT_DIM + col);
            }
        }
        let mut bias = [0.0f32; OUTPUT_DIM];
        for (i, b) in bias.iter_mut().enumerate() {
            *b = read_f32(WEIGHTS_LEN + i);
        }
        Ok(Self { weights, bias })
    }

    fn forward(&self, obs: &Observation) -> Action {
        let mut out = [0.0f32; OUTPUT_DIM];
        for (row, value) in out.iter_mut().enumerate() {
            let dot: f32 = self.weights[row]
                .iter()
                .zip(obs.iter())
                .map(|(w, o)| w * o)
                .sum();
            *value = (dot + self.bias[row]).tanh();
        }
        let throttle = ((out[0] + 1.0) / 2.0) as f64;
        let cold_gas = out[1] as f64;
        Action::new(throttle, cold_gas)
    }
}

impl Policy for LinearPolicy {
    fn predict_batch(&self, observations: &[Observation]) -> Result<Vec<Action>, PolicyPredictError> {
        Ok(observations.iter().map(|obs| self.forward(obs)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_with(weights: [[f32; INPUT_DIM]; OUTPUT_DIM], bias: [f32; OUTPUT_DIM]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BLOB_LEN);
        for row in weights {
            for w in row {
                bytes.extend_from_slice(&w.to_le_bytes());
            }
        }
        for b in bias {
            bytes.extend_from_slice(&b.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn zero_weights_and_bias_yield_neutral_action() {
        let blob = blob_with([[0.0; INPUT_DIM]; OUTPUT_DIM], [0.0; OUTPUT_DIM]);
        let policy = LinearPolicy::from_bytes(&blob).unwrap();
        let actions = policy.predict_batch(&[[0.0; INPUT_DIM]]).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].throttle, 0.5);
        assert_eq!(actions[0].cold_gas, 0.0);
    }

    #[test]
    fn rejects_wrong_length_blob() {
        assert!(LinearPolicy::from_bytes(&[0u8; 4]).is_err());
    }

    #[test]
    fn batched_predictions_match_row_count() {
        let blob = blob_with([[0.1; INPUT_DIM]; OUTPUT_DIM], [0.0; OUTPUT_DIM]);
        let policy = LinearPolicy::from_bytes(&blob).unwrap();
        let observations = vec![[1.0; INPUT_DIM]; 5];
        assert_eq!(policy.predict_batch(&observations).unwrap().len(), 5);
    }
}
