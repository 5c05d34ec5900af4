//! Reward & Landing Evaluator (C5): classifies terminal ground contact and
//! computes the shaped per-step scalar reward. Pure and deterministic.

use serde::Serialize;

use crate::config::ConfigView;
use crate::rocket::{Action, RocketState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingMessage {
    Safe,
    Good,
    Ok,
    Unsafe,
}

impl LandingMessage {
    /// Wire code used by the telemetry codec: 0 is reserved for "no
    /// landing has happened yet" and is never produced by this type.
    pub fn code(self) -> u8 {
        match self {
            LandingMessage::Safe => 1,
            LandingMessage::Good => 2,
            LandingMessage::Ok => 3,
            LandingMessage::Unsafe => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LandingEvaluation {
    pub vx: f64,
    pub vy: f64,
    pub angle: f64,
    pub message: LandingMessage,
}

#[derive(Debug, Clone, Copy)]
pub struct LandingBandThresholds {
    pub speed_vx: f64,
    pub speed_vy: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct LandingThresholds {
    pub perfect: LandingBandThresholds,
    pub good: LandingBandThresholds,
    pub ok: LandingBandThresholds,
}

impl LandingThresholds {
    pub fn from_config(cfg: &ConfigView) -> anyhow::Result<Self> {
        let band = |name: &str| -> anyhow::Result<LandingBandThresholds> {
            Ok(LandingBandThresholds {
                speed_vx: cfg.require_f64(&format!("landing.thresholds.{name}.speed_vx"))?,
                speed_vy: cfg.require_f64(&format!("landing.thresholds.{name}.speed_vy"))?,
                angle: cfg.require_f64(&format!("landing.thresholds.{name}.angle"))?,
            })
        };
        Ok(Self {
            perfect: band("perfect")?,
            good: band("good")?,
            ok: band("ok")?,
        })
    }
}

fn within(band: &LandingBandThresholds, vx: f64, vy: f64, angle: f64) -> bool {
    vx.abs() < band.speed_vx && vy.abs() < band.speed_vy && angle.abs() < band.angle
}

pub fn evaluate_landing(state: &RocketState, thresholds: &LandingThresholds) -> LandingEvaluation {
    let (vx, vy, angle) = (state.vx, state.vy, state.angle);
    let message = if within(&thresholds.perfect, vx, vy, angle) {
        LandingMessage::Safe
    } else if within(&thresholds.good, vx, vy, angle) {
        LandingMessage::Good
    } else if within(&thresholds.ok, vx, vy, angle) {
        LandingMessage::Ok
    } else {
        LandingMessage::Unsafe
    };
    LandingEvaluation {
        vx,
        vy,
        angle,
        message,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RewardConfig {
    pub landing_perfect: f64,
    pub landing_good: f64,
    pub landing_ok: f64,
    pub crash_ground: f64,
    pub out_of_bounds: f64,
    pub tipped_over: f64,
    pub gamma: f64,
    pub throttle_descent_reward_scale: f64,
    pub free_fall_penalty_scale: f64,
    pub cold_gas_reward_scale: f64,
    pub angle_aware_throttle_scale: f64,
    pub correct_direction_bonus: f64,
    pub max_horizontal_position: f64,
    pub max_altitude: f64,
    pub tip_over_angle: f64,
}

impl RewardConfig {
    pub fn from_config(cfg: &ConfigView) -> anyhow::Result<Self> {
        Ok(Self {
            landing_perfect: cfg.require_f64("rl.rewards.landing_perfect")?,
            landing_good: cfg.require_f64("rl.rewards.landing_good")?,
            landing_ok: cfg.require_f64("rl.rewards.landing_ok")?,
            crash_ground: cfg.require_f64("rl.rewards.crash_ground")?,
            out_of_bounds: cfg.require_f64("rl.rewards.out_of_bounds")?,
            tipped_over: cfg.require_f64("rl.rewards.tipped_over")?,
            gamma: cfg.require_f64("rl.rewards.gamma")?,
            throttle_descent_reward_scale: cfg
                .require_f64("rl.rewards.throttle_descent_reward_scale")?,
            free_fall_penalty_scale: cfg.require_f64("rl.rewards.free_fall_penalty_scale")?,
            cold_gas_reward_scale: cfg.require_f64("rl.rewards.cold_gas_reward_scale")?,
            angle_aware_throttle_scale: cfg
                .require_f64("rl.rewards.angle_aware_throttle_scale")?,
            correct_direction_bonus: cfg.require_f64("rl.rewards.correct_direction_bonus")?,
            max_horizontal_position: cfg.require_f64("rl.max_horizontal_position")?,
            max_altitude: cfg.require_f64("rl.max_altitude")?,
            tip_over_angle: cfg.require_f64("rl.tip_over_angle")?,
        })
    }
}

const SCALE_ANGLE_ERROR_REDUCTION: f64 = 0.5;
const SCALE_ANG_VEL_ERROR_REDUCTION: f64 = 0.1;
const COLD_GAS_PENALTY_SCALE: f64 = 0.5;
const SCALE_VY_ASCENT_PENALTY: f64 = 0.5;
const WEIGHT_DIST: f64 = 0.005;
const WEIGHT_VEL: f64 = 0.01;
const WEIGHT_ANGLE: f64 = 0.005;
const WEIGHT_STAB: f64 = 0.05;
const NEAR_GROUND_ALTITUDE: f64 = 50.0;

/// `gamma * phi(after) - phi(before)`, weighted negative sum of altitude,
/// |v|, |angle|, |w|, with angle/stability weights doubled near the ground.
fn potential(state: &RocketState) -> f64 {
    let y = state.y.max(0.0);
    let (weight_angle, weight_stab) = if y < NEAR_GROUND_ALTITUDE {
        (WEIGHT_ANGLE * 2.0, WEIGHT_STAB * 2.0)
    } else {
        (WEIGHT_ANGLE, WEIGHT_STAB)
    };
    let dist = (state.x * state.x + y * y).sqrt();
    let vel = (state.vx * state.vx + state.vy * state.vy).sqrt();
    -WEIGHT_DIST * dist - WEIGHT_VEL * vel - weight_angle * state.angle.abs() - weight_stab * state.angular_velocity.abs()
}

/// Quality multiplier in `[0.7, 1.5]` applied to perfect/good terminal
/// rewards: `0.6*angleBonus + 0.4*velBonus`.
fn landing_quality_multiplier(state: &RocketState) -> f64 {
    let angle_bonus = (1.0 - state.angle.abs() / 10.0).max(0.0);
    let vel_bonus = (1.0 - state.vy.abs() / 5.0).max(0.0);
    (0.6 * angle_bonus + 0.4 * vel_bonus).clamp(0.7, 1.5)
}

/// Returns `(reward, terminated_on_ground)`.
pub fn compute_reward(
    thresholds: &LandingThresholds,
    reward_cfg: &RewardConfig,
    state_before: &RocketState,
    action: Action,
    state_after: &RocketState,
) -> (f64, bool) {
    let terminated_on_ground = state_after.y <= 0.1 && state_before.y > 0.1;

    if terminated_on_ground {
        let eval = evaluate_landing(state_after, thresholds);
        let reward = match eval.message {
            LandingMessage::Safe => {
                reward_cfg.landing_perfect * landing_quality_multiplier(state_after)
            }
            LandingMessage::Good => {
                reward_cfg.landing_good * landing_quality_multiplier(state_after)
            }
            LandingMessage::Ok => reward_cfg.landing_ok,
            LandingMessage::Unsafe => {
                let severity = ((state_after.vy.abs() / 20.0 + state_after.angle.abs() / 45.0)
                    / 2.0)
                    .clamp(0.0, 1.0);
                reward_cfg.crash_ground * severity
            }
        };
        return (reward, true);
    }

    let mut total = 0.0;

    // 1. Angular correction + cold-gas direction awareness.
    let angle_err_before = state_before.angle.abs();
    let angle_err_after = state_after.angle.abs();
    let ang_vel_err_before = state_before.angular_velocity.abs();
    let ang_vel_err_after = state_after.angular_velocity.abs();

    total -= (angle_err_after - angle_err_before) * SCALE_ANGLE_ERROR_REDUCTION;
    total -= (ang_vel_err_after - ang_vel_err_before) * SCALE_ANG_VEL_ERROR_REDUCTION;

    if angle_err_before > 0.1 || ang_vel_err_before > 0.1 {
        let correction_needed = angle_err_before + ang_vel_err_before;
        let correction_effectiveness =
            (angle_err_before - angle_err_after) + (ang_vel_err_before - ang_vel_err_after);
        // Rewards cold gas applied opposite the sign of the angle error.
        let direction_term = if (state_before.angle > 0.0 && action.cold_gas < 0.0)
            || (state_before.angle < 0.0 && action.cold_gas > 0.0)
        {
            reward_cfg.correct_direction_bonus * action.cold_gas.abs()
        } else if state_before.angle != 0.0 {
            -reward_cfg.correct_direction_bonus * action.cold_gas.abs()
        } else {
            0.0
        };
        total += action.cold_gas * correction_needed * correction_effectiveness
            * reward_cfg.cold_gas_reward_scale
            + direction_term;
    } else {
        total -= action.cold_gas * COLD_GAS_PENALTY_SCALE;
    }

    // 2. Vertical control.
    let airborne = state_after.y > 0.1;
    if airborne && state_after.vy < 0.0 {
        let descent_speed_factor = (-state_after.vy / 20.0).min(1.0);
        let angle_factor = (1.0 - state_after.angle.abs() / 90.0).max(0.0);
        total += action.throttle
            * (-state_after.vy)
            * angle_factor
            * (1.0 + descent_speed_factor)
            * reward_cfg.throttle_descent_reward_scale;
    }
    if airborne && state_after.vy > 0.0 {
        total -= state_after.vy * SCALE_VY_ASCENT_PENALTY;
    }

    // 3. Free-fall penalty.
    if state_after.vy < 0.0 && action.throttle < 0.1 {
        let proximity = 1.0 + 8.0 / state_after.y.max(1.0);
        let speed_factor = (-state_after.vy / 20.0).min(1.0);
        total -= proximity * speed_factor * reward_cfg.free_fall_penalty_scale;
    }

    // 4. Attitude-aware throttle inefficiency.
    if action.throttle > 0.1 && state_after.angle.abs() > 5.0 {
        total -= action.throttle * (state_after.angle.abs() / 90.0)
            * reward_cfg.angle_aware_throttle_scale;
    }

    // 5. Ascent penalty handled above as part of vertical control.

    // 6. Potential-based shaping.
    total += reward_cfg.gamma * potential(state_after) - potential(state_before);

    // Truncation penalties (do not set terminated_on_ground).
    if state_after.x.abs() > reward_cfg.max_horizontal_position
        || state_after.y > reward_cfg.max_altitude
    {
        total += reward_cfg.out_of_bounds;
    }
    if state_after.angle.abs() > reward_cfg.tip_over_angle {
        total += reward_cfg.tipped_over;
    }

    (total, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> LandingThresholds {
        LandingThresholds {
            perfect: LandingBandThresholds {
                speed_vx: 1.0,
                speed_vy: 3.0,
                angle: 5.0,
            },
            good: LandingBandThresholds {
                speed_vx: 2.0,
                speed_vy: 5.0,
                angle: 10.0,
            },
            ok: LandingBandThresholds {
                speed_vx: 4.0,
                speed_vy: 8.0,
                angle: 20.0,
            },
        }
    }

    fn reward_cfg() -> RewardConfig {
        RewardConfig {
            landing_perfect: 1000.0,
            landing_good: 500.0,
            landing_ok: 100.0,
            crash_ground: -500.0,
            out_of_bounds: -100.0,
            tipped_over: -200.0,
            gamma: 0.99,
            throttle_descent_reward_scale: 0.1,
            free_fall_penalty_scale: 1.0,
            cold_gas_reward_scale: 0.3,
            angle_aware_throttle_scale: 1.0,
            correct_direction_bonus: 0.1,
            max_horizontal_position: 2000.0,
            max_altitude: 5000.0,
            tip_over_angle: 90.0,
        }
    }

    fn state(y: f64, vx: f64, vy: f64, angle: f64) -> RocketState {
        RocketState {
            x: 0.0,
            y,
            vx,
            vy,
            ax: 0.0,
            ay: 0.0,
            angle,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            mass: 1000.0,
            fuel_mass: 0.0,
        }
    }

    #[test]
    fn evaluate_landing_picks_tightest_matching_band() {
        let eval = evaluate_landing(&state(0.0, 0.5, 1.0, 1.0), &thresholds());
        assert_eq!(eval.message, LandingMessage::Safe);

        let eval = evaluate_landing(&state(0.0, 1.5, 4.0, 8.0), &thresholds());
        assert_eq!(eval.message, LandingMessage::Good);

        let eval = evaluate_landing(&state(0.0, 3.0, 7.0, 15.0), &thresholds());
        assert_eq!(eval.message, LandingMessage::Ok);

        let eval = evaluate_landing(&state(0.0, 10.0, 20.0, 45.0), &thresholds());
        assert_eq!(eval.message, LandingMessage::Unsafe);
    }

    #[test]
    fn terminal_reward_fires_exactly_on_ground_contact() {
        let before = state(1.0, 0.0, -2.0, 0.0);
        let after = state(0.05, 0.0, -2.0, 0.0);
        let (reward, terminated) =
            compute_reward(&thresholds(), &reward_cfg(), &before, Action::zero(), &after);
        assert!(terminated);
        assert!(reward > 0.0, "safe landing should be positive: {reward}");
    }

    #[test]
    fn crash_is_scaled_by_severity_and_negative() {
        let before = state(1.0, 0.0, -50.0, 60.0);
        let after = state(0.0, 0.0, -50.0, 60.0);
        let (reward, terminated) =
            compute_reward(&thresholds(), &reward_cfg(), &before, Action::zero(), &after);
        assert!(terminated);
        assert!(reward < 0.0);
        assert!(reward >= reward_cfg().crash_ground);
    }

    #[test]
    fn non_terminal_step_never_sets_terminated_flag() {
        let before = state(500.0, 0.0, -5.0, 2.0);
        let after = state(490.0, 0.0, -5.0, 2.0);
        let (_, terminated) =
            compute_reward(&thresholds(), &reward_cfg(), &before, Action::zero(), &after);
        assert!(!terminated);
    }

    #[test]
    fn out_of_bounds_adds_penalty_without_terminating() {
        let before = state(500.0, 1900.0, 0.0, 0.0);
        let after = state(500.0, 2500.0, 0.0, 0.0);
        let (reward_in, terminated) =
            compute_reward(&thresholds(), &reward_cfg(), &before, Action::zero(), &after);
        assert!(!terminated);
        let before2 = state(500.0, 0.0, 0.0, 0.0);
        let (reward_baseline, _) = compute_reward(
            &thresholds(),
            &reward_cfg(),
            &before2,
            Action::zero(),
            &state(500.0, 0.0, 0.0, 0.0),
        );
        assert!(reward_in < reward_baseline);
    }

    #[test]
    fn tip_over_adds_penalty() {
        let before = state(500.0, 0.0, 0.0, 0.0);
        let after = state(500.0, 0.0, 0.0, 95.0);
        let (reward, _) =
            compute_reward(&thresholds(), &reward_cfg(), &before, Action::zero(), &after);
        assert!(reward < 0.0);
    }
}
