mod codec;
mod config;
mod control;
mod controller;
mod error;
mod landing;
mod linear_policy;
mod logging;
mod net;
mod physics;
mod policy;
mod rocket;
mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use config::ConfigView;
use controller::ControllerConfig;
use landing::{LandingThresholds, RewardConfig};
use logging::LoggingConfig;
use physics::PhysicsConfig;
use policy::{NormStats, PolicyAdapter};
use rocket::SamplerConfig;

#[derive(Parser, Debug)]
#[command(name = "rocket-lander-sim", version, about = "Multi-rocket physics simulation server")]
struct Cli {
    /// Address to listen for client connections on.
    #[arg(long, default_value = "0.0.0.0:9000")]
    listen: SocketAddr,

    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory holding `model/<version>/{policy_blob,norm_stats_blob}`
    /// when `model.version` is set.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = fallible_main().await {
        tracing::error!(error = ?err, "fatal");
        return Err(err);
    }
    Ok(())
}

async fn fallible_main() -> Result<()> {
    let cli = Cli::parse();
    let raw_config = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read config file {}", cli.config.display()))?;
    let cfg = ConfigView::from_yaml_str(&raw_config)?;

    let num_rockets = cfg.require_u32("environment.num_rockets")? as usize;
    let dt = cfg.require_f64("simulation.time_step")?;
    let max_steps = cfg.require_u32("rl.max_episode_steps")?;
    let loop_episodes = cfg.require_bool("simulation.loop")?;

    let physics_cfg = PhysicsConfig::from_config(&cfg)?;
    let sampler_cfg = SamplerConfig::from_config(&cfg)?;
    let thresholds = LandingThresholds::from_config(&cfg)?;
    let rewards = RewardConfig::from_config(&cfg)?;

    let logging_cfg = LoggingConfig::from_config(&cfg).ok();

    let policy = load_policy(&cfg, &cli.assets);

    let controller_cfg_factory = move || ControllerConfig {
        num_rockets,
        dt,
        max_steps,
        loop_episodes,
        physics: physics_cfg,
        sampler: sampler_cfg,
        thresholds,
        rewards,
    };

    tokio::select! {
        result = net::serve(cli.listen, controller_cfg_factory, policy, logging_cfg) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
    }
}

/// Loads the policy and normalization stats named by `model.version`, if
/// configured. Any failure downgrades to `agent_enabled = false` rather
/// than failing the process, per the policy-load error contract.
fn load_policy(cfg: &ConfigView, assets_dir: &PathBuf) -> Option<Arc<PolicyAdapter>> {
    let version = cfg.optional_str("model.version")?;
    let model_dir = assets_dir.join("model").join(&version);

    let load = || -> Result<PolicyAdapter> {
        let policy_bytes = std::fs::read(model_dir.join("policy_blob"))
            .with_context(|| format!("reading policy blob for model {version}"))?;
        let stats_bytes = std::fs::read(model_dir.join("norm_stats_blob"))
            .with_context(|| format!("reading norm stats blob for model {version}"))?;
        let policy = linear_policy::LinearPolicy::from_bytes(&policy_bytes)?;
        let stats = NormStats::from_bytes(&stats_bytes)?;
        Ok(PolicyAdapter::new(Box::new(policy), stats, 10.0))
    };

    match load() {
        Ok(adapter) => {
            tracing::info!(%version, "loaded policy model");
            Some(Arc::new(adapter))
        }
        Err(err) => {
            tracing::warn!(%version, error = %err, "failed to load policy model, agent disabled");
            None
        }
    }
}
