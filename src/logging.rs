//! Episode log buffer: structured per-step records, flushed to a rolling
//! log file under `paths.logs_dir/simulations/<timestamp>.log`, mirroring
//! the original `JsonFormatter` file handler.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ConfigView;
use crate::rocket::{Action, RocketStateExport};

const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub logs_dir: PathBuf,
    pub log_state: bool,
    pub log_action: bool,
    pub log_reward: bool,
}

impl LoggingConfig {
    pub fn from_config(cfg: &ConfigView) -> anyhow::Result<Self> {
        Ok(Self {
            logs_dir: PathBuf::from(cfg.require_str("paths.logs_dir")?),
            log_state: cfg.require_bool("logging.log_state")?,
            log_action: cfg.require_bool("logging.log_action")?,
            log_reward: cfg.require_bool("logging.log_reward")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub rocket_index: usize,
    pub step: u32,
    pub action: Action,
    pub state: RocketStateExport,
    pub reward: f64,
    pub done: bool,
}

#[derive(Serialize)]
struct LogLine<'a> {
    rocket_index: usize,
    step: u32,
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a RocketStateExport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reward: Option<f64>,
}

/// One episode's worth of buffered structured log records. Flushes to
/// disk when the buffer reaches [`FLUSH_THRESHOLD`], on `pause()`/
/// `stop()`, and at natural end-of-episode.
pub struct EpisodeLog {
    cfg: Option<LoggingConfig>,
    path: Option<PathBuf>,
    buffer: Vec<LogRecord>,
}

impl EpisodeLog {
    /// Opens (creating if necessary) `logs_dir/simulations/` and starts a
    /// new timestamped log file for this episode.
    pub fn create(cfg: LoggingConfig) -> anyhow::Result<Self> {
        let dir = cfg.logs_dir.join("simulations");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.log", episode_timestamp()));
        Ok(Self {
            cfg: Some(cfg),
            path: Some(path),
            buffer: Vec::new(),
        })
    }

    /// A log that discards every record without touching disk, for tests
    /// and any caller that has no configured `logs_dir`.
    pub fn discard() -> Self {
        Self {
            cfg: None,
            path: None,
            buffer: Vec::new(),
        }
    }

    pub fn push(&mut self, record: LogRecord) {
        self.buffer.push(record);
    }

    pub fn should_flush(&self) -> bool {
        self.buffer.len() >= FLUSH_THRESHOLD
    }

    pub fn flush(&mut self) {
        let Some(cfg) = &self.cfg else {
            self.buffer.clear();
            return;
        };
        let Some(path) = &self.path else {
            self.buffer.clear();
            return;
        };
        if self.buffer.is_empty() {
            return;
        }
        let file = OpenOptions::new().create(true).append(true).open(path);
        let mut file = match file {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to open episode log file");
                self.buffer.clear();
                return;
            }
        };
        for record in self.buffer.drain(..) {
            let line = LogLine {
                rocket_index: record.rocket_index,
                step: record.step,
                done: record.done,
                action: cfg.log_action.then_some(&record.action),
                state: cfg.log_state.then_some(&record.state),
                reward: cfg.log_reward.then_some(record.reward),
            };
            match serde_json::to_string(&line) {
                Ok(json) => {
                    if let Err(err) = writeln!(file, "{json}") {
                        tracing::warn!(error = %err, "failed to write episode log line");
                        break;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "failed to serialize episode log line"),
            }
        }
    }

    /// Starts a fresh log file for the next episode, carrying the same
    /// configuration.
    pub fn rotate(&self) -> Self {
        match &self.cfg {
            Some(cfg) => Self::create(cfg.clone()).unwrap_or_else(|_| Self::discard()),
            None => Self::discard(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn episode_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(step: u32) -> LogRecord {
        LogRecord {
            rocket_index: 0,
            step,
            action: Action::new(0.5, 0.0),
            state: RocketStateExport {
                x: 0.0,
                y: 100.0,
                vx: 0.0,
                vy: -1.0,
                ax: 0.0,
                ay: -9.81,
                angle: 0.0,
                angular_velocity: 0.0,
                angular_acceleration: 0.0,
                mass: 1000.0,
                fuel_mass: 50.0,
                speed: 1.0,
                relative_angle: 0.0,
                total_mass: 1050.0,
            },
            reward: 0.1,
            done: false,
        }
    }

    #[test]
    fn discard_log_never_touches_disk_and_clears_buffer() {
        let mut log = EpisodeLog::discard();
        log.push(sample_record(1));
        assert!(!log.should_flush());
        log.flush();
        assert_eq!(log.path(), None);
    }

    #[test]
    fn flush_threshold_matches_configured_limit() {
        let mut log = EpisodeLog::discard();
        for i in 0..FLUSH_THRESHOLD as u32 {
            log.push(sample_record(i));
        }
        assert!(log.should_flush());
    }

    #[test]
    fn writes_one_json_line_per_record_and_honors_field_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            logs_dir: dir.path().to_path_buf(),
            log_state: true,
            log_action: false,
            log_reward: true,
        };
        let mut log = EpisodeLog::create(cfg).unwrap();
        log.push(sample_record(1));
        log.push(sample_record(2));
        log.flush();

        let path = log.path().unwrap();
        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert!(parsed.get("state").is_some());
        assert!(parsed.get("action").is_none());
        assert!(parsed.get("reward").is_some());
    }
}
