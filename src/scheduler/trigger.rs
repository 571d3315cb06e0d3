//! Daily publish trigger
//!
//! Drives the dispatcher at one random time inside each configured
//! publish window. Fire times are drawn once at construction and reused
//! every day; a restart re-draws them. Fire times already in the past are
//! skipped, and the daily quota keeps a mid-day restart from over-posting.

use chrono::{Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::clock::Clock;
use super::dispatcher::PublishDispatcher;
use super::error::{SchedulerError, SchedulerResult};

// ============================================================================
// Publish Windows
// ============================================================================

/// A half-open daily time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PublishWindow {
    /// Parse a window spec of the form "HH:MM-HH:MM"
    pub fn parse(spec: &str) -> SchedulerResult<Self> {
        let (start, end) = spec.split_once('-').ok_or_else(|| {
            SchedulerError::trigger_config(
                "windows",
                format!("Invalid window '{spec}'. Expected HH:MM-HH:MM"),
            )
        })?;

        let parse_time = |s: &str| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
                SchedulerError::trigger_config(
                    "windows",
                    format!("Invalid time '{s}' in window '{spec}'. Expected HH:MM"),
                )
            })
        };

        let window = Self {
            start: parse_time(start)?,
            end: parse_time(end)?,
        };

        if window.start >= window.end {
            return Err(SchedulerError::trigger_config(
                "windows",
                format!("Window '{spec}' must start before it ends"),
            ));
        }

        Ok(window)
    }

    /// Window length in seconds
    pub fn span_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Configuration for the daily trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Publish windows as "HH:MM-HH:MM" specs, one fire time drawn per window
    pub windows: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                "08:00-11:00".to_string(),
                "11:00-14:00".to_string(),
                "14:00-17:00".to_string(),
                "17:00-20:00".to_string(),
            ],
        }
    }
}

impl TriggerConfig {
    /// Parse and validate the window specs
    ///
    /// Windows must be well-formed, in ascending order and non-overlapping,
    /// so at most one fire time is pending at any moment.
    pub fn parse_windows(&self) -> SchedulerResult<Vec<PublishWindow>> {
        if self.windows.is_empty() {
            return Err(SchedulerError::trigger_config(
                "windows",
                "At least one publish window is required",
            ));
        }

        let mut windows = Vec::with_capacity(self.windows.len());
        for spec in &self.windows {
            windows.push(PublishWindow::parse(spec)?);
        }

        for (i, pair) in windows.windows(2).enumerate() {
            if pair[1].start < pair[0].end {
                return Err(SchedulerError::trigger_config(
                    "windows",
                    format!(
                        "Windows must be ordered and non-overlapping: '{}' overlaps '{}'",
                        self.windows[i + 1],
                        self.windows[i]
                    ),
                ));
            }
        }

        Ok(windows)
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        self.parse_windows().map(|_| ())
    }

    /// Draw one fire time per window from the given generator
    pub fn fire_times<R: Rng>(&self, rng: &mut R) -> SchedulerResult<Vec<NaiveTime>> {
        let windows = self.parse_windows()?;

        Ok(windows
            .iter()
            .map(|window| {
                let offset = rng.gen_range(0..window.span_secs());
                window.start + ChronoDuration::seconds(offset)
            })
            .collect())
    }
}

// ============================================================================
// Trigger Scheduler
// ============================================================================

/// Long-running loop that fires the dispatcher inside each window
///
/// Fire times are fixed for the lifetime of the scheduler and reused
/// every day.
pub struct TriggerScheduler {
    config: TriggerConfig,
    dispatcher: Arc<PublishDispatcher>,
    clock: Arc<dyn Clock>,
    fire_times: Vec<NaiveTime>,
    is_running: Arc<RwLock<bool>>,
}

impl TriggerScheduler {
    /// Create a trigger scheduler with entropy-drawn fire times
    pub fn new(
        config: TriggerConfig,
        dispatcher: Arc<PublishDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> SchedulerResult<Self> {
        let mut rng = ChaCha8Rng::from_entropy();
        Self::with_rng(config, dispatcher, clock, &mut rng)
    }

    /// Create a trigger scheduler drawing fire times from the given generator
    pub fn with_rng<R: Rng>(
        config: TriggerConfig,
        dispatcher: Arc<PublishDispatcher>,
        clock: Arc<dyn Clock>,
        rng: &mut R,
    ) -> SchedulerResult<Self> {
        let fire_times = config.fire_times(rng)?;
        Ok(Self {
            config,
            dispatcher,
            clock,
            fire_times,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// The fire times drawn at construction, one per window
    pub fn fire_times(&self) -> &[NaiveTime] {
        &self.fire_times
    }

    /// Whether the loop is active
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Stop the loop after the current wait completes
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    /// Run until stopped
    ///
    /// Publish errors are logged and swallowed here; a failed slot is
    /// retried by the dispatcher at the next fire time because the slot
    /// index only advances on success.
    pub async fn run(&self) -> SchedulerResult<()> {
        *self.is_running.write().await = true;
        tracing::info!(
            windows = ?self.config.windows,
            fire_times = ?self.fire_times,
            "Trigger scheduler started"
        );

        while *self.is_running.read().await {
            let today = self.clock.today();

            for &time in &self.fire_times {
                if !*self.is_running.read().await {
                    break;
                }

                let target = match Local.from_local_datetime(&today.and_time(time)).single() {
                    Some(target) => target,
                    // DST gap swallowed this fire time
                    None => continue,
                };

                let now = self.clock.now();
                if target <= now {
                    continue;
                }
                let wait = (target - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(e) = self.dispatcher.publish_next().await {
                            tracing::error!(error = %e, "Scheduled publish failed");
                        }
                    }
                    _ = self.wait_for_stop() => return Ok(()),
                }
            }

            let wait = self.duration_until_next_day();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wait_for_stop() => return Ok(()),
            }
        }

        Ok(())
    }

    async fn wait_for_stop(&self) {
        loop {
            if !*self.is_running.read().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    fn duration_until_next_day(&self) -> std::time::Duration {
        let now = self.clock.now();
        let next_midnight = now
            .date_naive()
            .succ_opt()
            .map(|d| d.and_time(NaiveTime::MIN));

        match next_midnight.and_then(|dt| Local.from_local_datetime(&dt).single()) {
            Some(target) => (target - now)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(60)),
            None => std::time::Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_parse() {
        let window = PublishWindow::parse("08:00-11:00").unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(window.end, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(window.span_secs(), 3 * 3600);
    }

    #[test]
    fn test_window_parse_rejects_malformed() {
        assert!(PublishWindow::parse("08:00").is_err());
        assert!(PublishWindow::parse("8am-11am").is_err());
        assert!(PublishWindow::parse("11:00-08:00").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TriggerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parse_windows().unwrap().len(), 4);
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        let config = TriggerConfig {
            windows: vec!["08:00-12:00".to_string(), "11:00-14:00".to_string()],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_windows_rejected() {
        let config = TriggerConfig { windows: vec![] };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fire_times_land_inside_windows() {
        let config = TriggerConfig::default();
        let windows = config.parse_windows().unwrap();

        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let times = config.fire_times(&mut rng).unwrap();
            assert_eq!(times.len(), windows.len());
            for (time, window) in times.iter().zip(&windows) {
                assert!(*time >= window.start && *time < window.end, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_fire_times_deterministic_for_seed() {
        let config = TriggerConfig::default();

        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(
            config.fire_times(&mut rng_a).unwrap(),
            config.fire_times(&mut rng_b).unwrap()
        );
    }
}
