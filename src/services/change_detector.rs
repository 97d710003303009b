//! Periodic change detection for a single location.
//!
//! A [`ChangeDetector`] is idle until started. `start` seeds a baseline with
//! an immediate fetch and then refetches on a fixed interval. Every
//! successful, non-synthesized snapshot is compared against the baseline and
//! then becomes the new baseline, whether or not an alert fired.

use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::change::{ChangeAlert, ChangeEntry, ChangeField, ChangeReport, ChangeValue};
use crate::models::weather::{ConditionFamily, WeatherSnapshot};
use crate::services::error::WeatherError;

/// Per-field deltas at or above which a change is reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeThresholds {
    /// °C
    pub temperature_c: f64,
    /// Percentage points
    pub precipitation_pct: f64,
    /// mm, compared when a probability is missing on either side
    pub precipitation_mm: f64,
    /// km/h
    pub wind_speed_kmh: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            temperature_c: 3.0,
            precipitation_pct: 20.0,
            precipitation_mm: 2.0,
            wind_speed_kmh: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectorError {
    #[error("change detector is already monitoring")]
    AlreadyMonitoring,
}

/// Dry conditions share a group; each wet family is its own group.
fn condition_group(family: ConditionFamily) -> Option<u8> {
    match family {
        ConditionFamily::Clear | ConditionFamily::Cloudy | ConditionFamily::Fog => Some(0),
        ConditionFamily::Rain => Some(1),
        ConditionFamily::Storm => Some(2),
        ConditionFamily::Snow => Some(3),
        ConditionFamily::Unknown => None,
    }
}

fn numeric_entry(
    field: ChangeField,
    old: Option<f64>,
    new: Option<f64>,
    threshold: f64,
) -> Option<ChangeEntry> {
    let (old, new) = (old?, new?);
    let magnitude = (new - old).abs();
    (magnitude >= threshold).then_some(ChangeEntry {
        field,
        old_value: ChangeValue::Numeric(old),
        new_value: ChangeValue::Numeric(new),
        magnitude,
    })
}

/// Precipitation probability when both snapshots carry one, otherwise the
/// measured amount. Current conditions from most providers only report an
/// amount, and omit it when dry, so a missing amount counts as 0 mm as long
/// as the other side reports one.
fn precipitation_entry(
    baseline: &WeatherSnapshot,
    current: &WeatherSnapshot,
    thresholds: &ChangeThresholds,
) -> Option<ChangeEntry> {
    if let (Some(old), Some(new)) = (
        baseline.precipitation_probability,
        current.precipitation_probability,
    ) {
        return numeric_entry(
            ChangeField::PrecipitationProbability,
            Some(old),
            Some(new),
            thresholds.precipitation_pct,
        );
    }

    match (baseline.precipitation_mm, current.precipitation_mm) {
        (None, None) => None,
        (old, new) => numeric_entry(
            ChangeField::PrecipitationAmount,
            Some(old.unwrap_or(0.0)),
            Some(new.unwrap_or(0.0)),
            thresholds.precipitation_mm,
        ),
    }
}

/// Compare two snapshots field by field. Fields missing on either side are
/// skipped, except precipitation amounts.
pub fn compare_snapshots(
    baseline: &WeatherSnapshot,
    current: &WeatherSnapshot,
    thresholds: &ChangeThresholds,
) -> ChangeReport {
    let mut entries: Vec<ChangeEntry> = [
        numeric_entry(
            ChangeField::Temperature,
            Some(baseline.temperature_c),
            Some(current.temperature_c),
            thresholds.temperature_c,
        ),
        precipitation_entry(baseline, current, thresholds),
        numeric_entry(
            ChangeField::WindSpeed,
            baseline.wind_speed_kmh,
            current.wind_speed_kmh,
            thresholds.wind_speed_kmh,
        ),
    ]
    .into_iter()
    .flatten()
    .collect();

    let (old_family, new_family) = (baseline.condition_family(), current.condition_family());
    if let (Some(old_group), Some(new_group)) =
        (condition_group(old_family), condition_group(new_family))
    {
        if old_group != new_group {
            entries.push(ChangeEntry {
                field: ChangeField::Condition,
                old_value: ChangeValue::Condition(old_family),
                new_value: ChangeValue::Condition(new_family),
                magnitude: 1.0,
            });
        }
    }

    ChangeReport { entries }
}

struct Running {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Inner {
    running: Option<Running>,
    baseline: Option<WeatherSnapshot>,
}

/// State shared between the detector and its polling task.
struct Core {
    thresholds: ChangeThresholds,
    inner: Mutex<Inner>,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a snapshot unless `token` has been cancelled in the meantime.
    fn observe(&self, snapshot: WeatherSnapshot, token: Option<&CancellationToken>) -> Option<ChangeAlert> {
        let mut inner = self.lock();
        if token.is_some_and(CancellationToken::is_cancelled) {
            return None;
        }
        if snapshot.is_fallback {
            debug!(target: "weather_alert", location = %snapshot.location_name, "Ignoring synthesized snapshot");
            return None;
        }

        let report = inner
            .baseline
            .as_ref()
            .map(|baseline| compare_snapshots(baseline, &snapshot, &self.thresholds));
        let location_name = snapshot.location_name.clone();
        inner.baseline = Some(snapshot);

        match report {
            Some(report) if !report.is_empty() => Some(ChangeAlert {
                location_name,
                detected_at: Utc::now(),
                report,
            }),
            _ => None,
        }
    }
}

/// Watches one location and emits a [`ChangeAlert`] when conditions shift.
pub struct ChangeDetector {
    core: Arc<Core>,
}

impl ChangeDetector {
    pub fn new(thresholds: ChangeThresholds) -> Self {
        Self {
            core: Arc::new(Core {
                thresholds,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub fn thresholds(&self) -> ChangeThresholds {
        self.core.thresholds
    }

    pub fn is_monitoring(&self) -> bool {
        self.core.lock().running.is_some()
    }

    pub fn baseline(&self) -> Option<WeatherSnapshot> {
        self.core.lock().baseline.clone()
    }

    /// Feed one snapshot by hand. Returns the alert it triggers, if any.
    pub fn observe(&self, snapshot: WeatherSnapshot) -> Option<ChangeAlert> {
        self.core.observe(snapshot, None)
    }

    /// Seed the baseline with an immediate fetch, then poll every `interval`
    /// and send alerts to `alerts`. Polling ends on [`stop`](Self::stop), on
    /// drop, or when the receiver goes away.
    pub async fn start<F, Fut>(
        &self,
        fetch: F,
        interval: Duration,
        alerts: mpsc::Sender<ChangeAlert>,
    ) -> Result<(), DetectorError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WeatherSnapshot, WeatherError>> + Send + 'static,
    {
        let token = {
            let mut inner = self.core.lock();
            if inner.running.is_some() {
                return Err(DetectorError::AlreadyMonitoring);
            }
            let token = CancellationToken::new();
            inner.running = Some(Running {
                token: token.clone(),
                task: None,
            });
            token
        };

        match fetch().await {
            Ok(snapshot) => {
                self.core.observe(snapshot, Some(&token));
            }
            Err(error) => warn!(target: "weather_alert", error = %error, "Initial fetch failed, waiting for next tick"),
        }

        let core = Arc::clone(&self.core);
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let snapshot = match fetch().await {
                    Ok(snapshot) => snapshot,
                    Err(error) => {
                        warn!(target: "weather_alert", error = %error, "Change detection fetch failed");
                        continue;
                    }
                };

                if let Some(alert) = core.observe(snapshot, Some(&task_token)) {
                    info!(
                        target: "weather_alert",
                        location = %alert.location_name,
                        changes = alert.report.entries.len(),
                        "Weather change detected"
                    );
                    if alerts.send(alert).await.is_err() {
                        break;
                    }
                }
            }
            debug!(target: "weather_alert", "Change detection stopped");
        });

        let mut inner = self.core.lock();
        match inner.running.as_mut() {
            Some(running) if !token.is_cancelled() => running.task = Some(task),
            // stopped while seeding
            _ => task.abort(),
        }
        Ok(())
    }

    /// Cancel polling and discard the baseline. Safe to call at any time.
    pub fn stop(&self) {
        let mut inner = self.core.lock();
        if let Some(running) = inner.running.take() {
            running.token.cancel();
            if let Some(task) = running.task {
                task.abort();
            }
        }
        inner.baseline = None;
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        self.stop();
    }
}
