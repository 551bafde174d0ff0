//! Monitoring engine.
//!
//! [`MonitorEngine`] owns the per-target state and is the only writer of it:
//! the periodic sweep loop feeds probe results through the transition rule
//! and emits alerts on edges. [`StatusChecker`] is a cheap, cloneable view
//! used for on-demand status queries; it probes under a hard deadline and
//! never reads or writes the tracked state.

pub mod report;
pub mod state;
pub mod target;

use crate::notify::Notifier;
use crate::probe::TargetProber;
use crate::utils::errors::{Result, WatchError};
use futures_util::future::join_all;
use futures_util::FutureExt;
use report::SweepResult;
use state::{TargetState, Transition};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use target::Target;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-kind probe timeouts used by the sweep loop.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimeouts {
    pub port: Duration,
    pub endpoint: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            port: Duration::from_secs(2),
            endpoint: Duration::from_secs(5),
        }
    }
}

impl ProbeTimeouts {
    fn for_target(&self, target: &Target) -> Duration {
        match target {
            Target::Port { .. } => self.port,
            Target::HttpEndpoint { .. } => self.endpoint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Down,
    Recovered,
}

/// An up/down edge detected by the sweep loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub target: Target,
    pub kind: AlertKind,
    pub host: String,
}

impl Alert {
    pub fn message(&self) -> String {
        match (&self.target, self.kind) {
            (Target::Port { label, .. }, AlertKind::Down) => {
                format!("@everyone ⚠️ {} on {} is DOWN!", label, self.host)
            }
            (Target::Port { label, .. }, AlertKind::Recovered) => {
                format!("{} on {} is back online", label, self.host)
            }
            (Target::HttpEndpoint { url }, AlertKind::Down) => {
                format!("@everyone ⚠️ API endpoint {} is DOWN!", url)
            }
            (Target::HttpEndpoint { url }, AlertKind::Recovered) => {
                format!("API endpoint {} is back online", url)
            }
        }
    }
}

/// Runs one probe, turning a panic inside the prober into `down`.
async fn guarded_probe(prober: &dyn TargetProber, target: &Target, timeout: Duration) -> bool {
    match AssertUnwindSafe(prober.probe(target, timeout)).catch_unwind().await {
        Ok(up) => up,
        Err(_) => {
            error!(service = %target, "Probe panicked, treating target as down");
            false
        }
    }
}

/// Read-only status queries against the monitored targets.
#[derive(Clone)]
pub struct StatusChecker {
    host: Arc<str>,
    targets: Arc<[Target]>,
    prober: Arc<dyn TargetProber>,
}

impl StatusChecker {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Probe every target concurrently and return within `timeout`.
    ///
    /// Probes still pending at the deadline are dropped and reported down.
    pub async fn snapshot(&self, timeout: Duration) -> SweepResult {
        let deadline = tokio::time::Instant::now() + timeout;
        let prober = &*self.prober;

        let checks = self.targets.iter().map(|target| async move {
            match tokio::time::timeout_at(deadline, guarded_probe(prober, target, timeout)).await {
                Ok(up) => up,
                Err(_) => {
                    debug!(service = %target, "Probe still pending at deadline, counting as down");
                    false
                }
            }
        });
        let observations = join_all(checks).await;

        SweepResult::new(
            self.host.as_ref(),
            self.targets.iter().cloned().zip(observations).collect(),
        )
    }
}

/// Stateful edge-triggered monitor over a fixed, ordered target list.
pub struct MonitorEngine {
    checker: StatusChecker,
    timeouts: ProbeTimeouts,
    states: Vec<TargetState>,
}

impl MonitorEngine {
    /// Targets keep their declared order; duplicates are rejected.
    pub fn new(
        host: impl Into<String>,
        targets: Vec<Target>,
        prober: Arc<dyn TargetProber>,
        timeouts: ProbeTimeouts,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target) {
                return Err(WatchError::Config(format!("duplicate target: {target}")));
            }
        }

        let states = vec![TargetState::default(); targets.len()];
        let host: String = host.into();
        Ok(Self {
            checker: StatusChecker {
                host: Arc::from(host),
                targets: Arc::from(targets),
                prober,
            },
            timeouts,
            states,
        })
    }

    /// Handle for on-demand status queries. Does not share tracked state.
    pub fn checker(&self) -> StatusChecker {
        self.checker.clone()
    }

    pub fn targets(&self) -> &[Target] {
        self.checker.targets()
    }

    pub fn state(&self, target: &Target) -> Option<TargetState> {
        self.targets()
            .iter()
            .position(|t| t == target)
            .map(|i| self.states[i])
    }

    /// Probe all targets concurrently, then apply transitions in declared order.
    pub async fn sweep(&mut self) -> Vec<Alert> {
        let prober = &*self.checker.prober;
        let timeouts = self.timeouts;
        let observations = join_all(
            self.checker
                .targets
                .iter()
                .map(|target| guarded_probe(prober, target, timeouts.for_target(target))),
        )
        .await;

        let mut alerts = Vec::new();
        for ((target, state), up) in self
            .checker
            .targets
            .iter()
            .zip(self.states.iter_mut())
            .zip(observations)
        {
            let kind = match state.observe(up) {
                Transition::Baseline { up } => {
                    info!(service = %target, "Initial state: {}", if up { "UP" } else { "DOWN" });
                    continue;
                }
                Transition::Unchanged => continue,
                Transition::WentDown => AlertKind::Down,
                Transition::Recovered => AlertKind::Recovered,
            };
            alerts.push(Alert {
                target: target.clone(),
                kind,
                host: self.checker.host.to_string(),
            });
        }
        alerts
    }

    /// Sweep every `interval` until `cancel` fires, posting alerts to `destination`.
    pub async fn run_forever(
        mut self,
        interval: Duration,
        notifier: Arc<dyn Notifier>,
        destination: String,
        cancel: CancellationToken,
    ) {
        let labels: Vec<String> = self.targets().iter().map(|t| t.to_string()).collect();
        info!(
            host = %self.checker.host,
            interval_secs = interval.as_secs(),
            "Starting monitoring of {}",
            labels.join(", ")
        );

        loop {
            let iteration = AssertUnwindSafe(self.iteration(&*notifier, &destination)).catch_unwind();
            tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = iteration => {
                    if outcome.is_err() {
                        error!("Monitor iteration panicked, continuing with next sweep");
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Monitor stopped");
    }

    async fn iteration(&mut self, notifier: &dyn Notifier, destination: &str) {
        for alert in self.sweep().await {
            match alert.kind {
                AlertKind::Down => warn!(service = %alert.target, "Target went DOWN"),
                AlertKind::Recovered => info!(service = %alert.target, "Target recovered"),
            }
            if let Err(e) = notifier.notify(destination, &alert.message()).await {
                error!(service = %alert.target, error = %e, "Failed to deliver alert");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays a fixed up/down sequence per target; the last value repeats.
    struct ScriptedProber {
        script: Mutex<HashMap<Target, VecDeque<bool>>>,
    }

    impl ScriptedProber {
        fn new(script: Vec<(Target, Vec<bool>)>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|(t, seq)| (t, seq.into_iter().collect()))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl TargetProber for ScriptedProber {
        async fn probe(&self, target: &Target, _timeout: Duration) -> bool {
            let mut script = self.script.lock().unwrap();
            let seq = script.get_mut(target).expect("unscripted target");
            if seq.len() > 1 {
                seq.pop_front().unwrap()
            } else {
                seq.front().copied().unwrap_or(false)
            }
        }
    }

    /// Port 80 panics, port 81 never completes, everything else is up.
    struct MisbehavingProber;

    #[async_trait]
    impl TargetProber for MisbehavingProber {
        async fn probe(&self, target: &Target, _timeout: Duration) -> bool {
            match target {
                Target::Port { number: 80, .. } => panic!("probe blew up"),
                Target::Port { number: 81, .. } => std::future::pending().await,
                _ => true,
            }
        }
    }

    fn ssh() -> Target {
        Target::port(22, "SSH")
    }

    fn http() -> Target {
        Target::port(80, "HTTP")
    }

    fn engine(prober: impl TargetProber + 'static, targets: Vec<Target>) -> MonitorEngine {
        MonitorEngine::new("10.0.0.5", targets, Arc::new(prober), ProbeTimeouts::default()).unwrap()
    }

    fn messages(alerts: &[Alert]) -> Vec<String> {
        alerts.iter().map(Alert::message).collect()
    }

    #[tokio::test]
    async fn test_first_sweep_only_sets_baseline() {
        let prober = ScriptedProber::new(vec![(ssh(), vec![false]), (http(), vec![true])]);
        let mut engine = engine(prober, vec![ssh(), http()]);

        assert!(engine.sweep().await.is_empty());
        assert_eq!(engine.state(&ssh()).unwrap().last_known_up, Some(false));
        assert_eq!(engine.state(&http()).unwrap().last_known_up, Some(true));
    }

    #[tokio::test]
    async fn test_alert_sequence_follows_edges() {
        let prober = ScriptedProber::new(vec![
            (ssh(), vec![true, false, false, true]),
            (http(), vec![true, true, false, true]),
        ]);
        let mut engine = engine(prober, vec![ssh(), http()]);

        assert!(engine.sweep().await.is_empty());
        assert_eq!(
            messages(&engine.sweep().await),
            vec!["@everyone ⚠️ SSH on 10.0.0.5 is DOWN!"]
        );
        assert_eq!(
            messages(&engine.sweep().await),
            vec!["@everyone ⚠️ HTTP on 10.0.0.5 is DOWN!"]
        );
        assert_eq!(
            messages(&engine.sweep().await),
            vec![
                "SSH on 10.0.0.5 is back online",
                "HTTP on 10.0.0.5 is back online",
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_states_never_alert() {
        let prober = ScriptedProber::new(vec![
            (ssh(), vec![true, true, true, false, false, false]),
        ]);
        let mut engine = engine(prober, vec![ssh()]);

        let mut alerts = Vec::new();
        for _ in 0..6 {
            alerts.extend(engine.sweep().await);
        }
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Down);
    }

    #[tokio::test]
    async fn test_endpoint_alert_text() {
        let api = Target::endpoint("http://10.0.0.5/api");
        let prober = ScriptedProber::new(vec![(api.clone(), vec![true, false, true])]);
        let mut engine = engine(prober, vec![api]);

        engine.sweep().await;
        assert_eq!(
            messages(&engine.sweep().await),
            vec!["@everyone ⚠️ API endpoint http://10.0.0.5/api is DOWN!"]
        );
        assert_eq!(
            messages(&engine.sweep().await),
            vec!["API endpoint http://10.0.0.5/api is back online"]
        );
    }

    #[tokio::test]
    async fn test_panicking_probe_counts_as_down() {
        let mut engine = engine(MisbehavingProber, vec![ssh(), http()]);
        assert!(engine.sweep().await.is_empty());
        assert_eq!(engine.state(&http()).unwrap().last_known_up, Some(false));
        assert_eq!(engine.state(&ssh()).unwrap().last_known_up, Some(true));
    }

    #[tokio::test]
    async fn test_snapshot_respects_deadline() {
        let hung = Target::port(81, "Hung");
        let engine = engine(MisbehavingProber, vec![ssh(), http(), hung.clone()]);

        let started = std::time::Instant::now();
        let result = engine.checker().snapshot(Duration::from_millis(200)).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(result.is_up(&ssh()), Some(true));
        assert_eq!(result.is_up(&http()), Some(false));
        assert_eq!(result.is_up(&hung), Some(false));
        assert_eq!(result.header(), "🟡 2/3 services on 10.0.0.5 are down");
    }

    #[tokio::test]
    async fn test_snapshot_leaves_tracked_state_alone() {
        let prober = ScriptedProber::new(vec![(ssh(), vec![true, false, false])]);
        let mut engine = engine(prober, vec![ssh()]);

        engine.sweep().await;
        let result = engine.checker().snapshot(Duration::from_secs(1)).await;
        assert_eq!(result.is_up(&ssh()), Some(false));
        assert_eq!(engine.state(&ssh()).unwrap().last_known_up, Some(true));

        // The loop still sees the edge itself.
        assert_eq!(engine.sweep().await.len(), 1);
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let prober = Arc::new(ScriptedProber::new(Vec::new()));
        let result = MonitorEngine::new(
            "h",
            vec![Target::port(22, "SSH"), Target::port(22, "Other")],
            prober,
            ProbeTimeouts::default(),
        );
        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_delivers_alerts_in_order() {
        let prober = ScriptedProber::new(vec![
            (ssh(), vec![true, false, false, true]),
            (http(), vec![true, true, true, true]),
        ]);
        let engine = engine(prober, vec![ssh(), http()]);
        let notifier = Arc::new(RecordingNotifier::default());

        // Sweeps run at t = 0, 60, 120 and 180 seconds.
        let run = engine.run_forever(
            Duration::from_secs(60),
            notifier.clone(),
            "alerts".to_string(),
            CancellationToken::new(),
        );
        assert!(tokio::time::timeout(Duration::from_secs(200), run).await.is_err());

        assert_eq!(
            notifier.texts(),
            vec![
                "@everyone ⚠️ SSH on 10.0.0.5 is DOWN!",
                "SSH on 10.0.0.5 is back online",
            ]
        );
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_cancel() {
        let prober = ScriptedProber::new(vec![(ssh(), vec![true])]);
        let engine = engine(prober, vec![ssh()]);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(engine.run_forever(
            Duration::from_secs(3600),
            Arc::new(RecordingNotifier::default()),
            "alerts".to_string(),
            cancel.clone(),
        ));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
