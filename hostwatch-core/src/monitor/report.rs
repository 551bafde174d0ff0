//! Aggregated result of probing every target once.

use super::target::Target;
use serde::Serialize;

/// Per-sweep aggregate. Built fresh for every call and never shared.
#[derive(Debug, Clone)]
pub struct SweepResult {
    host: String,
    results: Vec<(Target, bool)>,
}

/// Serializable summary handed to the command surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub header: String,
    pub lines: Vec<String>,
    pub up: usize,
    pub down: usize,
    pub text: String,
}

impl SweepResult {
    /// `results` must already be in declared target order.
    pub fn new(host: impl Into<String>, results: Vec<(Target, bool)>) -> Self {
        Self {
            host: host.into(),
            results,
        }
    }

    pub fn results(&self) -> &[(Target, bool)] {
        &self.results
    }

    pub fn is_up(&self, target: &Target) -> Option<bool> {
        self.results
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, up)| *up)
    }

    pub fn up_count(&self) -> usize {
        self.results.iter().filter(|(_, up)| *up).count()
    }

    pub fn down_count(&self) -> usize {
        self.results.len() - self.up_count()
    }

    pub fn header(&self) -> String {
        let total = self.results.len();
        let down = self.down_count();
        if down == 0 {
            format!("🟢 All services on {} are operational", self.host)
        } else if down == total {
            format!("🔴 All services on {} are down!", self.host)
        } else {
            format!("🟡 {}/{} services on {} are down", down, total, self.host)
        }
    }

    pub fn status_lines(&self) -> Vec<String> {
        self.results
            .iter()
            .map(|(target, up)| {
                let status = if *up { "✅ UP" } else { "❌ DOWN" };
                format!("{}: {}", target.label(), status)
            })
            .collect()
    }

    /// Header followed by one status line per target.
    pub fn render(&self) -> String {
        let mut text = self.header();
        for line in self.status_lines() {
            text.push('\n');
            text.push_str(&line);
        }
        text
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            header: self.header(),
            lines: self.status_lines(),
            up: self.up_count(),
            down: self.down_count(),
            text: self.render(),
        }
    }
}
