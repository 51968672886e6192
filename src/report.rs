//! Rendering and aggregation of completed sessions
//!
//! The marker format prints one line per session: the server session id,
//! then `+` for every confirmed event and `-` for every failed one, followed
//! by a [`RunSummary`]. The JSON format emits sessions and summary verbatim.

use crate::domain::CompletedSession;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CONFIRMED_MARKER: char = '+';
const FAILED_MARKER: char = '-';
const CONFIRMED_STYLE: &str = "\x1b[42;30m";
const FAILED_STYLE: &str = "\x1b[41;37;1m";
const RESET: &str = "\x1b[0m";
const NO_SESSION_ID: &str = "-";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markers,
    Json,
}

/// Percentiles of one latency population, in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort();
        let len = samples.len();
        let at = |position: usize| millis(samples[position.min(len - 1)]);
        Some(Self {
            samples: len,
            p50_ms: at(len / 2),
            p95_ms: at(len * 95 / 100),
            p99_ms: at(len * 99 / 100),
            max_ms: at(len - 1),
        })
    }
}

fn millis(duration: Duration) -> f64 {
    match duration.num_microseconds() {
        Some(micros) => micros as f64 / 1000.0,
        None => duration.num_milliseconds() as f64,
    }
}

/// Aggregate view over every completed session of a run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub sessions: usize,
    pub registered: usize,
    pub events: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Failed events grouped by error kind
    pub failures: BTreeMap<String, usize>,
    /// Failed sessions grouped by error
    pub session_failures: BTreeMap<String, usize>,
    pub submit_latency: Option<LatencyStats>,
    pub poll_duration: Option<LatencyStats>,
    pub recorded_lag: Option<LatencyStats>,
}

impl RunSummary {
    pub fn from_sessions(sessions: &[CompletedSession]) -> Self {
        let mut failures = BTreeMap::new();
        let mut session_failures = BTreeMap::new();
        let mut submit_latency = Vec::new();
        let mut poll_duration = Vec::new();
        let mut recorded_lag = Vec::new();
        let mut events = 0;
        let mut confirmed = 0;

        for session in sessions {
            if let Some(error) = session.error() {
                *session_failures.entry(error.to_string()).or_insert(0) += 1;
            }
            for outcome in session.events() {
                events += 1;
                match outcome.error() {
                    None => confirmed += 1,
                    Some(error) => *failures.entry(error.label().to_string()).or_insert(0) += 1,
                }
                if let Some(submission) = outcome.submission() {
                    submit_latency.push(submission.latency());
                }
                if let Some(poll) = outcome.poll() {
                    poll_duration.push(poll.duration());
                }
                if let Some(lag) = outcome.recorded_lag() {
                    recorded_lag.push(lag);
                }
            }
        }

        Self {
            sessions: sessions.len(),
            registered: sessions.iter().filter(|s| s.error().is_none()).count(),
            events,
            confirmed,
            failed: events - confirmed,
            failures,
            session_failures,
            submit_latency: LatencyStats::from_samples(submit_latency),
            poll_duration: LatencyStats::from_samples(poll_duration),
            recorded_lag: LatencyStats::from_samples(recorded_lag),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    sessions: &'a [CompletedSession],
    summary: RunSummary,
}

#[derive(Clone, Copy, Debug)]
pub struct Reporter {
    format: ReportFormat,
    color: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, color: bool) -> Self {
        Self { format, color }
    }

    pub fn render(&self, sessions: &[CompletedSession]) -> Result<String, serde_json::Error> {
        match self.format {
            ReportFormat::Markers => Ok(self.render_markers(sessions)),
            ReportFormat::Json => serde_json::to_string_pretty(&JsonReport {
                sessions,
                summary: RunSummary::from_sessions(sessions),
            }),
        }
    }

    /// One marker line for a session
    pub fn render_session(&self, session: &CompletedSession) -> String {
        let mut line = match &session.session_id {
            Some(id) => format!("{id} | "),
            None => format!("{NO_SESSION_ID} | "),
        };
        for outcome in session.events() {
            let (marker, style) = if outcome.is_confirmed() {
                (CONFIRMED_MARKER, CONFIRMED_STYLE)
            } else {
                (FAILED_MARKER, FAILED_STYLE)
            };
            if self.color {
                line.push_str(style);
                line.push(marker);
                line.push_str(RESET);
            } else {
                line.push(marker);
            }
        }
        if let Some(error) = session.error() {
            line.push_str(&error.to_string());
        }
        if self.color {
            line.push_str(RESET);
        }
        line
    }

    fn render_markers(&self, sessions: &[CompletedSession]) -> String {
        let mut out = String::new();
        for session in sessions {
            out.push_str(&self.render_session(session));
            out.push('\n');
        }
        out.push_str(&render_summary(&RunSummary::from_sessions(sessions)));
        out
    }
}

fn render_summary(summary: &RunSummary) -> String {
    let mut headline = format!(
        "sessions: {} ({} registered) | events: {} | confirmed: {} | failed: {}",
        summary.sessions, summary.registered, summary.events, summary.confirmed, summary.failed
    );
    if !summary.failures.is_empty() {
        let kinds: Vec<String> = summary
            .failures
            .iter()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .collect();
        headline.push_str(&format!(" [{}]", kinds.join(", ")));
    }

    let mut lines = vec![headline];
    lines.extend(
        summary
            .session_failures
            .iter()
            .map(|(error, count)| format!("session failures: {count} x {error}")),
    );
    for (label, stats) in [
        ("submit latency", &summary.submit_latency),
        ("poll duration", &summary.poll_duration),
        ("recorded lag", &summary.recorded_lag),
    ] {
        if let Some(stats) = stats {
            lines.push(format!(
                "{label}: p50 {:.2}ms | p95 {:.2}ms | p99 {:.2}ms | max {:.2}ms ({} samples)",
                stats.p50_ms, stats.p95_ms, stats.p99_ms, stats.max_ms, stats.samples
            ));
        }
    }
    lines.join("\n")
}
