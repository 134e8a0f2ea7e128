//! Link metrics.
//!
//! Recording sites use the `name` of these consts with the `metrics` facade
//! macros; `describe_metrics()` publishes their descriptions once a recorder
//! is installed. Units default to a plain count.
//!
//! ```rust
//! use mcc_link::metrics::{Metric, MetricKind, FRAMES_RX};
//!
//! assert_eq!(FRAMES_RX.name, "mcc.link.frames_rx");
//! assert_eq!(FRAMES_RX.kind, MetricKind::Counter);
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Name, kind and description of one link metric.
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys recorded alongside the value.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(kind: MetricKind, name: &'static str, description: &'static str) -> Self {
        Metric {
            name,
            kind,
            description,
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str, description: &'static str) -> Self {
        Self::new(MetricKind::Counter, name, description)
    }

    pub const fn gauge(name: &'static str, description: &'static str) -> Self {
        Self::new(MetricKind::Gauge, name, description)
    }

    pub const fn histogram(name: &'static str, description: &'static str) -> Self {
        Self::new(MetricKind::Histogram, name, description)
    }

    pub const fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Publishes the description to the installed recorder, if any.
    pub fn describe(&self) {
        let unit = self.unit.unwrap_or(Unit::Count);
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, unit, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, unit, self.description),
            MetricKind::Histogram => describe_histogram!(self.name, unit, self.description),
        }
    }
}

/// Labelled by frame name.
pub const FRAMES_RX: Metric =
    Metric::counter("mcc.link.frames_rx", "Frames received from the device").labels(&["frame"]);

/// Labelled by frame name.
pub const FRAMES_TX: Metric =
    Metric::counter("mcc.link.frames_tx", "Frames sent to the device").labels(&["frame"]);

/// Envelope headers included.
pub const BYTES_TX: Metric =
    Metric::counter("mcc.link.bytes_tx", "Bytes written to the transport").unit(Unit::Bytes);

pub const BYTES_RX: Metric =
    Metric::counter("mcc.link.bytes_rx", "Bytes read from the transport").unit(Unit::Bytes);

pub const FRAMING_ERRORS: Metric = Metric::counter(
    "mcc.link.framing_errors",
    "Inbound envelopes or payloads discarded as undecodable",
);

pub const PUSHES: Metric =
    Metric::counter("mcc.link.pushes", "Push notifications dispatched").labels(&["frame"]);

pub const RESPONSES_QUEUED: Metric = Metric::counter(
    "mcc.link.responses_queued",
    "Responses that arrived with no waiter and were queued",
);

pub const QUEUE_DEPTH: Metric =
    Metric::gauge("mcc.link.queue_depth", "Unclaimed responses in the queue");

pub const TIMEOUTS: Metric =
    Metric::counter("mcc.link.timeouts", "Response waits that timed out");

pub const MISMATCHES: Metric = Metric::counter(
    "mcc.link.mismatches",
    "Response waits failed by a response with an unexpected code",
);

/// From waiter registration to resolution.
pub const RESPONSE_LATENCY: Metric = Metric::histogram(
    "mcc.link.response_latency_ms",
    "Time spent waiting for a matching response",
)
.unit(Unit::Milliseconds);

pub const ALL: &[Metric] = &[
    FRAMES_RX,
    FRAMES_TX,
    BYTES_TX,
    BYTES_RX,
    FRAMING_ERRORS,
    PUSHES,
    RESPONSES_QUEUED,
    QUEUE_DEPTH,
    TIMEOUTS,
    MISMATCHES,
    RESPONSE_LATENCY,
];

/// Describes every link metric to the installed recorder.
pub fn describe_metrics() {
    for metric in ALL {
        metric.describe();
    }
}
