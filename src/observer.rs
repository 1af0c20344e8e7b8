//! Callback contract between the scan coordinator and its presentation layer.
//!
//! The coordinator invokes observer methods one at a time, never concurrently,
//! from whichever task is running [`ScanCoordinator::scan`](crate::scanner::ScanCoordinator::scan).
//! No particular thread is guaranteed. A UI that must touch its state from its
//! own thread should hand events off, e.g. with [`ChannelObserver`].

use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::PortResult;

pub trait ScanObserver: Send {
    /// One call per completed probe. `percentage` never decreases within a scan.
    fn on_progress(&mut self, port: u16, percentage: f64);

    /// One call per open or open|filtered port, in completion order.
    fn on_result(&mut self, result: &PortResult);

    /// Exactly once, and only when the scan ran to completion without being
    /// cancelled. `results` is sorted by port.
    fn on_complete(&mut self, results: &[PortResult]);

    /// A single probe task failed unexpectedly. The scan keeps going.
    fn on_error(&mut self, message: &str);
}

/// Ignores every event.
impl ScanObserver for () {
    fn on_progress(&mut self, _port: u16, _percentage: f64) {}
    fn on_result(&mut self, _result: &PortResult) {}
    fn on_complete(&mut self, _results: &[PortResult]) {}
    fn on_error(&mut self, _message: &str) {}
}

impl<O: ScanObserver + ?Sized> ScanObserver for &mut O {
    fn on_progress(&mut self, port: u16, percentage: f64) {
        (**self).on_progress(port, percentage)
    }
    fn on_result(&mut self, result: &PortResult) {
        (**self).on_result(result)
    }
    fn on_complete(&mut self, results: &[PortResult]) {
        (**self).on_complete(results)
    }
    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }
}

/// Observer callbacks as data.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress { port: u16, percentage: f64 },
    Result(PortResult),
    Complete { results: Vec<PortResult> },
    Error { message: String },
}

/// Forwards every callback as a [`ScanEvent`] over an unbounded channel.
///
/// Sending never blocks the scan loop; events are dropped silently once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }
}

impl ScanObserver for ChannelObserver {
    fn on_progress(&mut self, port: u16, percentage: f64) {
        self.send(ScanEvent::Progress { port, percentage });
    }

    fn on_result(&mut self, result: &PortResult) {
        self.send(ScanEvent::Result(result.clone()));
    }

    fn on_complete(&mut self, results: &[PortResult]) {
        self.send(ScanEvent::Complete {
            results: results.to_vec(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.send(ScanEvent::Error {
            message: message.to_string(),
        });
    }
}

/// Keeps every event in memory, in callback order.
impl ScanObserver for Vec<ScanEvent> {
    fn on_progress(&mut self, port: u16, percentage: f64) {
        self.push(ScanEvent::Progress { port, percentage });
    }

    fn on_result(&mut self, result: &PortResult) {
        self.push(ScanEvent::Result(result.clone()));
    }

    fn on_complete(&mut self, results: &[PortResult]) {
        self.push(ScanEvent::Complete {
            results: results.to_vec(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.push(ScanEvent::Error {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PortState, Protocol};

    fn sample() -> PortResult {
        PortResult {
            port: 22,
            protocol: Protocol::Tcp,
            service: "SSH (Secure Shell)".into(),
            state: PortState::Open,
        }
    }

    #[test]
    fn channel_observer_forwards_in_order() {
        let (mut obs, mut rx) = ChannelObserver::new();
        obs.on_progress(22, 50.0);
        obs.on_result(&sample());
        obs.on_complete(&[sample()]);
        obs.on_error("boom");

        assert_eq!(
            rx.try_recv().unwrap(),
            ScanEvent::Progress {
                port: 22,
                percentage: 50.0
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ScanEvent::Result(sample()));
        assert!(matches!(rx.try_recv().unwrap(), ScanEvent::Complete { results } if results.len() == 1));
        assert!(matches!(rx.try_recv().unwrap(), ScanEvent::Error { message } if message == "boom"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_observer_survives_dropped_receiver() {
        let (mut obs, rx) = ChannelObserver::new();
        drop(rx);
        obs.on_progress(1, 100.0);
    }

    #[test]
    fn event_json_is_tagged() {
        let json = serde_json::to_value(ScanEvent::Result(sample())).unwrap();
        assert_eq!(json["event"], "result");
        assert_eq!(json["state"], "open");
        assert_eq!(json["protocol"], "tcp");
    }
}
