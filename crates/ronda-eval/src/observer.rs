//! Period-level observability hooks.
//!
//! The orchestrator reports progress through a [`BacktestObserver`]
//! instead of printing: callers subscribe to events, the default observer
//! is silent, and [`LogObserver`] forwards everything to the `log` crate.

use ronda_traits::Date;

/// A progress event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktestEvent {
    /// The run started with this many evaluable periods.
    Started {
        /// Number of rebalance periods scheduled.
        periods: usize,
    },
    /// One period finished evaluating.
    PeriodEvaluated {
        /// The rebalance date.
        date: Date,
        /// The period's rank correlation, if it survived.
        ic: Option<f64>,
        /// Valid instrument count used for the correlation.
        n_valid: usize,
    },
    /// A period's statistic was degraded to missing.
    PeriodDegraded {
        /// The rebalance date.
        date: Date,
        /// Why the period degraded.
        reason: String,
    },
    /// The run finished.
    Finished {
        /// Total periods evaluated.
        periods: usize,
        /// Periods degraded to missing.
        degraded: usize,
    },
}

/// Receives period-level events during a run. Implementations must be
/// thread-safe: events arrive from parallel period workers.
pub trait BacktestObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &BacktestEvent);
}

/// Ignores every event. The default when the caller does not subscribe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl BacktestObserver for NullObserver {
    fn on_event(&self, _event: &BacktestEvent) {}
}

/// Forwards events to the `log` crate: run lifecycle at info, period
/// detail at debug, degradations at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl BacktestObserver for LogObserver {
    fn on_event(&self, event: &BacktestEvent) {
        match event {
            BacktestEvent::Started { periods } => {
                log::info!("backtest started: {periods} rebalance periods");
            }
            BacktestEvent::PeriodEvaluated { date, ic, n_valid } => {
                log::debug!("period {date}: ic={ic:?} n_valid={n_valid}");
            }
            BacktestEvent::PeriodDegraded { date, reason } => {
                log::warn!("period {date} degraded: {reason}");
            }
            BacktestEvent::Finished { periods, degraded } => {
                log::info!("backtest finished: {periods} periods, {degraded} degraded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<BacktestEvent>>,
    }

    impl BacktestObserver for Recording {
        fn on_event(&self, event: &BacktestEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_observers_are_object_safe() {
        let observers: Vec<Box<dyn BacktestObserver>> =
            vec![Box::new(NullObserver), Box::new(LogObserver)];
        for observer in &observers {
            observer.on_event(&BacktestEvent::Started { periods: 3 });
        }
    }

    #[test]
    fn test_recording_observer_sees_events() {
        let recording = Recording::default();
        recording.on_event(&BacktestEvent::Finished {
            periods: 5,
            degraded: 1,
        });
        assert_eq!(recording.events.lock().unwrap().len(), 1);
    }
}
