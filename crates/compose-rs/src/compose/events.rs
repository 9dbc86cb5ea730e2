//! Events emitted during a composition run, and observers for them.
//!
//! The [`Composer`](super::executor::Composer) reports each step of a run
//! through [`CompositionEvent`]s. Implement [`CompositionObserver`] to feed
//! them into metrics, audit logs or test assertions.
//!
//! | Observer | Use case |
//! |----------|----------|
//! | [`LoggingObserver`] | Structured logging via `tracing` (the default) |
//! | [`NoopObserver`] | Silence, e.g. in benchmarks |
//! | [`CompositeObserver`] | Fan out to several observers in order |

use std::time::Duration;

use tracing::{debug, info};

use super::activation::ActivationReason;

#[derive(Debug)]
pub enum CompositionEvent<'a> {
    /// A run is starting with this many sections in resolved order.
    RunStarted { sections: usize },
    /// A section activated and stored its transformed value.
    SectionActivated {
        id: &'a str,
        output_key: &'a str,
        reason: &'a ActivationReason,
    },
    /// A section did not activate; `stored` is false when its key is omitted.
    SectionSkipped {
        id: &'a str,
        reason: &'a ActivationReason,
        stored: bool,
    },
    /// A transform named by a section is not registered.
    TransformMissing { id: &'a str, transform: &'a str },
    /// The document is assembled.
    RunFinished {
        activated: usize,
        skipped: usize,
        elapsed: Duration,
    },
}

pub trait CompositionObserver: Send + Sync {
    fn on_event(&self, event: &CompositionEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopObserver;

impl CompositionObserver for NoopObserver {}

/// Logs every event through `tracing`.
pub struct LoggingObserver;

impl CompositionObserver for LoggingObserver {
    fn on_event(&self, event: &CompositionEvent<'_>) {
        match event {
            CompositionEvent::RunStarted { sections } => {
                debug!("[compose] starting run with {sections} section(s)");
            }
            CompositionEvent::SectionActivated { id, output_key, reason } => {
                debug!("[compose] {id} -> {output_key} ({reason})");
            }
            CompositionEvent::SectionSkipped { id, reason, stored } => {
                debug!(
                    "[compose] {id} skipped ({reason}){}",
                    if *stored { "" } else { ", key omitted" }
                );
            }
            CompositionEvent::TransformMissing { id, transform } => {
                // The chain executor already logs this at error level.
                debug!("[compose] {id}: passed through missing transform '{transform}'");
            }
            CompositionEvent::RunFinished {
                activated,
                skipped,
                elapsed,
            } => {
                info!(
                    "[compose] done: {activated} activated, {skipped} skipped in {:.1}ms",
                    elapsed.as_secs_f64() * 1000.0
                );
            }
        }
    }
}

/// Dispatches each event to every inner observer in registration order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Box<dyn CompositionObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl CompositionObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

impl CompositionObserver for CompositeObserver {
    fn on_event(&self, event: &CompositionEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
