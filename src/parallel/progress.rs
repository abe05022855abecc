use crate::batch::types::{WorkItem, WorkOutcome};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Hooks invoked by the dispatcher's coordinator
///
/// Both hooks run on the coordinating thread, never on a worker, so
/// implementations only see one call at a time.
pub trait DispatchObserver {
    /// A worker was assigned `item` in `slot`
    fn item_started(&self, _slot: usize, _item: &WorkItem) {}

    /// The outcome for an item was recorded and its slot released
    fn item_finished(&self, _outcome: &WorkOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug)]
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {}

/// Terminal progress bar with the names currently in flight
pub struct ProgressObserver {
    bar: ProgressBar,
    in_flight: Mutex<Vec<(usize, String)>>,
    failed: AtomicUsize,
}

impl ProgressObserver {
    pub fn new(total_items: usize) -> Self {
        let style = ProgressStyle::with_template(
            "🖼  [{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} images {spinner} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::with_draw_target(Some(total_items as u64), ProgressDrawTarget::stderr());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            bar,
            in_flight: Mutex::new(Vec::new()),
            failed: AtomicUsize::new(0),
        }
    }

    /// Progress bar that never draws
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            in_flight: Mutex::new(Vec::new()),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn refresh_message(&self) {
        let names: Vec<String> = self
            .in_flight
            .lock()
            .map(|in_flight| in_flight.iter().map(|(_, name)| name.clone()).collect())
            .unwrap_or_default();
        let failed = self.failed.load(Ordering::Relaxed);

        let mut message = format!("active: {}", names.join(", "));
        if failed > 0 {
            message.push_str(&format!(" | failed: {failed}"));
        }
        self.bar.set_message(message);
    }
}

impl DispatchObserver for ProgressObserver {
    fn item_started(&self, slot: usize, item: &WorkItem) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.push((slot, item.name.clone()));
        }
        self.refresh_message();
    }

    fn item_finished(&self, outcome: &WorkOutcome) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.retain(|(slot, _)| *slot != outcome.slot);
        }
        if !outcome.succeeded() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.bar.inc(1);
        self.refresh_message();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::OutcomeStatus;
    use crate::error::{ItemError, Stage};

    #[test]
    fn test_progress_observer_tracks_in_flight() {
        let observer = ProgressObserver::hidden();
        observer.item_started(0, &WorkItem::new("/in/a.jpg", "a"));
        observer.item_started(1, &WorkItem::new("/in/b.jpg", "b"));
        observer.item_finished(&WorkOutcome {
            name: "a".to_string(),
            status: OutcomeStatus::Succeeded,
            slot: 0,
            elapsed: Duration::from_millis(3),
        });

        let in_flight = observer.in_flight.lock().unwrap();
        assert_eq!(in_flight.as_slice(), &[(1, "b".to_string())]);
        assert_eq!(observer.bar.position(), 1);
        drop(in_flight);
        observer.finish();
    }

    #[test]
    fn test_progress_observer_counts_failures() {
        let observer = ProgressObserver::hidden();
        for (slot, name) in ["a", "b", "c"].into_iter().enumerate() {
            observer.item_started(slot, &WorkItem::new(format!("/in/{name}.jpg"), name));
        }
        let finished = |name: &str, slot, status| WorkOutcome {
            name: name.to_string(),
            status,
            slot,
            elapsed: Duration::from_millis(1),
        };
        let failure = || OutcomeStatus::Failed(ItemError::new(Stage::Decode, "bad header"));
        observer.item_finished(&finished("a", 0, failure()));
        observer.item_finished(&finished("b", 1, OutcomeStatus::Succeeded));
        observer.item_finished(&finished("c", 2, failure()));

        assert_eq!(observer.failed.load(Ordering::Relaxed), 2);
        assert_eq!(observer.bar.position(), 3);
        assert!(observer.in_flight.lock().unwrap().is_empty());
    }
}
