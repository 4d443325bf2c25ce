#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use warmdag::stage::{FnStageable, StageError, StageHandler, Stageable};

/// Lifecycle events observed by a [`Recorder`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Outcome reported to the [`Recorder`] through `StageHandler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(String),
    Interrupted,
    Panicked(String),
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    active: HashSet<String>,
    /// Unordered pairs of subjects that were running at the same time.
    overlaps: BTreeSet<(String, String)>,
    outcomes: Vec<(String, Outcome)>,
}

/// Synchronized test harness that is both the `StageHandler` of a run and
/// the witness of when each recorded stageable was running.
#[derive(Default)]
pub struct Recorder {
    state: Mutex<State>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start(&self, subject: &str) {
        let mut state = self.state.lock();
        let others: Vec<String> = state.active.iter().cloned().collect();
        for other in others {
            state.overlaps.insert(ordered_pair(subject, &other));
        }
        state.active.insert(subject.to_string());
        state.events.push(Event::Started(subject.to_string()));
    }

    pub fn finish(&self, subject: &str) {
        let mut state = self.state.lock();
        state.active.remove(subject);
        state.events.push(Event::Finished(subject.to_string()));
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn outcomes(&self) -> Vec<(String, Outcome)> {
        self.state.lock().outcomes.clone()
    }

    pub fn outcomes_for(&self, subject: &str) -> Vec<Outcome> {
        self.outcomes()
            .into_iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, o)| o)
            .collect()
    }

    /// Number of times `subject` started running.
    pub fn starts(&self, subject: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Started(s) if s == subject))
            .count()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|(_, o)| *o == Outcome::Success)
            .count()
    }

    /// `first` finished before `second` started.
    pub fn finished_before_started(&self, first: &str, second: &str) -> bool {
        let events = self.events();
        let finished = events
            .iter()
            .position(|e| matches!(e, Event::Finished(s) if s == first));
        let started = events
            .iter()
            .position(|e| matches!(e, Event::Started(s) if s == second));
        match (finished, started) {
            (Some(f), Some(s)) => f < s,
            _ => false,
        }
    }

    pub fn overlapped(&self, a: &str, b: &str) -> bool {
        self.state
            .lock()
            .overlaps
            .contains(&ordered_pair(a, b))
    }

    fn push_outcome(&self, subject: &str, outcome: Outcome) {
        self.state
            .lock()
            .outcomes
            .push((subject.to_string(), outcome));
    }
}

impl StageHandler for Recorder {
    fn on_success(&self, subject: &str) {
        self.push_outcome(subject, Outcome::Success);
    }

    fn on_error(&self, subject: &str, cause: &StageError) {
        let outcome = match cause {
            StageError::Failed(e) => Outcome::Failed(e.to_string()),
            StageError::Interrupted => Outcome::Interrupted,
            StageError::Panicked(msg) => Outcome::Panicked(msg.clone()),
        };
        self.push_outcome(subject, outcome);
    }
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Wrap `action` in a stageable that records its start and finish.
pub fn recorded<F, Fut>(subject: &str, recorder: &Arc<Recorder>, action: F) -> Arc<dyn Stageable>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let rec = Arc::clone(recorder);
    let name = subject.to_string();

    Arc::new(FnStageable::new(subject, move |token| {
        let rec = Arc::clone(&rec);
        let name = name.clone();
        let work = action(token);
        async move {
            rec.start(&name);
            let result = work.await;
            rec.finish(&name);
            result
        }
    }))
}

/// A recorded stageable that sleeps for `ms` and succeeds.
pub fn sleeper(subject: &str, recorder: &Arc<Recorder>, ms: u64) -> Arc<dyn Stageable> {
    recorded(subject, recorder, move |_| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    })
}
