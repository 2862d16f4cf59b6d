//! Bounded-concurrency map over a list.
//!
//! A fixed number of workers drain one shared queue. Workers run as futures
//! on the calling task, so at most `concurrency` calls to `f` are in flight.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::future::join_all;

use crate::session::lock;

/// Result of one item in a [`bounded_map`] run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R, E> {
    Done(R),
    Failed(E),
    /// Never started because an earlier failure halted the run.
    NotRun,
}

impl<R, E> Outcome<R, E> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

/// Apply `f` to every item with at most `concurrency` calls in flight.
///
/// Outcomes come back in input order. With `isolate_failures` a failed item
/// does not affect the others; without it, workers stop taking new items
/// after the first failure and untouched items report [`Outcome::NotRun`].
pub async fn bounded_map<T, R, E, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    isolate_failures: bool,
    f: F,
) -> Vec<Outcome<R, E>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let total = items.len();
    let queue = Mutex::new(items.into_iter().enumerate().collect::<VecDeque<_>>());
    let halted = AtomicBool::new(false);
    let workers = concurrency.max(1).min(total.max(1));

    let queue = &queue;
    let halted = &halted;
    let f = &f;
    let worker = move || async move {
        let mut finished = Vec::new();
        loop {
            if halted.load(Ordering::SeqCst) {
                break;
            }
            let next = lock(queue).pop_front();
            let Some((idx, item)) = next else {
                break;
            };
            match f(item).await {
                Ok(value) => finished.push((idx, Outcome::Done(value))),
                Err(e) => {
                    if !isolate_failures {
                        halted.store(true, Ordering::SeqCst);
                    }
                    finished.push((idx, Outcome::Failed(e)));
                }
            }
        }
        finished
    };

    let mut outcomes: Vec<Outcome<R, E>> = (0..total).map(|_| Outcome::NotRun).collect();
    for (idx, outcome) in join_all((0..workers).map(|_| worker()))
        .await
        .into_iter()
        .flatten()
    {
        outcomes[idx] = outcome;
    }
    outcomes
}
