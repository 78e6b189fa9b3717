use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::{DispatchError, Result};

/// What one worker reports for one item: the result, or the failure text.
pub(crate) type Outcome<T> = (usize, std::result::Result<T, String>);

/// Runs `f` over every item on a fixed-size pool of scoped threads.
///
/// Item indices are queued up front; each is received by exactly one worker.
/// A panic inside `f` is caught and reported as that item's failure, so the
/// worker keeps draining the queue. Returns only after every worker joined.
pub(crate) fn run_pool<I, T, F>(
    stage: &str,
    items: &[I],
    worker_count: usize,
    f: &F,
) -> std::result::Result<Vec<Outcome<T>>, DispatchError>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync,
{
    let (job_sender, job_receiver) = unbounded::<usize>();
    let (result_sender, result_receiver) = unbounded::<Outcome<T>>();

    for index in 0..items.len() {
        // The receiver is alive, so this cannot fail
        let _ = job_sender.send(index);
    }
    // Workers exit once the queue is empty
    drop(job_sender);

    let spawned = thread::scope(|scope| {
        let mut workers = Vec::with_capacity(worker_count);
        let mut spawn_error = None;

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let spawn = thread::Builder::new()
                .name(format!("{}-worker-{}", stage, worker_id))
                .spawn_scoped(scope, move || run_worker(worker_id, items, job_rx, result_tx, f));

            match spawn {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!("{}: failed to spawn worker {}: {}", stage, worker_id, e);
                    spawn_error = Some(DispatchError::SpawnFailed(e.to_string()));
                    break;
                }
            }
        }

        info!("{}: started {} workers", stage, workers.len());

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("{}: worker {} panicked: {}", stage, i, panic_message(&*e));
            } else {
                debug!("{}: worker {} finished", stage, i);
            }
        }

        spawn_error
    });

    // Results are read only after the join
    drop(result_sender);
    let outcomes: Vec<Outcome<T>> = result_receiver.try_iter().collect();

    match spawned {
        // With no worker running nothing was computed; anything less is still usable
        Some(e) if outcomes.is_empty() && !items.is_empty() => Err(e),
        _ => Ok(outcomes),
    }
}

fn run_worker<I, T, F>(
    worker_id: usize,
    items: &[I],
    job_receiver: Receiver<usize>,
    result_sender: Sender<Outcome<T>>,
    f: &F,
) where
    F: Fn(&I) -> Result<T>,
{
    debug!("Worker {} started", worker_id);

    for index in job_receiver.iter() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| f(&items[index]))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
        };

        if let Err(e) = result_sender.send((index, outcome)) {
            error!("Worker {} failed to send result: {}", worker_id, e);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
