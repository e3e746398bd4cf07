//! Order-preserving fan-out of CPU-bound work over scoped threads.

use std::panic;
use std::thread;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Runs `f` to completion on the current thread. On a multi-threaded tokio
/// worker the worker's other tasks are handed off first via
/// `block_in_place`; elsewhere `f` runs inline.
pub(crate) fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Applies `f` to every item on up to `num_cpus` threads, returning results
/// in input order. A panic in `f` is re-raised on the calling thread.
pub(crate) fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    blocking(|| fan_out(items, &f))
}

fn fan_out<T, R, F>(items: &[T], f: &F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = num_cpus::get().max(1).min(items.len());
    if workers <= 1 {
        return items.iter().map(f).collect();
    }

    let chunk_size = items.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(f).collect::<Vec<R>>()))
            .collect();

        let mut results = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => results.extend(chunk),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        results
    })
}
