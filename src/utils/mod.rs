/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Miscellaneous utilities.

use rayon::prelude::*;

mod atomic_f64;
pub use atomic_f64::*;

mod granularity;
pub use granularity::*;

mod termination;
pub use termination::*;

/// Runs a generation of tasks and waits for all of them to complete.
///
/// Each task is run exactly once as a separate Rayon job, and this function
/// returns only after every task has returned: it is a full barrier between
/// consecutive generations. Tasks are passed by mutable reference, so state
/// they accumulate (e.g., thread-local queues) is visible to the next
/// generation, and all writes to shared memory performed by a generation
/// happen before any read performed by the next one.
///
/// If some task returns an error, one of the errors is returned, but only
/// after all running tasks have completed.
pub fn run_with_concurrency<T: Send, E: Send>(
    tasks: &mut [T],
    run: impl Fn(&mut T) -> Result<(), E> + Sync + Send,
) -> Result<(), E> {
    match tasks {
        [] => Ok(()),
        [task] => run(task),
        _ => tasks.par_iter_mut().with_max_len(1).try_for_each(run),
    }
}

/// Utility macro to create [`thread_pools`](`rayon::ThreadPool`).
///
/// There are two forms of this macro:
/// * Create a [`ThreadPool`](rayon::ThreadPool) with the default settings:
/// ```
/// # use maxflow::thread_pool;
/// let t: rayon::ThreadPool = thread_pool![];
/// ```
/// * Create a [`ThreadPool`](rayon::ThreadPool) with a given number of threads:
/// ```
/// # use maxflow::thread_pool;
/// let t: rayon::ThreadPool = thread_pool![7];
/// assert_eq!(t.current_num_threads(), 7);
/// ```
#[macro_export]
macro_rules! thread_pool {
    () => {
        rayon::ThreadPoolBuilder::new()
            .build()
            .expect("Cannot build a ThreadPool with default parameters")
    };
    ($num_threads:expr) => {
        rayon::ThreadPoolBuilder::new()
            .num_threads($num_threads)
            .build()
            .unwrap_or_else(|_| {
                panic!(
                    "Cannot build a ThreadPool with default parameters and {} threads",
                    $num_threads,
                )
            })
    };
}
