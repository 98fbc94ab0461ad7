/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// A 64-bit floating-point value that can be shared between threads.
///
/// The value is stored as its bit pattern in an [`AtomicU64`].
/// [`fetch_add`](AtomicF64::fetch_add) is implemented with a
/// compare-and-exchange loop, as there is no hardware support for atomic
/// floating-point addition.
///
/// Slices of this type are used for arrays that might be written by several
/// threads at the same time, such as the flow array of a
/// [`FlowGraph`](crate::maxflow::flow_graph::FlowGraph). Single-threaded
/// code can use [`add`](AtomicF64::add), which avoids the loop.
#[repr(transparent)]
#[derive(Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Creates a new atomic float.
    #[inline(always)]
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline(always)]
    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.0.load(order))
    }

    #[inline(always)]
    pub fn store(&self, value: f64, order: Ordering) {
        self.0.store(value.to_bits(), order)
    }

    /// Stores a value, returning the previous one.
    #[inline(always)]
    pub fn swap(&self, value: f64, order: Ordering) -> f64 {
        f64::from_bits(self.0.swap(value.to_bits(), order))
    }

    /// Adds `delta` atomically, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: f64, order: Ordering) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let new = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, new, order, Ordering::Relaxed)
            {
                Ok(prev) => return f64::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }

    /// Adds `delta` with a non-atomic read-modify-write.
    ///
    /// Concurrent calls on the same value might lose updates: use this method
    /// only when no other thread is writing.
    #[inline(always)]
    pub fn add(&self, delta: f64) {
        self.store(self.load(Ordering::Relaxed) + delta, Ordering::Relaxed);
    }

    pub fn into_inner(self) -> f64 {
        f64::from_bits(self.0.into_inner())
    }
}

impl std::fmt::Debug for AtomicF64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.load(Ordering::Relaxed).fmt(f)
    }
}

impl From<f64> for AtomicF64 {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

/// Returns a boxed slice of `len` atomic floats set to `value`.
pub fn atomic_f64_slice(len: usize, value: f64) -> Box<[AtomicF64]> {
    (0..len).map(|_| AtomicF64::new(value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_add() {
        let x = AtomicF64::new(1.5);
        assert_eq!(x.fetch_add(2.0, Ordering::Relaxed), 1.5);
        assert_eq!(x.load(Ordering::Relaxed), 3.5);
        x.add(-3.5);
        assert_eq!(x.swap(7.0, Ordering::Relaxed), 0.0);
        assert_eq!(x.into_inner(), 7.0);
    }

    #[test]
    fn test_concurrent_fetch_add() {
        let x = AtomicF64::new(0.0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        x.fetch_add(1.0, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(x.load(Ordering::Relaxed), 4000.0);
    }
}
