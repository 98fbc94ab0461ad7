/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// The computation was interrupted by a [`TerminationFlag`].
#[error("The computation was interrupted")]
pub struct Interrupted;

/// A cooperative cancellation flag.
///
/// Clones share the same underlying flag, so a clone can be handed to another
/// thread that will later call [`terminate`](TerminationFlag::terminate).
/// Long-running loops call [`assert_running`](TerminationFlag::assert_running)
/// at a fixed granularity and unwind with [`Interrupted`] as soon as the flag
/// has been raised. There is no way to resume an interrupted computation.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag {
    terminated: Arc<AtomicBool>,
}

impl TerminationFlag {
    /// Creates a flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Relaxed);
    }

    /// Returns true if the flag has not been raised.
    #[inline(always)]
    pub fn running(&self) -> bool {
        !self.terminated.load(Ordering::Relaxed)
    }

    /// Returns an error if the flag has been raised.
    #[inline(always)]
    pub fn assert_running(&self) -> Result<(), Interrupted> {
        if self.running() {
            Ok(())
        } else {
            Err(Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_flag() {
        let flag = TerminationFlag::new();
        let clone = flag.clone();
        assert!(flag.assert_running().is_ok());
        clone.terminate();
        assert!(!flag.running());
        assert_eq!(flag.assert_running(), Err(Interrupted));
    }
}
