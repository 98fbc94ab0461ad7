/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use maxflow::maxflow::gap::GapDetector;
use maxflow::maxflow::Gap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Applies the same random label changes to all detectors, checking that
/// they agree on gaps and on the resulting labels.
#[test]
fn test_detectors_agree() {
    let n = 50;
    let sentinel = n;
    for seed in 0..20 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let initial = (0..n)
            .map(|_| rng.random_range(0..n / 5))
            .collect::<Vec<_>>();
        let mut detectors = [Gap::Counts, Gap::Buckets, Gap::SortedSet]
            .map(|kind| (GapDetector::new(kind, sentinel), initial.clone()));
        for (detector, labels) in detectors.iter_mut() {
            detector.reset_counts(labels);
        }

        for _ in 0..200 {
            let node = rng.random_range(0..n);
            let from = detectors[0].1[node];
            if from == sentinel {
                continue;
            }
            let to = if from + 1 == sentinel || rng.random_bool(0.1) {
                sentinel
            } else {
                rng.random_range(from + 1..sentinel)
            };
            let mut outcomes = vec![];
            for (detector, labels) in detectors.iter_mut() {
                labels[node] = to;
                let gap = detector.move_from(node, from, to);
                let relabeled = if gap {
                    detector.relabel(from, labels)
                } else {
                    0
                };
                outcomes.push((gap, relabeled));
            }
            assert!(outcomes.iter().all(|o| *o == outcomes[0]), "{:?}", outcomes);
            assert_eq!(detectors[0].1, detectors[1].1);
            assert_eq!(detectors[0].1, detectors[2].1);

            // After a gap, no label lies strictly between the gap and the
            // sentinel
            if outcomes[0].0 {
                assert!(detectors[0].1.iter().all(|&l| l <= from || l == sentinel));
            }
        }

        let labels = &detectors[0].1;
        for label in 0..sentinel {
            let empty = !labels.contains(&label);
            for (detector, _) in &detectors {
                assert_eq!(detector.is_empty(label), empty);
            }
        }
    }
}

#[test]
fn test_none() {
    let mut detector = GapDetector::new(Gap::None, 10);
    let mut labels = vec![1, 2, 3];
    detector.reset_counts(&labels);
    assert!(!detector.move_from(0, 1, 4));
    assert!(!detector.is_empty(1));
    assert_eq!(detector.relabel(1, &mut labels), 0);
    assert_eq!(labels, vec![1, 2, 3]);
}
