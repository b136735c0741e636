//! Integration tests for per-location space packing
//!
//! Place/take sequences must keep every layer tiled exactly, and taking
//! a placed job back must restore the free layout it found.

use asrs_simulator_core_rs::models::{Bundle, Code, CodeId, Job, JobId, JobKind, Location, LocationId, Slot, Space};
use proptest::prelude::*;

fn code(length: u32) -> Code {
    Code::new(CodeId(length), length, 100.0 * f64::from(length))
}

fn input(serial: u64, length: u32, quantity: u8) -> Job {
    Job::new(JobId::new(serial), 0.0, 0, JobKind::Input, code(length), quantity, 1.0)
}

/// A retrieval carrying exactly the given stored bundles
fn retrieval(bundles: Vec<Bundle>) -> Job {
    let first = &bundles[0];
    let parent = Job::new(
        JobId::new(1000),
        0.0,
        0,
        JobKind::Output,
        Code::new(first.code(), first.length(), first.weight()),
        bundles.len() as u8,
        1.0,
    );
    Job::retrieval(&parent, 1, bundles)
}

/// Σ free + Σ stored == length, for every layer
fn assert_conserved(location: &Location) {
    for depth in 0..location.depth() {
        let covered: u32 = location.layer(depth).iter().map(Slot::length).sum();
        assert_eq!(covered, location.length(), "layer {} of {}", depth, location.id());
    }
    assert!(location.check_layout().is_ok());
}

#[test]
fn test_length_six_single_depth_scenario() {
    let mut location = Location::new(LocationId::new(0, 0), [0.0; 3], 6, 1, 2.0);

    let mut first = input(0, 4, 1);
    assert!(location.place(&mut first).unwrap());
    let spaces: Vec<Space> = location.spaces(0).copied().collect();
    assert_eq!(spaces, vec![Space::new(4, 2)]);

    let mut second = input(1, 3, 1);
    assert!(!location.place(&mut second).unwrap());
    assert_eq!(location.occupied(), 4);
    assert_conserved(&location);
}

#[test]
fn test_take_restores_empty_location() {
    let mut location = Location::new(LocationId::new(0, 3), [0.0; 3], 6, 2, 2.0);
    let mut pair = input(0, 3, 2);
    assert!(location.place(&mut pair).unwrap());
    assert_eq!(location.count(CodeId(3)), 2);

    let mut back = retrieval(pair.bundles().to_vec());
    location.take(&mut back).unwrap();

    for depth in 0..2 {
        assert_eq!(location.layer(depth), &[Slot::Free(Space::new(0, 6))]);
    }
    assert!(!location.keeps_code(CodeId(3)));
    assert!(back.destination().is_some());
}

#[test]
fn test_place_wrong_kind_is_fatal() {
    let mut location = Location::new(LocationId::new(0, 0), [0.0; 3], 6, 1, 2.0);
    let mut output = Job::new(JobId::new(0), 0.0, 0, JobKind::Output, code(3), 1, 1.0);
    assert!(location.place(&mut output).is_err());
}

#[test]
fn test_place_twice_is_fatal() {
    let mut a = Location::new(LocationId::new(0, 0), [0.0; 3], 6, 1, 2.0);
    let mut b = Location::new(LocationId::new(0, 1), [0.0; 3], 6, 1, 2.0);
    let mut job = input(0, 2, 1);
    assert!(a.place(&mut job).unwrap());
    assert!(b.place(&mut job).is_err());
}

proptest! {
    #[test]
    fn layers_stay_conserved(
        depth in 1usize..=2,
        length in 4u32..12,
        ops in proptest::collection::vec((1u32..7, 1u8..=2, any::<bool>()), 1..40),
    ) {
        let mut location = Location::new(LocationId::new(0, 0), [0.0; 3], length, depth, 1.0);
        let mut placed: Vec<Job> = Vec::new();

        for (serial, (bundle_length, quantity, take)) in ops.into_iter().enumerate() {
            if take && !placed.is_empty() {
                let job = placed.remove(serial % placed.len());
                let mut back = retrieval(job.bundles().to_vec());
                prop_assert!(location.take(&mut back).is_ok());
            } else {
                let mut job = input(serial as u64, bundle_length, quantity);
                if location.place(&mut job).unwrap() {
                    prop_assert!(job.bundles().iter().all(|b| b.location() == Some(location.id())));
                    placed.push(job);
                }
            }

            for d in 0..depth {
                let covered: u32 = location.layer(d).iter().map(Slot::length).sum();
                prop_assert_eq!(covered, length);
            }
            let stored: u32 = placed.iter().map(|j| j.length() * u32::from(j.quantity())).sum();
            prop_assert_eq!(location.occupied(), stored);
        }
        prop_assert!(location.check_layout().is_ok());
    }

    #[test]
    fn place_then_take_restores_free_layout(
        depth in 1usize..=2,
        prefill in proptest::collection::vec((1u32..5, 1u8..=2), 0..6),
        bundle_length in 1u32..7,
        quantity in 1u8..=2,
    ) {
        let mut location = Location::new(LocationId::new(0, 0), [0.0; 3], 10, depth, 1.0);
        for (i, (l, q)) in prefill.into_iter().enumerate() {
            let _ = location.place(&mut input(100 + i as u64, l, q)).unwrap();
        }

        let before: Vec<Vec<Slot>> = (0..depth).map(|d| location.layer(d).to_vec()).collect();
        let mut job = input(0, bundle_length, quantity);
        if location.place(&mut job).unwrap() {
            let mut back = retrieval(job.bundles().to_vec());
            prop_assert!(location.take(&mut back).is_ok());
        }
        let after: Vec<Vec<Slot>> = (0..depth).map(|d| location.layer(d).to_vec()).collect();
        prop_assert_eq!(before, after);
    }
}
