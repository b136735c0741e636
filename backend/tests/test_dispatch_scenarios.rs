//! Dispatch heuristic scenarios
//!
//! Bundle selection for OUTPUT jobs: retrievability behind front bundles,
//! pairing of aligned bundles, and the weight/quality bounds every
//! accepted selection must respect.

use asrs_simulator_core_rs::kernel::{Kernel, KernelError};
use asrs_simulator_core_rs::models::{Bundle, Code, CodeId, Job, JobId, JobKind, LocationId, Warehouse};
use asrs_simulator_core_rs::orchestrator::TopologyConfig;
use asrs_simulator_core_rs::policy::{can_retrieve, Biases, DispatchHeuristic, LocationOrder};
use asrs_simulator_core_rs::rng::RngManager;
use proptest::prelude::*;

/// One rack of `corridors` × 1 level, `per_cell` double-depth locations per cell
fn plant(corridors: usize, per_cell: usize, location_length: u32) -> Warehouse {
    let mut topology = TopologyConfig::reference_plant();
    topology.racks.truncate(1);
    let rack = &mut topology.racks[0];
    rack.corridors = corridors;
    rack.levels = 1;
    rack.locations_per_cell = per_cell;
    rack.location_length = location_length;
    let mut kernel: Kernel<Warehouse, KernelError> = Kernel::new();
    Warehouse::build(&topology, &mut kernel).unwrap()
}

fn code() -> Code {
    Code::new(CodeId(7), 3, 500.0)
}

fn heuristic(bundle_bias: f64, seed: u64) -> DispatchHeuristic {
    let biases = Biases {
        rack: 0.7,
        bundle: bundle_bias,
    };
    DispatchHeuristic::new(biases, 0.2, LocationOrder::Shuffled, RngManager::new(seed))
}

fn unfreeze_all(warehouse: &mut Warehouse) {
    for rack in warehouse.racks_mut() {
        for i in 0..rack.locations().len() {
            if let Some(location) = rack.location_mut(i) {
                location.unfreeze();
            }
        }
    }
}

#[test]
fn test_aligned_singles_retrieved_as_one_pair() {
    let mut warehouse = plant(1, 1, 3);
    let mut h = heuristic(0.999, 31);

    let mut first = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code(), 1, 1.0);
    let mut second = Job::new(JobId::new(1), 0.0, 0, JobKind::Input, code(), 1, 1.0);
    let at = h.dispatch_input(&mut first, &mut warehouse, &[0]).unwrap().unwrap();
    unfreeze_all(&mut warehouse);
    assert_eq!(h.dispatch_input(&mut second, &mut warehouse, &[0]).unwrap(), Some(at));
    unfreeze_all(&mut warehouse);

    // rear first, then front at the same offset
    assert_eq!((first.bundles()[0].depth(), first.bundles()[0].start()), (1, 0));
    assert_eq!((second.bundles()[0].depth(), second.bundles()[0].start()), (0, 0));

    let request = Job::new(JobId::new(2), 10.0, 1, JobKind::Output, code(), 2, 1.0);
    let parts = h.dispatch_output(&request, &mut warehouse, &[0]).unwrap();

    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].bundles().len(), 2);
    assert_eq!(parts[0].id(), JobId::new(2).child(1));
    assert!(warehouse.location(at).unwrap().is_frozen());
}

#[test]
fn test_rear_blocked_until_front_selected() {
    let mut warehouse = plant(1, 1, 3);
    let id = LocationId::new(0, 0);
    let location = warehouse.location_mut(id).unwrap();

    let mut rear = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code(), 1, 1.0);
    let mut front = Job::new(JobId::new(1), 0.0, 0, JobKind::Input, code(), 1, 1.0);
    assert!(location.place(&mut rear).unwrap());
    assert!(location.place(&mut front).unwrap());

    let location = warehouse.location(id).unwrap();
    let rear_bundle = rear.bundles()[0].clone();
    let front_bundle = front.bundles()[0].clone();
    assert!(!can_retrieve(&rear_bundle, location, &[]));
    assert!(can_retrieve(&rear_bundle, location, &[front_bundle]));
}

#[test]
fn test_output_without_stock_fails_and_freezes_nothing() {
    let mut warehouse = plant(2, 2, 6);
    let mut h = heuristic(0.9, 5);
    let request = Job::new(JobId::new(0), 0.0, 1, JobKind::Output, code(), 1, 1.0);

    assert!(h.dispatch_output(&request, &mut warehouse, &[0]).is_none());
    assert!(warehouse.racks()[0].locations().iter().all(|l| !l.is_frozen()));
}

#[test]
fn test_quality_floor_rejects_selection() {
    let mut warehouse = plant(1, 1, 6);
    let mut stored = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code(), 1, 1.0);
    assert!(warehouse
        .location_mut(LocationId::new(0, 0))
        .unwrap()
        .place(&mut stored)
        .unwrap());

    let request = Job::new(JobId::new(1), 0.0, 1, JobKind::Output, code(), 1, 3.0);
    assert!(heuristic(0.9, 2).dispatch_output(&request, &mut warehouse, &[0]).is_none());
}

#[test]
fn test_nearest_order_fills_closest_location_first() {
    let mut topology = TopologyConfig::reference_plant();
    topology.racks.truncate(1);
    topology.racks[0].corridors = 3;
    topology.racks[0].levels = 1;
    topology.racks[0].locations_per_cell = 1;
    let mut kernel: Kernel<Warehouse, KernelError> = Kernel::new();
    let mut warehouse = Warehouse::build(&topology, &mut kernel).unwrap();

    let biases = Biases {
        rack: 0.7,
        bundle: 0.9,
    };
    let mut h = DispatchHeuristic::new(biases, 0.2, LocationOrder::Nearest, RngManager::new(1));

    // depot 0's lift sits at x = 0, next to corridor 0
    let mut job = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code(), 1, 1.0);
    let at = h.dispatch_input(&mut job, &mut warehouse, &[0]).unwrap();
    assert_eq!(at, Some(LocationId::new(0, 0)));
}

proptest! {
    #[test]
    fn accepted_selection_respects_bounds(
        stock in proptest::collection::vec((1u8..=2, 1u32..=3), 1..20),
        quantity in 1u8..=2,
        quality in 1u32..=3,
        seed in 1u64..10_000,
    ) {
        let mut warehouse = plant(4, 2, 6);
        let mut h = heuristic(0.8, seed);
        for (i, (q, quality)) in stock.into_iter().enumerate() {
            let mut job = Job::new(JobId::new(i as u64), 0.0, 0, JobKind::Input, code(), q, f64::from(quality));
            let _ = h.dispatch_input(&mut job, &mut warehouse, &[0]).unwrap();
            unfreeze_all(&mut warehouse);
        }

        let request = Job::new(JobId::new(500), 0.0, 1, JobKind::Output, code(), quantity, f64::from(quality));
        let required = request.weight();
        if let Some(parts) = h.dispatch_output(&request, &mut warehouse, &[0]) {
            let bundles: Vec<&Bundle> = parts.iter().flat_map(|p| p.bundles()).collect();
            let weight: f64 = bundles.iter().map(|b| b.weight()).sum();
            let mean_quality = bundles.iter().map(|b| f64::from(b.quality())).sum::<f64>() / bundles.len() as f64;

            prop_assert!(weight <= required * 1.2 + 1e-9);
            prop_assert!(weight >= required * 0.8 - 1e-9);
            prop_assert!(mean_quality >= f64::from(quality));
            prop_assert!(parts.iter().all(|p| p.quantity() == 1 || p.quantity() == 2));
            for bundle in bundles {
                let id = bundle.location().unwrap();
                prop_assert!(warehouse.location(id).unwrap().is_frozen());
            }
        }
    }
}
