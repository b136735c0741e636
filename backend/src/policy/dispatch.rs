//! Biased-randomized dispatch heuristic
//!
//! Binds each job to the rack, location and bundles it will use.
//!
//! # Rack ranking
//!
//! Racks are ranked by live crane congestion (users in service plus users
//! queued), least congested first, ties in rack order. The ranking is then
//! permuted with the rack bias Br.
//!
//! # INPUT
//!
//! For each rack in permuted order, its non-frozen locations are tried
//! until one accepts the whole job. The chosen location is frozen.
//!
//! # OUTPUT
//!
//! Bundles of the requested code are gathered rack by rack, ordered by
//! (descending quality, ascending weight) and permuted with the bundle bias
//! Bb. Candidates accumulate greedily; once the weight reaches the lower
//! tolerance bound the attempt either succeeds or is abandoned. There is
//! no backtracking.

use super::bra::{clamp_bias, BiasedPermutation};
use crate::models::job::{Bundle, Job, JobKind};
use crate::models::location::{Location, LocationId, PackingError};
use crate::models::warehouse::Warehouse;
use crate::orchestrator::config::BiasConfig;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// How a chosen rack's locations are tried for an INPUT job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationOrder {
    /// Uniformly shuffled
    #[default]
    Shuffled,
    /// Ascending distance from the depot's lift upper point
    Nearest,
}

/// Per-trial selection biases
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biases {
    /// Br
    pub rack: f64,
    /// Bb
    pub bundle: f64,
}

impl Biases {
    /// Draw Br, then Bb, each clamped into the open unit interval
    pub fn sample(config: &BiasConfig, rng: &mut RngManager) -> Self {
        let rack = clamp_bias(rng.normal(config.rack.mean, config.rack.std));
        let bundle = clamp_bias(rng.normal(config.bundle.mean, config.bundle.std));
        Self { rack, bundle }
    }
}

/// Same physical bundle: same location, layer and offset
fn same_slot(a: &Bundle, b: &Bundle) -> bool {
    a.location() == b.location() && a.depth() == b.depth() && a.start() == b.start()
}

/// Whether a bundle can be fetched given the bundles already selected
///
/// A rear bundle is blocked by any front bundle of its location whose span
/// overlaps it, unless that front bundle is selected as well.
pub fn can_retrieve(bundle: &Bundle, location: &Location, selected: &[Bundle]) -> bool {
    if bundle.depth() == 0 {
        return true;
    }
    location
        .layer(0)
        .iter()
        .filter_map(|slot| slot.as_bundle())
        .filter(|front| front.overlaps(bundle))
        .all(|front| selected.iter().any(|s| same_slot(s, front)))
}

/// Group selected bundles into retrieval sub-jobs
///
/// Two bundles sharing location and start offset become one two-bundle
/// sub-job; every other bundle becomes a one-bundle sub-job. Pairs come
/// first, each group in the order its first bundle was selected. Sub-jobs
/// are numbered from 1 under the parent's serial.
pub fn aggregate(parent: &Job, selected: Vec<Bundle>) -> Vec<Job> {
    let n = selected.len();
    let mut paired = vec![false; n];
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    for i in 0..n {
        if paired[i] {
            continue;
        }
        let partner = (i + 1..n).find(|&j| {
            !paired[j]
                && selected[j].location() == selected[i].location()
                && selected[j].start() == selected[i].start()
        });
        if let Some(j) = partner {
            paired[i] = true;
            paired[j] = true;
            pairs.push((i, j));
        }
    }

    let mut slots: Vec<Option<Bundle>> = selected.into_iter().map(Some).collect();
    let mut groups: Vec<Vec<Bundle>> = Vec::with_capacity(n);
    for (i, j) in pairs {
        groups.push(slots[i].take().into_iter().chain(slots[j].take()).collect());
    }
    groups.extend(slots.into_iter().flatten().map(|bundle| vec![bundle]));

    groups
        .into_iter()
        .enumerate()
        .map(|(k, bundles)| Job::retrieval(parent, k as u16 + 1, bundles))
        .collect()
}

/// The dispatch heuristic of one trial
#[derive(Debug, Clone)]
pub struct DispatchHeuristic {
    biases: Biases,
    weight_tolerance: f64,
    location_order: LocationOrder,
    rng: RngManager,
}

impl DispatchHeuristic {
    pub fn new(biases: Biases, weight_tolerance: f64, location_order: LocationOrder, rng: RngManager) -> Self {
        Self {
            biases: Biases {
                rack: clamp_bias(biases.rack),
                bundle: clamp_bias(biases.bundle),
            },
            weight_tolerance,
            location_order,
            rng,
        }
    }

    pub fn biases(&self) -> Biases {
        self.biases
    }

    /// Rack indices, least congested first, permuted with Br
    ///
    /// `congestion[r]` is the crane congestion of rack `r`.
    pub fn rack_order(&mut self, congestion: &[usize]) -> Vec<usize> {
        let mut ranked: Vec<usize> = (0..congestion.len()).collect();
        ranked.sort_by_key(|&r| congestion[r]);
        BiasedPermutation::new(ranked, self.biases.rack, &mut self.rng).collect()
    }

    /// Bind an INPUT job to a location
    ///
    /// On success the job's bundles are seated, the location is frozen and
    /// its id returned. `Ok(None)` means no rack had room.
    pub fn dispatch_input(
        &mut self,
        job: &mut Job,
        warehouse: &mut Warehouse,
        congestion: &[usize],
    ) -> Result<Option<LocationId>, PackingError> {
        if job.kind() != JobKind::Input {
            return Err(PackingError::WrongKind {
                kind: job.kind(),
                operation: "placed into",
            });
        }

        for r in self.rack_order(congestion) {
            let Some(rack) = warehouse.rack_mut(r) else {
                continue;
            };

            let placed = match self.location_order {
                LocationOrder::Shuffled => {
                    let mut candidates: Vec<usize> = rack
                        .locations()
                        .iter()
                        .enumerate()
                        .filter(|(_, location)| !location.is_frozen())
                        .map(|(i, _)| i)
                        .collect();
                    self.rng.shuffle(&mut candidates);

                    let mut placed = None;
                    for index in candidates {
                        if let Some(location) = rack.location_mut(index) {
                            if location.place(job)? {
                                placed = Some(location.id());
                                break;
                            }
                        }
                    }
                    placed
                }
                LocationOrder::Nearest => {
                    let reference = rack
                        .lift(job.depot())
                        .map(|lift| lift.upper)
                        .unwrap_or_else(|| rack.position());
                    rack.place_nearest(job, reference)?
                }
            };

            if let Some(id) = placed {
                if let Some(location) = warehouse.location_mut(id) {
                    location.freeze();
                }
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Select bundles for an OUTPUT job and split them into sub-jobs
    ///
    /// Every location touched by the selection is frozen. `None` means the
    /// request cannot be met now. Bundles stay in their locations; the
    /// caller takes them when it starts each sub-job.
    pub fn dispatch_output(&mut self, job: &Job, warehouse: &mut Warehouse, congestion: &[usize]) -> Option<Vec<Job>> {
        if job.kind() != JobKind::Output {
            return None;
        }

        let required = job.weight();
        let lower = required * (1.0 - self.weight_tolerance);
        let upper = required * (1.0 + self.weight_tolerance);
        let code = job.code().id;

        let mut selected: Vec<Bundle> = Vec::new();
        let mut total_weight = 0.0;
        let mut total_quality = 0.0;

        for r in self.rack_order(congestion) {
            let Some(rack) = warehouse.rack(r) else {
                continue;
            };

            let mut candidates: Vec<Bundle> = rack
                .locations()
                .iter()
                .filter(|location| !location.is_frozen())
                .flat_map(Location::bundles)
                .filter(|bundle| bundle.code() == code)
                .cloned()
                .collect();
            candidates.sort_by(|a, b| {
                b.quality()
                    .cmp(&a.quality())
                    .then_with(|| a.weight().total_cmp(&b.weight()))
            });

            let order: Vec<Bundle> = BiasedPermutation::new(candidates, self.biases.bundle, &mut self.rng).collect();
            for bundle in order {
                let retrievable = bundle
                    .location()
                    .and_then(|id| rack.location(id.index))
                    .is_some_and(|location| can_retrieve(&bundle, location, &selected));
                if retrievable {
                    total_weight += bundle.weight();
                    total_quality += f64::from(bundle.quality());
                    selected.push(bundle);
                }

                if !selected.is_empty() && total_weight >= lower {
                    let mean_quality = total_quality / selected.len() as f64;
                    if total_weight > upper || mean_quality < job.quality() {
                        return None;
                    }

                    for id in selected.iter().filter_map(Bundle::location) {
                        if let Some(location) = warehouse.location_mut(id) {
                            location.freeze();
                        }
                    }
                    return Some(aggregate(job, selected));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Kernel, KernelError};
    use crate::models::job::{Code, CodeId, JobId};
    use crate::orchestrator::config::TopologyConfig;

    fn small_plant(locations_per_cell: usize) -> Warehouse {
        let mut topology = TopologyConfig::reference_plant();
        topology.racks.truncate(1);
        topology.racks[0].corridors = 1;
        topology.racks[0].levels = 1;
        topology.racks[0].locations_per_cell = locations_per_cell;
        let mut kernel: Kernel<Warehouse, KernelError> = Kernel::new();
        Warehouse::build(&topology, &mut kernel).unwrap()
    }

    fn code3() -> Code {
        Code::new(CodeId(1), 3, 500.0)
    }

    fn heuristic() -> DispatchHeuristic {
        let biases = Biases { rack: 0.7, bundle: 0.9 };
        DispatchHeuristic::new(biases, 0.2, LocationOrder::Shuffled, RngManager::new(17))
    }

    fn seated(location: LocationId, depth: usize, start: u32) -> Bundle {
        let mut bundle = Bundle::new(&code3(), 500.0, 2);
        bundle.seat(location, depth, start);
        bundle
    }

    #[test]
    fn test_input_freezes_chosen_location() {
        let mut warehouse = small_plant(2);
        let mut h = heuristic();
        let mut job = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code3(), 1, 2.0);

        let id = h.dispatch_input(&mut job, &mut warehouse, &[0]).unwrap().unwrap();
        assert!(warehouse.location(id).unwrap().is_frozen());
        assert!(job.destination().is_some());
    }

    #[test]
    fn test_input_skips_frozen_and_reports_exhaustion() {
        let mut warehouse = small_plant(1);
        let mut h = heuristic();
        warehouse.location_mut(LocationId::new(0, 0)).unwrap().freeze();

        let mut job = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code3(), 1, 2.0);
        assert_eq!(h.dispatch_input(&mut job, &mut warehouse, &[0]).unwrap(), None);
        assert!(job.bundles().iter().all(|b| !b.is_placed()));
    }

    #[test]
    fn test_rear_bundle_blocked_until_front_selected() {
        let mut location = Location::new(LocationId::new(0, 0), [0.0; 3], 6, 2, 2.0);
        let mut pair = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code3(), 2, 2.0);
        assert!(location.place(&mut pair).unwrap());

        let front = pair.bundles()[0].clone();
        let rear = pair.bundles()[1].clone();
        assert!(!can_retrieve(&rear, &location, &[]));
        assert!(can_retrieve(&front, &location, &[]));
        assert!(can_retrieve(&rear, &location, &[front]));
    }

    #[test]
    fn test_rear_bundle_partially_covered_is_blocked() {
        let mut location = Location::new(LocationId::new(0, 0), [0.0; 3], 6, 2, 2.0);
        // two single bundles fill the rear layer, then a longer one lands in front
        let mut rear = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code3(), 1, 2.0);
        assert!(location.place(&mut rear).unwrap());
        assert_eq!(rear.bundles()[0].depth(), 1);

        let mut other = Job::new(JobId::new(1), 0.0, 0, JobKind::Input, code3(), 1, 2.0);
        assert!(location.place(&mut other).unwrap());
        assert_eq!(other.bundles()[0].depth(), 1);
        assert_eq!(other.bundles()[0].start(), 3);

        let mut front = Job::new(JobId::new(2), 0.0, 0, JobKind::Input, Code::new(CodeId(9), 4, 800.0), 1, 2.0);
        assert!(location.place(&mut front).unwrap());
        assert_eq!(front.bundles()[0].depth(), 0);

        // front [0, 4) overlaps both rear bundles
        assert!(!can_retrieve(&rear.bundles()[0], &location, &[]));
        assert!(!can_retrieve(&other.bundles()[0], &location, &[]));
    }

    #[test]
    fn test_aggregate_pairs_first_then_singles() {
        let parent = Job::new(JobId::new(4), 0.0, 1, JobKind::Output, code3(), 2, 2.0);
        let a = LocationId::new(0, 0);
        let b = LocationId::new(0, 1);
        let selected = vec![seated(b, 0, 3), seated(a, 0, 0), seated(a, 1, 0)];

        let subs = aggregate(&parent, selected);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].id(), JobId::new(4).child(1));
        assert_eq!(subs[0].quantity(), 2);
        assert_eq!(subs[0].bundles()[0].depth(), 0);
        assert_eq!(subs[0].weight(), 1000.0);
        assert_eq!(subs[1].quantity(), 1);
        assert_eq!(subs[1].bundles()[0].location(), Some(b));
    }

    #[test]
    fn test_output_abandons_when_overshooting() {
        let mut warehouse = small_plant(1);
        let big = Code::new(CodeId(1), 3, 2000.0);
        let mut stored = Job::new(JobId::new(0), 0.0, 0, JobKind::Input, big, 1, 3.0);
        assert!(warehouse.location_mut(LocationId::new(0, 0)).unwrap().place(&mut stored).unwrap());

        // requires 500 ± 20 %, the only bundle weighs 2000
        let request = Job::new(JobId::new(1), 0.0, 1, JobKind::Output, code3(), 1, 1.0);
        let mut h = heuristic();
        assert!(h.dispatch_output(&request, &mut warehouse, &[0]).is_none());
        assert!(!warehouse.location(LocationId::new(0, 0)).unwrap().is_frozen());
    }

    #[test]
    fn test_biases_are_clamped() {
        let h = DispatchHeuristic::new(
            Biases { rack: 1.5, bundle: -1.0 },
            0.2,
            LocationOrder::Nearest,
            RngManager::new(1),
        );
        assert!(h.biases().rack < 1.0);
        assert!(h.biases().bundle > 0.0);
    }
}
