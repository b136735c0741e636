//! Dispatch Policy Module
//!
//! Decides, for every job of the demand sequence, which rack, location and
//! bundles it will use, and what happens when no feasible choice exists.
//!
//! # Overview
//!
//! The policy is a biased-randomized constructive heuristic:
//! - **Rack choice**: racks ranked by crane congestion, permuted with Br
//! - **Location choice (INPUT)**: non-frozen locations of the rack, shuffled
//!   or nearest-first, until one accepts the whole job
//! - **Bundle choice (OUTPUT)**: bundles of the code ranked by quality and
//!   weight, permuted with Bb, accumulated greedily within the weight
//!   tolerance, then paired into retrieval sub-jobs
//! - **Postponement**: an infeasible job moves behind the first later job
//!   that could unblock it
//!
//! Every random choice draws from the trial's own [`RngManager`], so a
//! trial is fully determined by its seed and biases.
//!
//! [`RngManager`]: crate::rng::RngManager

pub mod bra;
pub mod dispatch;
pub mod postpone;

pub use bra::{clamp_bias, BiasedPermutation, MAX_BIAS, MIN_BIAS};
pub use dispatch::{aggregate, can_retrieve, Biases, DispatchHeuristic, LocationOrder};
pub use postpone::postpone;
