//! Multistart search
//!
//! The search keeps the smallest makespan over `maxiter + 1` trials and,
//! for a fixed seed, always arrives at the same answer.

use asrs_simulator_core_rs::arrivals::{generate_jobs, DemandConfig};
use asrs_simulator_core_rs::models::{Code, CodeId, Job, JobId, JobKind};
use asrs_simulator_core_rs::orchestrator::{BiasConfig, NormalParams, RunConfig, SearchConfig, TopologyConfig};
use asrs_simulator_core_rs::policy::{MAX_BIAS, MIN_BIAS};
use asrs_simulator_core_rs::{RngManager, SearchDriver};

fn config(max_jobs: usize, maxiter: usize, seed: u64) -> SearchConfig {
    let mut demand = DemandConfig::reference();
    demand.max_jobs = Some(max_jobs);
    SearchConfig {
        topology: TopologyConfig::reference_plant(),
        demand,
        run: RunConfig::default(),
        bias: BiasConfig::default(),
        maxiter,
        seed,
    }
}

#[test]
fn test_best_is_minimum_over_all_trials() {
    let outcome = SearchDriver::new(config(40, 5, 2024)).unwrap().run().unwrap();

    assert_eq!(outcome.trials.len(), 6);
    assert!(outcome.trials.iter().all(|&t| outcome.best <= t));

    if outcome.best.is_finite() {
        assert!(outcome.trials.contains(&outcome.best));
        let biases = outcome.best_biases.expect("best biases recorded");
        assert!((MIN_BIAS..=MAX_BIAS).contains(&biases.rack));
        assert!((MIN_BIAS..=MAX_BIAS).contains(&biases.bundle));
        let report = outcome.best_report.as_ref().expect("best report kept");
        assert_eq!(report.makespan, outcome.best);
    } else {
        assert_eq!(outcome.feasible_trials(), 0);
        assert!(outcome.best_biases.is_none());
    }
}

#[test]
fn test_search_is_deterministic() {
    let a = SearchDriver::new(config(25, 3, 77)).unwrap().run().unwrap();
    let b = SearchDriver::new(config(25, 3, 77)).unwrap().run().unwrap();

    let bits = |trials: &[f64]| trials.iter().map(|t| t.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&a.trials), bits(&b.trials));
    assert_eq!(a.best.to_bits(), b.best.to_bits());
    assert_eq!(a.best_biases, b.best_biases);
}

#[test]
fn test_zero_maxiter_runs_one_trial() {
    let outcome = SearchDriver::new(config(10, 0, 3)).unwrap().run().unwrap();
    assert_eq!(outcome.trials.len(), 1);
}

#[test]
fn test_trials_do_not_share_job_state() {
    // each trial gets its own copy: the caller's sequence is untouched
    let driver = SearchDriver::new(config(20, 2, 5)).unwrap();
    let jobs = generate_jobs(&driver.config().demand, &mut RngManager::new(5));
    let snapshot: Vec<(JobId, usize)> = jobs.iter().map(|j| (j.id(), j.bundles().len())).collect();

    let outcome = driver.multistart(&jobs, 2, &mut RngManager::new(11)).unwrap();
    assert_eq!(outcome.trials.len(), 3);

    let after: Vec<(JobId, usize)> = jobs.iter().map(|j| (j.id(), j.bundles().len())).collect();
    assert_eq!(snapshot, after);
}

#[test]
fn test_all_infeasible_search_reports_infinity() {
    let mut cfg = config(1, 2, 8);
    cfg.run.initial_fill = 0.0;
    let driver = SearchDriver::new(cfg).unwrap();

    let code = Code::new(CodeId(0), 3, 500.0);
    let jobs = vec![Job::new(JobId::new(0), 1.0, 0, JobKind::Output, code, 1, 1.0)];
    let outcome = driver.multistart(&jobs, 2, &mut RngManager::new(1)).unwrap();

    assert_eq!(outcome.trials, vec![f64::INFINITY; 3]);
    assert!(outcome.best.is_infinite());
    assert!(outcome.best_biases.is_none());
    assert_eq!(outcome.feasible_trials(), 0);
}

#[test]
fn test_extreme_bias_draws_are_clamped() {
    let mut cfg = config(10, 3, 13);
    cfg.bias = BiasConfig {
        rack: NormalParams { mean: 5.0, std: 0.0 },
        bundle: NormalParams { mean: -5.0, std: 0.0 },
    };
    let driver = SearchDriver::new(cfg).unwrap();
    let jobs = generate_jobs(&driver.config().demand, &mut RngManager::new(13));

    let trial = driver.heuristic(jobs, &mut RngManager::new(4)).unwrap();
    assert_eq!(trial.biases.rack, MAX_BIAS);
    assert_eq!(trial.biases.bundle, MIN_BIAS);
}
