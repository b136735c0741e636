//! Integration tests for complete trials
//!
//! These tests run the dispatcher and job processes on the reference
//! plant and check what must hold once the kernel drains.

use asrs_simulator_core_rs::arrivals::{generate_jobs, DemandConfig};
use asrs_simulator_core_rs::models::{Code, CodeId, Event, Job, JobId, JobKind};
use asrs_simulator_core_rs::orchestrator::{Orchestrator, RunConfig, SimulationError, TopologyConfig, TrialReport};
use asrs_simulator_core_rs::policy::{Biases, LocationOrder};
use asrs_simulator_core_rs::RngManager;
use std::collections::{HashMap, HashSet};

fn biases() -> Biases {
    Biases {
        rack: 0.7,
        bundle: 0.9,
    }
}

fn orchestrator(run: RunConfig, seed: u64) -> Orchestrator {
    Orchestrator::new(&TopologyConfig::reference_plant(), run, biases(), RngManager::new(seed)).unwrap()
}

/// Shelf units an INPUT adds or a completed retrieval removes
fn moved_units(job: &Job) -> i64 {
    i64::from(job.length()) * i64::from(job.quantity())
}

fn check_report(report: &TrialReport) {
    // every completion lies inside the trial and after its own start
    for job in &report.completed {
        assert!(job.start >= job.arrival - 1e-9, "{} started before arrival", job.job);
        assert!(job.end >= job.start, "{} ended before it started", job.job);
        assert!(job.end <= report.makespan);
    }

    // events come out in time order
    let times: Vec<f64> = report.event_log.events().iter().map(Event::time).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(report.event_log.events_of_type("JobCompleted").len(), report.jobs_done);
    assert_eq!(report.event_log.events_of_type("JobStarted").len(), report.jobs_done);
    assert_eq!(report.event_log.events_of_type("Infeasible").len(), 0);

    for depot in &report.depot_reports {
        if let Some((_, &last)) = depot.iter().next_back() {
            assert_eq!(last, 0, "depot queue not drained");
        }
    }
}

#[test]
fn test_warm_started_trial_conserves_stock() {
    let mut demand = DemandConfig::reference();
    demand.max_jobs = Some(120);
    let jobs = generate_jobs(&demand, &mut RngManager::new(4));
    let lengths: HashMap<u64, i64> = jobs.iter().map(|j| (j.id().serial, i64::from(j.length()))).collect();
    let units: HashMap<JobId, i64> = jobs.iter().map(|j| (j.id(), moved_units(j))).collect();

    let mut orchestrator = orchestrator(RunConfig::default(), 17);
    orchestrator.warm_up(&demand).unwrap();
    let before = i64::from(orchestrator.warehouse().occupied());

    match orchestrator.run(jobs) {
        Ok(report) => {
            check_report(&report);

            let mut stored: HashSet<JobId> = HashSet::new();
            let mut retrieved = 0;
            for event in report.event_log.events() {
                match event {
                    Event::Placement { job, .. } => {
                        stored.insert(*job);
                    }
                    Event::Retrieval { job, bundles, .. } => {
                        retrieved += lengths[&job.serial] * *bundles as i64;
                    }
                    _ => {}
                }
            }
            let placed: i64 = stored.iter().map(|id| units[id]).sum();

            assert_eq!(i64::from(report.occupied), before + placed - retrieved);
            assert!(report.fill_ratio > 0.0 && report.fill_ratio < 1.0);
            assert!(report.machine_usage.iter().any(|m| m.moving_time > 0.0));
        }
        Err(e) => assert!(!e.is_fatal(), "fatal error: {}", e),
    }
}

#[test]
fn test_inputs_on_empty_plant_all_complete() {
    let mut demand = DemandConfig::reference();
    demand.max_jobs = Some(50);
    let jobs: Vec<Job> = generate_jobs(&demand, &mut RngManager::new(12))
        .into_iter()
        .filter(|j| j.kind() == JobKind::Input)
        .collect();
    let count = jobs.len();
    let units: i64 = jobs.iter().map(moved_units).sum();

    let mut run = RunConfig::default();
    run.initial_fill = 0.0;
    let report = orchestrator(run, 1).run(jobs).unwrap();

    check_report(&report);
    assert_eq!(report.jobs_done, count);
    assert_eq!(report.postponed, 0);
    assert_eq!(i64::from(report.occupied), units);
}

#[test]
fn test_nearest_location_order_runs() {
    let mut demand = DemandConfig::reference();
    demand.max_jobs = Some(30);
    let jobs: Vec<Job> = generate_jobs(&demand, &mut RngManager::new(6))
        .into_iter()
        .filter(|j| j.kind() == JobKind::Input)
        .collect();

    let mut run = RunConfig::default();
    run.initial_fill = 0.0;
    run.location_order = LocationOrder::Nearest;
    let report = orchestrator(run, 2).run(jobs).unwrap();
    check_report(&report);
}

#[test]
fn test_retrieval_of_absent_code_is_infeasible() {
    let ghost = Code::new(CodeId(999), 3, 500.0);
    let jobs = vec![Job::new(JobId::new(0), 50.0, 1, JobKind::Output, ghost, 1, 1.0)];

    let mut orchestrator = orchestrator(RunConfig::default(), 5);
    orchestrator.warm_up(&DemandConfig::reference()).unwrap();
    let err = orchestrator.run(jobs).unwrap_err();

    assert!(!err.is_fatal());
    match err {
        SimulationError::Infeasible { job, kind, time, .. } => {
            assert_eq!(job, JobId::new(0));
            assert_eq!(kind, JobKind::Output);
            assert_eq!(time, 50.0);
        }
        other => panic!("expected infeasibility, got {}", other),
    }
}

#[test]
fn test_postponement_limit_makes_trial_infeasible() {
    // an OUTPUT that keeps waiting for inputs of a code it can never get enough of
    let code = Code::new(CodeId(0), 6, 1000.0);
    let mut jobs = vec![Job::new(JobId::new(0), 0.0, 1, JobKind::Output, code, 2, 3.0)];
    for i in 1..=3 {
        jobs.push(Job::new(JobId::new(i), i as f64 * 1000.0, 0, JobKind::Input, code, 1, 1.0));
    }

    let mut run = RunConfig::default();
    run.initial_fill = 0.0;
    run.postponement_limit = 2;
    let err = orchestrator(run, 8).run(jobs).unwrap_err();

    assert!(matches!(err, SimulationError::Infeasible { kind: JobKind::Output, .. }));
}
