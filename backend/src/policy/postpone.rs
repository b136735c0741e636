//! Postponement of infeasible jobs
//!
//! A job that cannot be dispatched now is moved right behind the first
//! later job of the opposite kind that could make it feasible:
//!
//! - INPUT waits for an OUTPUT freeing at least as much room
//!   (length and quantity both ≥ its own)
//! - OUTPUT waits for an INPUT bringing its code

use crate::models::job::{Job, JobId, JobKind};
use std::collections::VecDeque;

/// Whether `later` could unblock `job`
fn unblocks(job: &Job, later: &Job) -> bool {
    match job.kind() {
        JobKind::Input => {
            later.kind() == JobKind::Output
                && later.length() >= job.length()
                && later.quantity() >= job.quantity()
        }
        JobKind::Output => later.kind() == JobKind::Input && later.code().id == job.code().id,
    }
}

/// Move `sequence[position]` right behind its unblocking partner
///
/// Returns the partner's id, or `None` (sequence untouched) when no later
/// job qualifies.
///
/// # Example
/// ```
/// use asrs_simulator_core_rs::models::{Code, CodeId, Job, JobId, JobKind};
/// use asrs_simulator_core_rs::policy::postpone;
/// use std::collections::VecDeque;
///
/// let code = Code::new(CodeId(1), 6, 1000.0);
/// let mut sequence = VecDeque::from(vec![
///     Job::new(JobId::new(0), 0.0, 0, JobKind::Input, code, 1, 1.0),
///     Job::new(JobId::new(1), 5.0, 0, JobKind::Input, code, 1, 1.0),
///     Job::new(JobId::new(2), 9.0, 1, JobKind::Output, code, 1, 1.0),
/// ]);
///
/// assert_eq!(postpone(&mut sequence, 0), Some(JobId::new(2)));
/// let ids: Vec<u64> = sequence.iter().map(|j| j.id().serial).collect();
/// assert_eq!(ids, vec![1, 2, 0]);
/// ```
pub fn postpone(sequence: &mut VecDeque<Job>, position: usize) -> Option<JobId> {
    let job = sequence.get(position)?;
    let offset = sequence
        .iter()
        .skip(position + 1)
        .position(|later| unblocks(job, later))?;
    let partner = position + 1 + offset;
    let partner_id = sequence[partner].id();

    let mut job = sequence.remove(position)?;
    job.note_postponement();
    // removal shifted the partner to `partner - 1`
    sequence.insert(partner, job);
    Some(partner_id)
}
