//! End-to-end loop behavior against scripted collaborators.
//!
//! Covers the halting conditions, exit-code mapping and commit gating of
//! `LoopController::execute`.

use work_loop::core::exit::ExitReason;
use work_loop::core::types::{LoopResult, QueueStatus};
use work_loop::io::config::LoopConfig;
use work_loop::looping::LoopController;
use work_loop::test_support::{
    RecordingReporter, ScriptedCommitter, ScriptedExecutor, ScriptedQueue, ScriptedTasks,
    exec_failed, exec_ok, task_all_completed, task_available, task_no_files,
};

struct Fixture {
    cfg: LoopConfig,
    queue: ScriptedQueue,
    tasks: ScriptedTasks,
    executor: ScriptedExecutor,
    committer: ScriptedCommitter,
    reporter: RecordingReporter,
}

impl Fixture {
    fn new(max_iterations: u32) -> Self {
        Self {
            cfg: LoopConfig {
                max_iterations,
                ..LoopConfig::default()
            },
            queue: ScriptedQueue::constant(0),
            tasks: ScriptedTasks::new(vec![task_available(None)]),
            executor: ScriptedExecutor::new(vec![exec_ok()]),
            committer: ScriptedCommitter::succeeding(),
            reporter: RecordingReporter::new(),
        }
    }

    fn run(&self) -> LoopResult {
        LoopController::new(
            &self.cfg,
            &self.queue,
            &self.tasks,
            &self.executor,
            &self.committer,
            &self.reporter,
        )
        .execute()
    }
}

fn assert_completed_count_matches(result: &LoopResult) {
    let successes = result.iterations.iter().filter(|it| it.success).count();
    assert_eq!(result.completed_iterations as usize, successes);
}

#[test]
fn exhausting_the_budget_runs_every_pass() {
    for n in 1..=4 {
        let fixture = Fixture::new(n);
        let result = fixture.run();

        assert_eq!(result.iterations.len(), n as usize);
        assert_eq!(result.exit_reason, ExitReason::MaxIterationsReached);
        assert_eq!(result.exit_code, 2);
        assert_eq!(result.completed_iterations, n);
        let currents: Vec<u32> = result.iterations.iter().map(|it| it.current).collect();
        assert_eq!(currents, (1..=n).collect::<Vec<_>>());
        assert!(result.iterations.iter().all(|it| it.total == n));
        assert_completed_count_matches(&result);
    }
}

#[test]
fn non_empty_queue_halts_on_first_pass() {
    let mut fixture = Fixture::new(5);
    fixture.queue = ScriptedQueue::constant(3);
    let result = fixture.run();

    assert_eq!(result.iterations.len(), 1);
    assert!(!result.iterations[0].success);
    assert_eq!(result.exit_reason, ExitReason::QueueNotEmpty);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.completed_iterations, 0);
    assert_eq!(fixture.tasks.calls(), 0);
    assert_eq!(fixture.executor.calls(), 0);
}

#[test]
fn all_completed_halts_with_success() {
    let mut fixture = Fixture::new(5);
    fixture.tasks = ScriptedTasks::new(vec![task_all_completed()]);
    let result = fixture.run();

    assert_eq!(result.iterations.len(), 1);
    assert!(!result.iterations[0].success);
    assert_eq!(result.exit_reason, ExitReason::AllTasksCompleted);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.completed_iterations, 0);
    assert_eq!(fixture.executor.calls(), 0);
}

#[test]
fn missing_task_source_halts_with_config_code() {
    let mut fixture = Fixture::new(5);
    fixture.tasks = ScriptedTasks::new(vec![task_no_files()]);
    let result = fixture.run();

    assert_eq!(result.iterations.len(), 1);
    assert_eq!(result.exit_reason, ExitReason::NoTaskFiles);
    assert_eq!(result.exit_code, 1);
}

#[test]
fn failed_execution_then_success() {
    let mut fixture = Fixture::new(2);
    fixture.tasks = ScriptedTasks::new(vec![task_available(Some("4"))]);
    fixture.executor = ScriptedExecutor::new(vec![exec_failed(1), exec_ok()]);
    let result = fixture.run();

    assert_eq!(result.iterations.len(), 2);
    assert_eq!(result.completed_iterations, 1);
    assert!(!result.iterations[0].success);
    assert!(result.iterations[1].success);
    assert!(result.iterations[0].commit_result.is_none());
    assert!(result.iterations[1].commit_result.is_some());
    assert_eq!(fixture.committer.task_numbers(), vec![Some("4".to_string())]);
    assert_eq!(result.exit_reason, ExitReason::MaxIterationsReached);
    assert_eq!(result.exit_code, 2);
    assert_completed_count_matches(&result);
}

#[test]
fn disabled_auto_commit_never_commits() {
    let mut fixture = Fixture::new(3);
    fixture.cfg.auto_commit = false;
    fixture.executor = ScriptedExecutor::new(vec![exec_ok(), exec_failed(2), exec_ok()]);
    let result = fixture.run();

    assert!(fixture.committer.task_numbers().is_empty());
    assert!(result.iterations.iter().all(|it| it.commit_result.is_none()));
    assert!(
        result
            .iterations
            .iter()
            .all(|it| it.post_queue_status.is_none())
    );
    assert_eq!(result.completed_iterations, 2);
    // Only the pre-pass checks touch the queue.
    assert_eq!(fixture.queue.calls(), 3);
}

#[test]
fn commit_receives_task_number_or_none() {
    let mut fixture = Fixture::new(2);
    fixture.tasks = ScriptedTasks::new(vec![task_available(Some("12")), task_available(None)]);
    let result = fixture.run();

    assert_eq!(
        fixture.committer.task_numbers(),
        vec![Some("12".to_string()), None]
    );
    assert!(
        fixture
            .committer
            .options()
            .iter()
            .all(|options| options.skip_permissions)
    );
    assert_eq!(result.iterations[0].task_number.as_deref(), Some("12"));
    assert_eq!(result.iterations[1].task_number, None);
}

#[test]
fn queue_growth_after_execution_skips_commit_but_keeps_success() {
    let mut fixture = Fixture::new(2);
    fixture.queue = ScriptedQueue::new(vec![
        QueueStatus::counted(0),
        QueueStatus::counted(2),
        QueueStatus::counted(0),
        QueueStatus::counted(0),
    ]);
    let result = fixture.run();

    assert_eq!(result.iterations.len(), 2);
    assert!(result.iterations[0].success);
    assert!(result.iterations[0].commit_result.is_none());
    assert_eq!(
        result.iterations[0].post_queue_status,
        Some(QueueStatus::counted(2))
    );
    assert!(result.iterations[1].commit_result.is_some());
    assert_eq!(fixture.committer.task_numbers().len(), 1);
    assert_eq!(result.exit_reason, ExitReason::MaxIterationsReached);
}

#[test]
fn unavailable_post_check_skips_commit() {
    let mut fixture = Fixture::new(1);
    fixture.queue = ScriptedQueue::new(vec![
        QueueStatus::counted(0),
        QueueStatus::unavailable("queue command failed: boom"),
    ]);
    let result = fixture.run();

    assert!(result.iterations[0].success);
    assert!(result.iterations[0].commit_result.is_none());
    assert!(fixture.committer.task_numbers().is_empty());
}

#[test]
fn commit_failure_keeps_pass_successful() {
    let mut fixture = Fixture::new(1);
    fixture.committer = ScriptedCommitter::new(vec![exec_failed(128)]);
    let result = fixture.run();

    assert!(result.iterations[0].success);
    let commit = result.iterations[0].commit_result.as_ref().expect("commit result");
    assert!(!commit.success);
    assert_eq!(result.completed_iterations, 1);
}

#[test]
fn scenario_single_successful_pass_with_commit() {
    let mut fixture = Fixture::new(1);
    fixture.tasks = ScriptedTasks::new(vec![task_available(Some("5"))]);
    let result = fixture.run();

    assert_eq!(result.exit_code, 2);
    assert_eq!(result.completed_iterations, 1);
    assert_eq!(result.exit_reason, ExitReason::MaxIterationsReached);
    assert_eq!(result.iterations.len(), 1);
    let pass = &result.iterations[0];
    assert_eq!(pass.current, 1);
    assert!(pass.success);
    assert_eq!(pass.task_number.as_deref(), Some("5"));
    assert_eq!(fixture.committer.task_numbers(), vec![Some("5".to_string())]);
}

#[test]
fn scenario_budget_of_two_with_one_failure() {
    let mut fixture = Fixture::new(2);
    fixture.executor = ScriptedExecutor::new(vec![exec_failed(1), exec_ok()]);
    let result = fixture.run();

    assert_eq!(result.completed_iterations, 1);
    assert_eq!(result.iterations.len(), 2);
    assert_eq!(result.exit_reason, ExitReason::MaxIterationsReached);
    assert_eq!(result.exit_code, 2);
    assert_eq!(fixture.committer.task_numbers().len(), 1);
}

#[test]
fn halting_on_a_later_pass_keeps_earlier_passes() {
    let mut fixture = Fixture::new(5);
    fixture.tasks = ScriptedTasks::new(vec![
        task_available(Some("1")),
        task_available(Some("2")),
        task_all_completed(),
    ]);
    let result = fixture.run();

    assert_eq!(result.iterations.len(), 3);
    assert_eq!(result.completed_iterations, 2);
    assert_eq!(result.exit_reason, ExitReason::AllTasksCompleted);
    assert_eq!(result.exit_code, 0);
    assert_completed_count_matches(&result);
}

#[test]
fn unexpected_executor_error_ends_the_run() {
    let mut fixture = Fixture::new(3);
    fixture.executor = ScriptedExecutor::with_errors(vec![Err("broken pipe".to_string())]);
    let result = fixture.run();

    assert!(result.iterations.is_empty());
    assert_eq!(result.exit_reason, ExitReason::ExecutionError);
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.completed_iterations, 0);
}
