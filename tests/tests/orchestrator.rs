use utils::*;

use std::time::Duration;
use surge::prelude::*;
use surge::{ExitReason, RunError, RunState, StopReason, Termination};

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn skipped_warm_up_starts_with_the_load_loop() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::new([
        Step::Measure(measurement(50, 0.97)),
        Step::Measure(measurement(100, 0.97)),
        Step::Measure(measurement(150, 0.50)),
        Step::Measure(measurement(150, 0.50)),
        Step::Measure(measurement(150, 0.50)),
        Step::Measure(measurement(150, 0.50)),
        Step::Measure(measurement(150, 0.50)),
    ]);
    let writer = RecordingWriter::default();

    let config = quick_config(&target).with_test_duration(Duration::from_secs(30));
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    orchestrator.run(CancellationToken::new()).await.unwrap();

    let attacks = runner.attacks();
    assert_eq!(attacks[0].rate, 50);
    assert!(attacks
        .iter()
        .all(|attack| attack.duration == Duration::from_secs(30)));
    assert_eq!(orchestrator.state(), RunState::Done);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn warm_up_measurement_is_discarded() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::new([
        Step::Measure(measurement(20, 0.10)),
        Step::Measure(measurement(50, 0.97)),
        Step::Measure(measurement(100, 0.99)),
        Step::Fail,
    ]);
    let writer = RecordingWriter::default();

    let config = RunConfig::new(&target)
        .with_warm_up_rate(20)
        .with_warm_up_duration(Duration::from_secs(10))
        .with_rest(Duration::ZERO);
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

    let attacks = runner.attacks();
    assert_eq!(attacks[0].rate, 20);
    assert_eq!(attacks[0].duration, Duration::from_secs(10));
    assert_eq!(runner.rates(), vec![20, 50, 100, 150]);

    // The failing fourth attack ends the run; only load loop cycles are kept.
    assert_eq!(err.exit_reason(), ExitReason::ExecuteCommand);
    let reports = writer.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].measurements(),
        [measurement(50, 0.97), measurement(100, 0.99)]
    );
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn repeated_breaches_stop_the_run() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::repeating(measurement(1_000, 0.80), 10);
    let writer = RecordingWriter::default();

    let config = quick_config(&target).with_start_rate(1_000);
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    let outcome = orchestrator.run(CancellationToken::new()).await.unwrap();

    // Every cycle backs off by floor(50 * (1 - 5 / 20)) = 37.
    assert_eq!(runner.rates(), vec![1_000, 963, 926, 889, 852]);
    assert_eq!(
        outcome.termination,
        Termination::Completed(StopReason::RateTooHigh)
    );
    assert_eq!(ExitReason::from(outcome.termination), ExitReason::Ok);
    assert_eq!(outcome.history.len(), 5);

    let reports = writer.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0], outcome.history);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn convergence_stops_the_run() {
    let (_dir, target) = target_file();
    // failure 9% against a 5% threshold: floor(10 * (1 - 5 / 9)) = 4, below the noise floor.
    let runner = ScriptedRunner::repeating(measurement(100, 0.91), 3);
    let writer = RecordingWriter::default();

    let config = quick_config(&target).with_start_rate(100).with_step_rate(10);
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    let outcome = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(runner.rates(), vec![100]);
    assert_eq!(
        outcome.termination,
        Termination::Completed(StopReason::RateConverged)
    );
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn interrupt_reports_partial_results() {
    let (_dir, target) = target_file();
    let cancel = CancellationToken::new();
    let runner = ScriptedRunner::repeating(measurement(100, 0.99), 10).cancel_after(3, cancel.clone());
    let writer = RecordingWriter::default();

    let mut orchestrator = Orchestrator::new(quick_config(&target), runner.clone(), writer.clone());
    let outcome = orchestrator.run(cancel).await.unwrap();

    assert_eq!(runner.attacks().len(), 3);
    assert_eq!(outcome.termination, Termination::Interrupted);
    assert_eq!(ExitReason::from(outcome.termination).code(), 232);

    let reports = writer.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].len(), 3);
    assert_eq!(reports[0].termination(), Some(Termination::Interrupted));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn interrupt_after_warm_up_reports_nothing_measured() {
    let (_dir, target) = target_file();
    let cancel = CancellationToken::new();
    let runner = ScriptedRunner::repeating(measurement(20, 1.), 5).cancel_after(1, cancel.clone());
    let writer = RecordingWriter::default();

    let config = RunConfig::new(&target).with_rest(Duration::ZERO);
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    let outcome = orchestrator.run(cancel).await.unwrap();

    assert_eq!(runner.rates(), vec![20]);
    assert_eq!(outcome.termination, Termination::Interrupted);
    assert!(outcome.history.is_empty());
    assert_eq!(writer.reports().len(), 1);
}

#[tracing_test::traced_test]
#[tokio::test(start_paused = true)]
#[ntest::timeout(5_000)]
async fn interrupt_cuts_a_rest_short() {
    let (_dir, target) = target_file();
    let cancel = CancellationToken::new();
    let runner = ScriptedRunner::repeating(measurement(50, 1.), 10);
    let writer = RecordingWriter::default();

    let config = quick_config(&target).with_rest(Duration::from_secs(60));
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let start = tokio::time::Instant::now();
    let outcome = orchestrator.run(cancel).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(60));
    assert_eq!(runner.attacks().len(), 1);
    assert_eq!(outcome.termination, Termination::Interrupted);
    assert_eq!(outcome.history.len(), 1);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn invalid_config_runs_nothing() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::repeating(measurement(50, 1.), 1);
    let writer = RecordingWriter::default();

    let config = quick_config(&target).with_failure_threshold(12.);
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, RunError::Validation(_)));
    assert_eq!(err.exit_reason(), ExitReason::ValueOutOfRange);
    assert!(!runner.discovered());
    assert!(runner.attacks().is_empty());
    assert!(writer.reports().is_empty());
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn missing_target_runs_nothing() {
    let (dir, _target) = target_file();
    let runner = ScriptedRunner::repeating(measurement(50, 1.), 1);
    let writer = RecordingWriter::default();

    let config = quick_config(&dir.path().join("missing.txt"));
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer.clone());
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.exit_reason(), ExitReason::FileNotExist);
    assert!(runner.attacks().is_empty());
    assert!(writer.reports().is_empty());
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn unavailable_tool_runs_nothing() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::repeating(measurement(50, 1.), 1).tool_missing();
    let writer = RecordingWriter::default();

    let mut orchestrator = Orchestrator::new(quick_config(&target), runner.clone(), writer.clone());
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, RunError::ToolUnavailable(_)));
    assert_eq!(err.exit_reason(), ExitReason::ToolNotInstalled);
    assert!(runner.discovered());
    assert!(runner.attacks().is_empty());
    assert!(writer.reports().is_empty());
    assert_eq!(orchestrator.state(), RunState::ToolCheck);
}

#[tracing_test::traced_test]
#[tokio::test]
async fn failed_cycle_still_reports_prior_measurements() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::new([
        Step::Measure(measurement(50, 1.)),
        Step::Measure(measurement(100, 1.)),
        Step::Fail,
    ]);
    let writer = RecordingWriter::default();

    let mut orchestrator = Orchestrator::new(quick_config(&target), runner.clone(), writer.clone());
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

    let RunError::CommandExecution { history, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(history.len(), 2);
    assert_eq!(history.termination(), Some(Termination::Failed));
    assert_eq!(err.exit_reason().code(), 130);

    let reports = writer.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(&reports[0], history.as_ref());
    assert!(logs_contain("Attack cycle failed"));
}

#[tracing_test::traced_test]
#[tokio::test]
async fn interrupt_outlives_a_failed_report() {
    let (_dir, target) = target_file();
    let cancel = CancellationToken::new();
    let runner = ScriptedRunner::repeating(measurement(100, 0.99), 10).cancel_after(2, cancel.clone());
    let writer = RecordingWriter::failing();

    let mut orchestrator = Orchestrator::new(quick_config(&target), runner.clone(), writer.clone());
    let outcome = orchestrator.run(cancel).await.unwrap();

    assert_eq!(outcome.termination, Termination::Interrupted);
    assert_eq!(ExitReason::from(outcome.termination).code(), 232);
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(writer.reports().len(), 1);
    assert!(logs_contain("Error writing report"));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn failed_report_after_completion_is_an_error() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::repeating(measurement(100, 0.91), 1);
    let writer = RecordingWriter::failing();

    let config = quick_config(&target).with_start_rate(100).with_step_rate(10);
    let mut orchestrator = Orchestrator::new(config, runner, writer.clone());
    let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, RunError::Report(_)));
    assert_eq!(err.exit_reason().code(), 135);
    assert_eq!(writer.reports().len(), 1);
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(5_000)]
async fn zero_test_duration_attacks_for_the_default_length() {
    let (_dir, target) = target_file();
    let runner = ScriptedRunner::repeating(measurement(100, 0.91), 1);
    let writer = RecordingWriter::default();

    let config = quick_config(&target)
        .with_start_rate(100)
        .with_step_rate(10)
        .with_test_duration(Duration::ZERO);
    let mut orchestrator = Orchestrator::new(config, runner.clone(), writer);
    orchestrator.run(CancellationToken::new()).await.unwrap();

    let attacks = runner.attacks();
    assert_eq!(attacks.len(), 1);
    assert_eq!(attacks[0].duration, surge::core::DEFAULT_TEST_DURATION);
}
