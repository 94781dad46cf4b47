//! Suite lifecycle tests against the in-memory policy backend.

use rulebench_harness::memory::{Faults, MemoryBackend};
use futures::future::BoxFuture;
use rulebench_core::{Identity, Write, fields};
use rulebench_harness::{
    CaseContext, CaseError, Expectation, FailureKind, FnCase, HarnessError, RunnerOptions,
    SuitePhase, SuiteRunner, TestCase,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn faulty(faults: Faults) -> MemoryBackend {
    MemoryBackend::new().with_faults(faults)
}

fn runner(backend: &MemoryBackend, options: RunnerOptions) -> SuiteRunner {
    SuiteRunner::new(Arc::new(backend.clone()), options)
}

fn seeds_alice(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        let listed = admin.list("pax").await?;
        ctx.check(listed.documents().is_empty(), "pax is empty at case start");
        ctx.seed(&admin, "pax/alice", fields([("name", json!("Alice"))])).await?;
        Ok(())
    })
}

fn seeds_bob(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        let listed = admin.list("pax").await?;
        ctx.check(listed.documents().is_empty(), "pax is empty at case start");
        ctx.seed(&admin, "pax/bob", fields([("name", json!("Bob"))])).await?;
        Ok(())
    })
}

fn owner_reads_stranger_denied(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.expect_allowed(alice.get("pax/alice")).await?;
        ctx.expect_denied(alice.get("pax/bob")).await?;
        Ok(())
    })
}

fn wrong_expectation(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.expect_allowed(alice.set("pax/bob", fields([("name", json!("Bob"))]))).await?;
        ctx.expect_allowed(alice.get("pax/alice")).await?;
        Ok(())
    })
}

fn touches_broken_path(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.expect_allowed(alice.get("pax/broken")).await?;
        ctx.expect_allowed(alice.get("pax/alice")).await?;
        Ok(())
    })
}

fn touches_hanging_path(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.expect_allowed(alice.get("pax/alice")).await?;
        Ok(())
    })
}

fn seeds_through_user(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let alice = ctx.user_client("alice").await?;
        ctx.seed(&alice, "pax/alice", fields([("name", json!("Alice"))])).await?;
        Ok(())
    })
}

fn concurrent_expectations(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        ctx.seed(&admin, "pax/bob", fields([("name", json!("Bob"))])).await?;
        let alice = ctx.user_client("alice").await?;
        let anon = ctx.anonymous_client().await?;
        ctx.expect_all(vec![
            (Expectation::Allowed, alice.set("pax/alice", fields([("name", json!("Alice"))]))),
            (Expectation::Denied, alice.get("pax/bob")),
            (Expectation::Denied, anon.get("pax/alice")),
            (Expectation::Allowed, admin.get("pax/bob")),
        ])
        .await?;
        Ok(())
    })
}

fn batch_denied_in_band(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
    Box::pin(async move {
        let admin = ctx.admin_client().await?;
        ctx.seed_all(
            &admin,
            vec![
                ("pax/alice", fields([("name", json!("Alice"))])),
                ("pax/bob", fields([("name", json!("Bob"))])),
            ],
        )
        .await?;
        let alice = ctx.user_client("alice").await?;
        let writes = vec![Write::Delete { path: "pax/bob".parse()? }];
        ctx.expect_denied(alice.batch_write(writes)).await?;
        Ok(())
    })
}

fn isolation_cases() -> Vec<Box<dyn TestCase>> {
    vec![
        FnCase::boxed("seeds alice", seeds_alice),
        FnCase::boxed("seeds bob", seeds_bob),
        FnCase::boxed("seeds alice again", seeds_alice),
    ]
}

#[tokio::test]
async fn reset_runs_before_every_case() {
    let backend = MemoryBackend::new();
    let report = runner(&backend, RunnerOptions::default()).run(&isolation_cases()).await.unwrap();

    assert!(report.all_passed(), "{}", report.format_summary());
    assert_eq!(backend.count("clear"), 3);

    // every case's first operation comes right after a clear
    let events = backend.events();
    let lists: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.starts_with("admin: list"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(lists.len(), 3);
    for index in lists {
        assert_eq!(events[index - 2], "clear", "events: {events:?}");
        assert_eq!(events[index - 1], "open admin");
    }
}

#[tokio::test]
async fn reversed_order_produces_identical_outcomes() {
    let forward = runner(&MemoryBackend::new(), RunnerOptions::default())
        .run(&isolation_cases())
        .await
        .unwrap();
    let reversed = runner(&MemoryBackend::new(), RunnerOptions::default().reversed(true))
        .run(&isolation_cases())
        .await
        .unwrap();

    let forward_names: Vec<&str> = forward.results.iter().map(|r| r.name.as_str()).collect();
    let reversed_names: Vec<&str> =
        reversed.results.iter().map(|r| r.name.as_str()).rev().collect();
    assert_eq!(forward_names, reversed_names);
    for (a, b) in forward.results.iter().zip(reversed.results.iter().rev()) {
        assert_eq!(a.passed, b.passed);
        assert_eq!(a.assertions, b.assertions);
    }
}

#[tokio::test]
async fn allowed_and_denied_expectations_pass() {
    let backend = MemoryBackend::new();
    let cases =
        vec![FnCase::boxed("alice reads only her own profile", owner_reads_stranger_denied)];
    let report = runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.summary.assertions, 2);
    assert!(report.results[0].assertions.iter().all(|a| a.passed));
}

#[tokio::test]
async fn mismatch_is_recorded_and_case_continues() {
    let backend = MemoryBackend::new();
    let cases = vec![FnCase::boxed("wrong expectation", wrong_expectation)];
    let report = runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();

    let case = &report.results[0];
    assert!(!case.passed);
    assert_eq!(case.assertions.len(), 2, "second assertion must still run");
    assert_eq!(case.failure_kinds(), vec![FailureKind::AssertionMismatch]);
    assert_eq!(report.summary.mismatches, 1);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn infrastructure_error_ends_case_not_suite() {
    let backend = faulty(Faults {
        broken_paths: vec!["pax/broken".into()],
        ..Default::default()
    });
    let cases = vec![
        FnCase::boxed("touches broken path", touches_broken_path),
        FnCase::boxed("alice reads only her own profile", owner_reads_stranger_denied),
    ];
    let report = runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();

    let broken = &report.results[0];
    assert!(!broken.passed);
    assert!(broken.assertions.is_empty());
    assert_eq!(broken.failure_kinds(), vec![FailureKind::Infrastructure]);
    assert!(broken.failures[0].description.contains("read pax/broken"));

    assert!(report.results[1].passed);
    assert_eq!(report.summary.infrastructure_errors, 1);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn hung_operation_times_out_as_infrastructure_error() {
    let backend = faulty(Faults {
        hanging_paths: vec!["pax/alice".into()],
        ..Default::default()
    });
    let cases = vec![FnCase::boxed("hangs", touches_hanging_path)];
    let options = RunnerOptions::default().with_operation_timeout(Duration::from_millis(50));
    let report = runner(&backend, options).run(&cases).await.unwrap();

    let case = &report.results[0];
    assert_eq!(case.failure_kinds(), vec![FailureKind::Infrastructure]);
    assert!(case.failures[0].description.contains("timed out"), "{:?}", case.failures);
}

#[tokio::test]
async fn unreachable_backend_aborts_before_any_case() {
    let backend = faulty(Faults { unreachable: true, ..Default::default() });
    let mut runner = runner(&backend, RunnerOptions::default());
    let err = runner.run(&isolation_cases()).await.unwrap_err();

    assert!(matches!(err, HarnessError::Setup(_)));
    assert!(err.is_fatal());
    assert_eq!(backend.count("clear"), 0);
    assert_eq!(runner.phase_history(), &[SuitePhase::Idle, SuitePhase::SettingUp]);
}

#[tokio::test]
async fn rejected_rules_are_a_setup_failure() {
    let backend = faulty(Faults { reject_rules: true, ..Default::default() });
    let options = RunnerOptions::default().with_rules("not rules");
    let err = runner(&backend, options).run(&isolation_cases()).await.unwrap_err();
    assert!(matches!(err, HarnessError::Setup(_)));
}

#[tokio::test]
async fn rules_are_loaded_only_when_configured() {
    let backend = MemoryBackend::new();
    runner(&backend, RunnerOptions::default()).run(&isolation_cases()).await.unwrap();
    assert_eq!(backend.loaded_rules(), None);

    let backend = MemoryBackend::new();
    let options = RunnerOptions::default().with_rules("rules_version = '2';");
    runner(&backend, options).run(&isolation_cases()).await.unwrap();
    assert_eq!(backend.loaded_rules().as_deref(), Some("rules_version = '2';"));
    assert_eq!(backend.events()[1], "rules");
}

#[tokio::test]
async fn reset_failure_aborts_with_isolation_error() {
    let backend = faulty(Faults { fail_clear_call: Some(2), ..Default::default() });
    let mut runner = runner(&backend, RunnerOptions::default());
    let err = runner.run(&isolation_cases()).await.unwrap_err();

    assert!(matches!(err, HarnessError::Isolation(_)));
    assert!(err.is_fatal());
    assert_eq!(backend.count("admin: list"), 1, "only the first case ran");
    assert_eq!(backend.count("open "), backend.count("close "), "handles closed on abort");
    assert_eq!(runner.phase(), SuitePhase::TearingDown);
}

#[tokio::test]
async fn session_open_failure_is_fatal() {
    let backend = faulty(Faults { fail_open_session: true, ..Default::default() });
    let mut runner = runner(&backend, RunnerOptions::default());
    let err = runner.run(&isolation_cases()).await.unwrap_err();
    assert!(matches!(err, HarnessError::Setup(_)));
}

#[tokio::test]
async fn every_handle_is_closed_at_teardown() {
    let backend = MemoryBackend::new();
    let cases = vec![FnCase::boxed("concurrent", concurrent_expectations)];
    runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();

    assert_eq!(backend.count("open "), 3);
    assert_eq!(backend.count("close "), 3);
    let events = backend.events();
    let first_close = events.iter().position(|e| e.starts_with("close ")).unwrap();
    assert!(events[first_close..].iter().all(|e| e.starts_with("close ") || e == "coverage"));
}

#[tokio::test]
async fn expect_all_judges_each_member() {
    let backend = MemoryBackend::new();
    let cases = vec![FnCase::boxed("concurrent", concurrent_expectations)];
    let report = runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();

    let case = &report.results[0];
    assert!(case.passed, "{}", report.format_summary());
    assert_eq!(case.assertions.len(), 4);
    assert_eq!(backend.document("pax/alice"), Some(fields([("name", json!("Alice"))])));
}

#[tokio::test]
async fn batch_write_denial_counts_as_denied() {
    let backend = MemoryBackend::new();
    let cases = vec![FnCase::boxed("batch", batch_denied_in_band)];
    let report = runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();
    assert!(report.all_passed(), "{}", report.format_summary());
    assert!(backend.document("pax/alice").is_some());
    assert!(backend.document("pax/bob").is_some());
}

#[tokio::test]
async fn seeding_through_non_admin_is_a_malformed_fixture() {
    let backend = MemoryBackend::new();
    let cases = vec![FnCase::boxed("bad fixture", seeds_through_user)];
    let report = runner(&backend, RunnerOptions::default()).run(&cases).await.unwrap();

    let case = &report.results[0];
    assert_eq!(case.failure_kinds(), vec![FailureKind::Infrastructure]);
    assert!(case.failures[0].description.contains("Malformed fixture pax/alice"));
    assert_eq!(backend.count("alice: set"), 0);
}

#[tokio::test]
async fn filter_selects_cases_by_name() {
    let backend = MemoryBackend::new();
    let options = RunnerOptions::default().with_filter("bob");
    let report = runner(&backend, options).run(&isolation_cases()).await.unwrap();
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["seeds bob"]);
}

#[tokio::test]
async fn phases_follow_the_lifecycle() {
    let backend = MemoryBackend::new();
    let cases = vec![
        FnCase::boxed("seeds alice", seeds_alice),
        FnCase::boxed("seeds bob", seeds_bob),
    ];
    let mut runner = runner(&backend, RunnerOptions::default());
    runner.run(&cases).await.unwrap();

    use SuitePhase::*;
    assert_eq!(
        runner.phase_history(),
        &[
            Idle,
            SettingUp,
            ResettingState,
            RunningCase,
            ResettingState,
            RunningCase,
            TearingDown,
            ReportingCoverage,
            Done
        ]
    );
    assert_eq!(runner.phase(), Done);
}

#[tokio::test]
async fn coverage_report_is_persisted_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("firestore-coverage.html");
    let backend = MemoryBackend::new().with_coverage(b"<html>rules hit: 3</html>");
    let options = RunnerOptions::default().with_coverage_file(&path);
    let report = runner(&backend, options).run(&isolation_cases()).await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html>rules hit: 3</html>");
    let artifact = report.coverage.unwrap();
    assert_eq!(artifact.path, path);
    assert_eq!(artifact.bytes, 25);
    assert_eq!(backend.events().last().map(String::as_str), Some("coverage"));
}

#[tokio::test]
async fn empty_coverage_report_is_still_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coverage.html");
    let backend = MemoryBackend::new().with_coverage(b"");
    let options = RunnerOptions::default().with_coverage_file(&path);
    let report = runner(&backend, options).run(&isolation_cases()).await.unwrap();

    assert!(report.coverage.unwrap().is_empty());
    assert!(path.exists());
}

#[tokio::test]
async fn coverage_failure_does_not_change_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let backend = faulty(Faults { fail_coverage: true, ..Default::default() });
    let options = RunnerOptions::default().with_coverage_file(dir.path().join("coverage.html"));
    let mut runner = runner(&backend, options);
    let report = runner.run(&isolation_cases()).await.unwrap();

    assert!(report.coverage.is_none());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(runner.phase(), SuitePhase::Done);
}

#[tokio::test]
async fn identity_attributes_do_not_change_principal_label() {
    let backend = MemoryBackend::new();
    let factory = rulebench_harness::ClientFactory::new(Arc::new(backend.clone()));
    let dataset = rulebench_core::DatasetId::default();
    let handle = factory
        .client_as(Identity::user("alice").with_attribute("role", "pax"), &dataset)
        .await
        .unwrap();

    assert_eq!(handle.get("pax/alice").describe(), "alice: read pax/alice");
    assert_eq!(factory.open_handles(), 1);
    assert_eq!(factory.close_all().await, 1);
    assert_eq!(factory.open_handles(), 0);
}
