use std::path::{Path, PathBuf};

use taskhelper::engine::resolve_group;
use taskhelper::errors::TaskHelperError;
use taskhelper::fs::mock::MockFileSystem;
use taskhelper::pipeline::{HandlerContext, HandlerRegistry, InvocationOutcome, Pipeline};
use taskhelper::types::{Decision, FileGroup, Gate, HandlerClass, ResultEntry};
use taskhelper_test_utils::builders::TargetConfigBuilder;
use taskhelper_test_utils::{init_tracing, mock_session, MOCK_STORE_PATH};

fn new_file_pipeline(session: &taskhelper::engine::Session) -> Pipeline {
    Pipeline::builder("t")
        .builtin(HandlerClass::ByGroup, "newFile")
        .build(session.registry())
}

#[test]
fn store_is_committed_after_a_successful_invocation() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    let mut session = mock_session(&fs);
    let pipeline = new_file_pipeline(&session);

    let report = session
        .invoke(&pipeline, &[FileGroup::new(["/w/a.txt"], None)], None)
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(fs.contents(MOCK_STORE_PATH).unwrap().contains("/w/a.txt"));
    assert!(!session.store().is_loaded());
}

#[test]
fn store_is_committed_after_a_task_abort_that_consulted_it() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/stamp.txt", "s");
    let mut session = mock_session(&fs);

    let pipeline = Pipeline::builder("t")
        .by_task(|cx| {
            cx.store.is_new(Path::new("/w/stamp.txt"), None);
            Ok(Gate::Abort)
        })
        .build(session.registry());

    let report = session.invoke(&pipeline, &[], None).unwrap();

    assert_eq!(report.outcome, InvocationOutcome::AbortedByTask);
    assert!(fs.contents(MOCK_STORE_PATH).unwrap().contains("/w/stamp.txt"));
}

#[test]
fn store_is_committed_even_when_a_handler_fails() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    let mut session = mock_session(&fs);

    let pipeline = Pipeline::builder("t")
        .builtin(HandlerClass::ByGroup, "newFile")
        .by_group(|_cx, _sources, _dest| anyhow::bail!("boom"))
        .build(session.registry());

    let err = session
        .invoke(&pipeline, &[FileGroup::new(["/w/a.txt"], None)], None)
        .unwrap_err();

    assert!(matches!(
        err,
        TaskHelperError::HandlerFailed {
            class: HandlerClass::ByGroup,
            ..
        }
    ));
    assert!(fs.contents(MOCK_STORE_PATH).unwrap().contains("/w/a.txt"));
}

#[test]
fn untouched_store_is_not_written() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    let mut session = mock_session(&fs);

    let pipeline = Pipeline::builder("t")
        .builtin(HandlerClass::ByContent, "identity")
        .build(session.registry());

    session
        .invoke(&pipeline, &[FileGroup::new(["/w/a.txt"], Some("/w/out.txt"))], None)
        .unwrap();

    assert_eq!(fs.contents("/w/out.txt").unwrap(), "a");
    assert!(fs.contents(MOCK_STORE_PATH).is_none());
}

#[test]
fn commit_failure_alone_is_reported() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    fs.deny_writes(MOCK_STORE_PATH);
    let mut session = mock_session(&fs);
    let pipeline = new_file_pipeline(&session);

    let err = session
        .invoke(&pipeline, &[FileGroup::new(["/w/a.txt"], None)], None)
        .unwrap_err();

    match err {
        TaskHelperError::StoreWrite { path, .. } => assert_eq!(path, PathBuf::from(MOCK_STORE_PATH)),
        other => panic!("expected StoreWrite, got {other:?}"),
    }
}

#[test]
fn handler_failure_wins_over_commit_failure() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    fs.deny_writes(MOCK_STORE_PATH);
    let mut session = mock_session(&fs);

    let pipeline = Pipeline::builder("t")
        .builtin(HandlerClass::ByGroup, "newFile")
        .by_all_groups(|_cx, _results| anyhow::bail!("late failure"))
        .build(session.registry());

    let err = session
        .invoke(&pipeline, &[FileGroup::new(["/w/a.txt"], None)], None)
        .unwrap_err();

    assert!(matches!(
        err,
        TaskHelperError::HandlerFailed {
            class: HandlerClass::ByAllGroups,
            ..
        }
    ));
}

#[test]
fn later_invocations_see_earlier_baselines() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    let mut session = mock_session(&fs);
    let pipeline = new_file_pipeline(&session);
    let groups = [FileGroup::new(["/w/a.txt"], None)];

    let first = session.invoke(&pipeline, &groups, None).unwrap();
    assert_eq!(first.results.len(), 1);

    fs.advance(1);
    let second = session.invoke(&pipeline, &groups, None).unwrap();
    assert!(second.results.is_empty());

    fs.advance(10);
    fs.add_file("/w/a.txt", "edited");
    let third = session.invoke(&pipeline, &groups, None).unwrap();
    assert_eq!(third.results.len(), 1);
}

#[test]
fn all_groups_of_one_invocation_share_one_snapshot() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    let mut session = mock_session(&fs);
    let pipeline = new_file_pipeline(&session);

    // The same file in two groups: both see it as new.
    let groups = [
        FileGroup::new(["/w/a.txt"], None),
        FileGroup::new(["/w/a.txt"], None),
    ];
    let report = session.invoke(&pipeline, &groups, None).unwrap();
    assert_eq!(report.results.len(), 2);
}

#[test]
fn run_target_resolves_paths_and_skips_unchanged_bundles() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    fs.add_file("/w/b.txt", "b\n");
    let mut session = mock_session(&fs);

    let target = TargetConfigBuilder::new()
        .by_group("newFile")
        .by_content("identity")
        .files_array(true)
        .files(&["a.txt", "b.txt"], Some("dist/out.txt"))
        .build();

    let report = session.run_target("bundle", &target, Path::new("/w")).unwrap();
    assert_eq!(
        report.results,
        vec![ResultEntry {
            sources: vec!["/w/a.txt".to_string(), "/w/b.txt".to_string()],
            dest: Some("/w/dist/out.txt".to_string()),
        }]
    );
    assert_eq!(fs.contents("/w/dist/out.txt").unwrap(), "a\nb\n");

    fs.advance(5);
    let again = session.run_target("bundle", &target, Path::new("/w")).unwrap();
    assert!(again.results.is_empty());
    assert!(again.written.is_empty());
}

#[test]
fn resolve_group_keeps_absolute_paths() {
    let group = FileGroup::new(["/abs/a.txt", "rel/b.txt"], Some("out.txt"));
    let resolved = resolve_group(Path::new("/root"), &group);

    assert_eq!(resolved.sources, vec!["/abs/a.txt", "/root/rel/b.txt"]);
    assert_eq!(resolved.dest.as_deref(), Some("/root/out.txt"));
}

#[test]
fn resolve_group_collapses_dot_segments() {
    let group = FileGroup::new(["../proj/src/a.js", "/abs/./x/../b.js"], Some("./dist/out.js"));
    let resolved = resolve_group(Path::new("/home/me/tools"), &group);

    assert_eq!(resolved.sources, vec!["/home/me/proj/src/a.js", "/abs/b.js"]);
    assert_eq!(resolved.dest.as_deref(), Some("/home/me/tools/dist/out.js"));
}

fn shout(_cx: &mut HandlerContext<'_>, content: &str) -> anyhow::Result<Decision> {
    Ok(Decision::Replace(content.to_uppercase()))
}

#[test]
fn names_registered_on_the_session_resolve_from_config() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "hello");
    let mut session = mock_session(&fs);
    session.registry_mut().register_content("shout", shout);

    let target = TargetConfigBuilder::new()
        .by_content("shout")
        .files(&["a.txt"], Some("out.txt"))
        .build();
    session.run_target("loud", &target, Path::new("/w")).unwrap();

    assert_eq!(fs.contents("/w/out.txt").unwrap(), "HELLO");
}

#[test]
fn session_without_builtins_ignores_their_names() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/w/a.txt", "a");
    let mut session = mock_session(&fs).with_registry(HandlerRegistry::empty());

    let target = TargetConfigBuilder::new()
        .by_group("newFile")
        .files(&["a.txt"], None)
        .build();
    let report = session.run_target("t", &target, Path::new("/w")).unwrap();

    assert_eq!(report.outcome, InvocationOutcome::NothingToDo);
    assert!(fs.contents(MOCK_STORE_PATH).is_none());
}
