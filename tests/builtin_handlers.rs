use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use taskhelper::config::TargetOptions;
use taskhelper::fs::mock::MockFileSystem;
use taskhelper::fs::{RealFileSystem, SystemClock};
use taskhelper::pipeline::builtin::{Identity, NewFile, SizeFilter};
use taskhelper::pipeline::{
    AllGroupsHandler, ContentHandler, GroupHandler, HandlerContext, HandlerRegistry, HandlerSpec, HandlerSpecs,
    SourceHandler,
};
use taskhelper::store::ChangeStore;
use taskhelper::types::{Decision, Gate, HandlerClass, ResultEntry};
use taskhelper_test_utils::{init_tracing, MOCK_STORE_PATH};

struct Fixture {
    fs: MockFileSystem,
    store: ChangeStore,
    options: TargetOptions,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        let fs = MockFileSystem::new();
        let store = ChangeStore::new(Arc::new(fs.clone()), Arc::new(fs.clone()), MOCK_STORE_PATH);
        Self {
            fs,
            store,
            options: TargetOptions::default(),
        }
    }

    fn new_file(&mut self, sources: &[&str], dest: Option<&str>) -> Decision {
        let sources: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
        let mut cx = HandlerContext {
            target: "t",
            options: &self.options,
            fs: &self.fs,
            store: &mut self.store,
        };
        NewFile.handle(&mut cx, &sources, dest).unwrap()
    }

    fn size(&mut self, src: &str) -> Decision {
        let mut cx = HandlerContext {
            target: "t",
            options: &self.options,
            fs: &self.fs,
            store: &mut self.store,
        };
        SizeFilter.handle(&mut cx, src, None).unwrap()
    }

    /// Track `paths` and commit, as a finished earlier run would have.
    fn committed(&mut self, paths: &[&str]) {
        for path in paths {
            self.store.is_new(Path::new(path), None);
        }
        self.store.commit().unwrap();
    }
}

#[test]
fn new_file_keeps_untracked_source_that_is_its_own_destination() {
    let mut fx = Fixture::new();
    fx.fs.add_file("/w/a.txt", "a");

    assert_eq!(fx.new_file(&["/w/a.txt"], Some("/w/a.txt")), Decision::Keep);
}

#[test]
fn new_file_same_file_follows_the_destination_baseline() {
    let mut fx = Fixture::new();
    fx.fs.add_file("/w/a.txt", "a");
    fx.committed(&["/w/a.txt"]);
    fx.fs.advance(1);

    assert_eq!(fx.new_file(&["/w/a.txt"], Some("/w/a.txt")), Decision::Drop);
}

#[test]
fn new_file_treats_a_dot_dot_spelling_as_its_destination() {
    let mut fx = Fixture::new();
    fx.fs.add_dir("/w/sub");
    fx.fs.add_file("/w/a.txt", "a");

    // Untracked: same file, so the store decides rather than mtimes.
    assert_eq!(fx.new_file(&["/w/sub/../a.txt"], Some("/w/a.txt")), Decision::Keep);

    fx.committed(&["/w/a.txt"]);
    fx.fs.advance(1);
    assert_eq!(fx.new_file(&["/w/sub/../a.txt"], Some("/w/./a.txt")), Decision::Drop);
}

#[test]
fn new_file_same_file_on_disk_ignores_dot_dot() {
    init_tracing();
    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let dest = dir.path().join("a.txt");
    std::fs::write(&dest, "a").unwrap();
    let src = dir.path().join("sub/../a.txt");

    let fs = Arc::new(RealFileSystem);
    let mut store = ChangeStore::new(fs.clone(), Arc::new(SystemClock), dir.path().join("store.json"));
    let options = TargetOptions::default();
    let mut cx = HandlerContext {
        target: "t",
        options: &options,
        fs: fs.as_ref(),
        store: &mut store,
    };

    let decision = NewFile
        .handle(
            &mut cx,
            &[src.to_string_lossy().into_owned()],
            Some(dest.to_str().unwrap()),
        )
        .unwrap();
    assert_eq!(decision, Decision::Keep);
    assert_eq!(store.baseline(&dest), Some(0));
}

#[test]
fn new_file_destination_only_group_uses_the_store() {
    let mut fx = Fixture::new();
    fx.fs.add_file("/w/out.txt", "o");
    fx.committed(&["/w/out.txt"]);
    fx.fs.advance(10);

    assert_eq!(fx.new_file(&[], Some("/w/out.txt")), Decision::Drop);

    fx.fs.add_file("/w/out.txt", "changed");
    assert_eq!(fx.new_file(&[], Some("/w/out.txt")), Decision::Keep);
}

#[test]
fn new_file_empty_group_is_dropped_without_loading_the_store() {
    let mut fx = Fixture::new();

    assert_eq!(fx.new_file(&[], None), Decision::Drop);
    assert!(!fx.store.is_loaded());
}

#[test]
fn new_file_without_destination_keeps_any_new_source() {
    let mut fx = Fixture::new();
    fx.fs.add_file("/w/a.txt", "a");
    fx.fs.add_file("/w/b.txt", "b");

    assert_eq!(fx.new_file(&["/w/a.txt", "/w/b.txt"], None), Decision::Keep);
    fx.committed(&["/w/a.txt", "/w/b.txt"]);

    fx.fs.advance(30);
    assert_eq!(fx.new_file(&["/w/a.txt", "/w/b.txt"], None), Decision::Drop);

    fx.fs.add_file("/w/b.txt", "b2");
    assert_eq!(fx.new_file(&["/w/a.txt", "/w/b.txt"], None), Decision::Keep);
}

#[test]
fn new_file_with_destination_compares_mtimes_only() {
    let mut fx = Fixture::new();
    fx.fs.add_file("/w/out.txt", "o");
    fx.fs.advance(5);
    fx.fs.add_file("/w/newer.txt", "n");
    fx.fs.add_file("/w/older.txt", "o");
    fx.fs.set_mtime("/w/older.txt", fx.fs.mtime("/w/out.txt").unwrap() - 1);
    fx.fs.add_file("/w/same.txt", "s");
    fx.fs.set_mtime("/w/same.txt", fx.fs.mtime("/w/out.txt").unwrap());

    assert_eq!(fx.new_file(&["/w/older.txt"], Some("/w/out.txt")), Decision::Drop);
    assert_eq!(fx.new_file(&["/w/same.txt"], Some("/w/out.txt")), Decision::Drop);
    assert_eq!(
        fx.new_file(&["/w/older.txt", "/w/newer.txt"], Some("/w/out.txt")),
        Decision::Keep
    );
    // A missing destination is older than any existing source.
    assert_eq!(fx.new_file(&["/w/older.txt"], Some("/w/nowhere.txt")), Decision::Keep);
    assert!(!fx.store.is_loaded());
}

#[test]
fn new_file_passes_the_target_offset_to_the_store() {
    let mut fx = Fixture::new();
    fx.options.mtime_offset = Some(0);
    fx.fs.add_file("/w/a.txt", "a");

    fx.new_file(&["/w/a.txt"], None);
    assert_eq!(fx.store.offset(), Some(0));
}

#[test]
fn size_bounds_are_inclusive() {
    let mut fx = Fixture::new();
    fx.options.min_size = Some(10);
    fx.options.max_size = Some(20);
    fx.fs.add_file("/w/9.txt", "x".repeat(9));
    fx.fs.add_file("/w/10.txt", "x".repeat(10));
    fx.fs.add_file("/w/20.txt", "x".repeat(20));
    fx.fs.add_file("/w/21.txt", "x".repeat(21));

    assert_eq!(fx.size("/w/9.txt"), Decision::Drop);
    assert_eq!(fx.size("/w/10.txt"), Decision::Keep);
    assert_eq!(fx.size("/w/20.txt"), Decision::Keep);
    assert_eq!(fx.size("/w/21.txt"), Decision::Drop);
}

#[test]
fn size_without_bounds_keeps_everything_but_missing_files() {
    let mut fx = Fixture::new();
    fx.fs.add_file("/w/empty.txt", "");

    assert_eq!(fx.size("/w/empty.txt"), Decision::Keep);
    assert_eq!(fx.size("/w/missing.txt"), Decision::Drop);
}

#[test]
fn size_zero_maximum_is_a_real_bound() {
    let mut fx = Fixture::new();
    fx.options.max_size = Some(0);
    fx.fs.add_file("/w/empty.txt", "");
    fx.fs.add_file("/w/one.txt", "1");

    assert_eq!(fx.size("/w/empty.txt"), Decision::Keep);
    assert_eq!(fx.size("/w/one.txt"), Decision::Drop);
}

#[test]
fn identity_keeps_content() {
    let mut fx = Fixture::new();
    let mut cx = HandlerContext {
        target: "t",
        options: &fx.options,
        fs: &fx.fs,
        store: &mut fx.store,
    };
    assert_eq!(Identity.handle(&mut cx, "anything").unwrap(), Decision::Keep);
}

#[test]
fn registry_knows_builtins_per_class() {
    let registry = HandlerRegistry::with_builtins();

    assert!(registry.contains(HandlerClass::BySource, "size"));
    assert!(registry.contains(HandlerClass::ByGroup, "newFile"));
    assert!(registry.contains(HandlerClass::ByContent, "identity"));
    assert!(!registry.contains(HandlerClass::ByGroup, "size"));
    assert!(!registry.contains(HandlerClass::BySource, "newfile"));
    assert!(!HandlerRegistry::empty().contains(HandlerClass::BySource, "size"));
}

fn never(_cx: &mut HandlerContext<'_>) -> anyhow::Result<Gate> {
    Ok(Gate::Abort)
}

#[test]
fn registered_names_resolve_in_configured_order() {
    let mut registry = HandlerRegistry::with_builtins();
    registry.register_task("never", never);

    let specs = HandlerSpecs {
        by_task: vec![
            HandlerSpec::Builtin("never".to_string()),
            HandlerSpec::Builtin("unknown".to_string()),
        ],
        by_group: vec![HandlerSpec::Builtin("newFile".to_string())],
        ..HandlerSpecs::default()
    };
    let set = registry.resolve(&specs);

    assert_eq!(set.by_task.len(), 1);
    assert_eq!(set.by_group.len(), 1);
    assert!(set.by_source.is_empty());
}

fn stop_after(_cx: &mut HandlerContext<'_>, results: &[ResultEntry]) -> anyhow::Result<Gate> {
    Ok(if results.is_empty() { Gate::Continue } else { Gate::Abort })
}

#[test]
fn registered_all_groups_handler_resolves_and_runs() {
    let mut fx = Fixture::new();
    let mut registry = HandlerRegistry::empty();
    registry.register_all_groups("stopAfter", stop_after);
    assert!(registry.contains(HandlerClass::ByAllGroups, "stopAfter"));
    assert!(!registry.contains(HandlerClass::ByTask, "stopAfter"));

    let specs = HandlerSpecs {
        by_all_groups: vec![HandlerSpec::Builtin("stopAfter".to_string())],
        ..HandlerSpecs::default()
    };
    let set = registry.resolve(&specs);
    assert_eq!(set.by_all_groups.len(), 1);

    let results = [ResultEntry {
        sources: vec!["/w/a.txt".to_string()],
        dest: None,
    }];
    let mut cx = HandlerContext {
        target: "t",
        options: &fx.options,
        fs: &fx.fs,
        store: &mut fx.store,
    };
    assert_eq!(set.by_all_groups[0].handle(&mut cx, &results).unwrap(), Gate::Abort);
    assert_eq!(set.by_all_groups[0].handle(&mut cx, &[]).unwrap(), Gate::Continue);
}

#[test]
fn handler_class_parses_snake_and_camel_keys() {
    for class in HandlerClass::ALL {
        assert_eq!(class.to_string().parse::<HandlerClass>(), Ok(class));
    }
    assert_eq!("handlerByFileSrc".parse::<HandlerClass>(), Ok(HandlerClass::BySource));
    assert_eq!(" handler_by_all_files ".parse::<HandlerClass>(), Ok(HandlerClass::ByAllGroups));
    assert!("handler_by_line".parse::<HandlerClass>().is_err());
}
