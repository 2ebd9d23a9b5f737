//! Persistence tests — a `Once` pattern written through `SqliteStore`
//! survives closing and reopening the database.

use std::sync::Arc;

use abtest_pool::{
    decide, impl_pattern, CheckTiming, ControllerConfig, ExperimentController, ExperimentsConfig,
    Pattern, PatternStore, SqliteStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Grid,
    List,
    Carousel,
}

impl_pattern!(Layout { Grid = 10, List = 20, Carousel = 30 });

fn controller(store: Arc<dyn PatternStore>, decided: Layout) -> ExperimentController<&'static str, Layout> {
    ExperimentController::new(
        ControllerConfig::new("LayoutTestPattern", CheckTiming::Once),
        store,
        decide::fixed(decided),
    )
}

#[test]
fn test_once_pattern_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patterns.sqlite3");

    {
        let store: Arc<dyn PatternStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let ctl = controller(store, Layout::Carousel);
        assert_eq!(ctl.install().unwrap(), Layout::Carousel);
    }

    // "Restart": a new store and a decision function that would choose differently.
    let store: Arc<dyn PatternStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let ctl = controller(Arc::clone(&store), Layout::Grid);
    assert_eq!(ctl.install().unwrap(), Layout::Carousel);
    assert_eq!(store.get_int("LayoutTestPattern").unwrap(), Some(30));
}

#[test]
fn test_reset_persists_new_choice_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patterns.sqlite3");

    {
        let store: Arc<dyn PatternStore> = Arc::new(SqliteStore::open(&path).unwrap());
        controller(store, Layout::List).install().unwrap();
    }
    {
        let store: Arc<dyn PatternStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let ctl = controller(store, Layout::Grid);
        assert_eq!(ctl.install().unwrap(), Layout::List);
        assert_eq!(ctl.reset_pattern().unwrap(), Layout::Grid);
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.get_int("LayoutTestPattern").unwrap(), Some(Layout::Grid.to_raw()));
}

#[test]
fn test_every_time_leaves_database_empty() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let ctl: ExperimentController<&'static str, Layout> = ExperimentController::new(
        ControllerConfig::new("LayoutTestPattern", CheckTiming::EveryTime),
        store.clone(),
        decide::uniform::<Layout>,
    );
    ctl.install().unwrap();
    for _ in 0..5 {
        ctl.pattern().unwrap();
    }
    assert_eq!(store.get_int("LayoutTestPattern").unwrap(), None);
}

#[test]
fn test_config_file_drives_controller_settings() {
    let cfg = ExperimentsConfig::from_toml_str(
        r#"
        [experiments.LayoutTest]
        check_timing = "every_time"
        "#,
    )
    .unwrap();
    let settings = cfg.controller_config("LayoutTest");
    assert_eq!(settings.save_key, "LayoutTestPattern");

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let ctl: ExperimentController<&'static str, Layout> =
        ExperimentController::new(settings, store.clone(), decide::fixed(Layout::List));
    ctl.install().unwrap();
    assert!(!ctl.has_persisted_pattern().unwrap());
}
