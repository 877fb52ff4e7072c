use std::fs;

use handmouse::config::ConfigError;
use handmouse::hid::ActionIntent;
use handmouse::synthetic::HandBuilder;
use handmouse::types::DetectorFrame;
use handmouse::{Config, Mode, Pipeline};
use tempfile::TempDir;

const DT: f64 = 1.0 / 16.0;

#[test]
fn rule_table_from_file_drives_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handmouse.toml");
    fs::write(
        &path,
        r#"
        [output]
        width = 800
        height = 600

        [dispatch]
        scroll_amount = 3

        [[rules]]
        name = "FIST_SCROLL"
        pattern = "FFFFF"
        priority = 0
        action = "scroll_down"
        stability = 0.0
        cooldown = 0.25
        "#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.rules.len(), 1);
    assert_eq!(config.pipeline.mode, Mode::Mouse);

    let mut p = Pipeline::new(&config).unwrap();
    let fist = HandBuilder::new().pattern("FFFFF");
    let mut scrolls = 0;
    for k in 0..8 {
        let t = k as f64 * DT;
        let report = p.step(&DetectorFrame {
            timestamp: t,
            hands: vec![fist.build(t)],
        });
        scrolls += report
            .intents
            .iter()
            .filter(|i| matches!(i, ActionIntent::Scroll { amount: 3, .. }))
            .count();
    }
    // disparos en 0, 0.25
    assert_eq!(scrolls, 2);
}

#[test]
fn unknown_action_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
        [[rules]]
        name = "X"
        pattern = "TTTTT"
        priority = 0
        action = "teleport"
        stability = 0.1
        cooldown = 0.0
        "#,
    )
    .unwrap();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn negative_stability_is_rejected() {
    let mut config = Config::default();
    config.draw_rules[0].stability = -1.0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Rules {
            table: "draw_rules",
            ..
        })
    ));
}

#[test]
fn printed_config_loads_back_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printed.toml");
    let config = Config::default();
    fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.rules, config.rules);
    assert_eq!(loaded.draw_rules, config.draw_rules);
    assert_eq!(loaded.dispatch.scroll_amount, config.dispatch.scroll_amount);
}
