use std::fs;
use std::path::Path;

use assert_cmd::Command;
use dxfmerge_core::Geometry;
use dxfmerge_io::{DocumentLoader, DxfFacade};
use predicates::prelude::*;

/// 一张只含一个图层与若干圆的最小图纸。
fn drawing(layer: &str, color: i16, xs: &[f64]) -> String {
    let mut out = String::new();
    out.push_str("  0\nSECTION\n  2\nTABLES\n  0\nTABLE\n  2\nLAYER\n 70\n1\n");
    out.push_str(&format!("  0\nLAYER\n  2\n{layer}\n 70\n0\n 62\n{color}\n  6\nContinuous\n"));
    out.push_str("  0\nENDTAB\n  0\nENDSEC\n  0\nSECTION\n  2\nENTITIES\n");
    for x in xs {
        out.push_str(&format!("  0\nCIRCLE\n  8\n{layer}\n 10\n{x:?}\n 20\n0.0\n 30\n0.0\n 40\n1.0\n"));
    }
    out.push_str("  0\nENDSEC\n  0\nEOF\n");
    out
}

fn dxfmerge(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dxfmerge").unwrap();
    // 与开发机上的配置隔离
    cmd.current_dir(dir).env_remove("DXFMERGE_CONFIG");
    cmd
}

fn circle_xs(path: &Path) -> Vec<f64> {
    DxfFacade::new()
        .load(path)
        .unwrap()
        .entities()
        .iter()
        .filter_map(|entity| match &entity.geometry {
            Geometry::Circle(circle) => Some(circle.center.x()),
            _ => None,
        })
        .collect()
}

#[test]
fn merge_explicit_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.dxf"), drawing("L1", 5, &[10.0, 11.0])).unwrap();
    fs::write(dir.path().join("a.dxf"), drawing("L1", 1, &[0.0])).unwrap();

    dxfmerge(dir.path())
        .args(["merge", "out.dxf", "b.dxf", "a.dxf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged 2 of 2 files"));

    let out = dir.path().join("out.dxf");
    assert_eq!(circle_xs(&out), [10.0, 11.0, 0.0]);
    let merged = DxfFacade::new().load(&out).unwrap();
    assert_eq!(merged.layers().get("l1").unwrap().color, 5);
}

#[test]
fn merge_folder_skips_broken_files_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    fs::create_dir(&inputs).unwrap();
    fs::write(inputs.join("01.dxf"), drawing("A", 1, &[0.0])).unwrap();
    fs::write(inputs.join("02.DXF"), "  0\nSECTION\n  2\nENTITIES\n  0\nLINE\n").unwrap();
    fs::write(inputs.join("03.dxf"), drawing("B", 2, &[5.0])).unwrap();
    fs::write(inputs.join("readme.txt"), "ignored").unwrap();

    dxfmerge(dir.path())
        .args(["merge", "merged.dxf", "--folder", "inputs", "--report", "report.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged 2 of 3 files"));

    assert_eq!(circle_xs(&dir.path().join("merged.dxf")), [0.0, 5.0]);
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report["totals"]["failed"], 1);
    assert_eq!(report["sources"][1]["state"], "failed");
}

#[test]
fn merge_with_layer_per_source_uses_file_names() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ground.dxf"), drawing("L1", 1, &[0.0])).unwrap();
    fs::write(dir.path().join("roof.dxf"), drawing("L1", 1, &[1.0])).unwrap();

    dxfmerge(dir.path())
        .args(["merge", "out.dxf", "ground.dxf", "roof.dxf", "--layer-per-source"])
        .assert()
        .success();

    let merged = DxfFacade::new().load(&dir.path().join("out.dxf")).unwrap();
    let layers: Vec<&str> = merged.entities().iter().map(|entity| entity.layer.as_str()).collect();
    assert_eq!(layers, ["ground", "roof"]);
}

#[test]
fn merge_fails_when_nothing_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.dxf"), "garbage").unwrap();

    dxfmerge(dir.path())
        .args(["merge", "out.dxf", "bad.dxf"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no files were successfully merged"));

    assert!(!dir.path().join("out.dxf").exists());
}

#[test]
fn merge_without_sources_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("empty")).unwrap();

    dxfmerge(dir.path())
        .args(["merge", "out.dxf", "--folder", "empty"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config").join("default.toml"),
        "[merge]\nextension = \"plan\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("a.plan"), drawing("L1", 1, &[3.0])).unwrap();
    fs::write(dir.path().join("b.dxf"), drawing("L1", 1, &[4.0])).unwrap();

    dxfmerge(dir.path())
        .args(["merge", "out.dxf", "--folder", "."])
        .assert()
        .success();

    assert_eq!(circle_xs(&dir.path().join("out.dxf")), [3.0]);
}

#[test]
fn collapse_groups_each_file_under_its_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("level_1.dxf"), drawing("WALLS", 1, &[0.0, 1.0])).unwrap();

    dxfmerge(dir.path())
        .args(["collapse", "level_1.dxf", "--out-dir", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("collapsed 1 of 1 files"));

    let doc = DxfFacade::new().load(&dir.path().join("out").join("level_1.dxf")).unwrap();
    assert_eq!(doc.entity_count(), 1);
    assert_eq!(doc.entities()[0].group_name(), Some("level_1"));
    assert_eq!(doc.groups().get("level_1").unwrap().entities.len(), 2);
    assert!(dir.path().join("level_1.dxf").exists());
}

#[test]
fn collapse_reports_failed_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("good.dxf"), drawing("A", 1, &[0.0])).unwrap();
    fs::write(dir.path().join("bad.dxf"), "garbage").unwrap();

    dxfmerge(dir.path())
        .args(["collapse", "--folder", ".", "--out-dir", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 2 files could not be collapsed"));

    assert!(dir.path().join("out").join("good.dxf").exists());
    assert!(!dir.path().join("out").join("bad.dxf").exists());
}
