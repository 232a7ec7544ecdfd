use assert_cmd::cargo::cargo_bin_cmd;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const PAGE_COLOR: Rgba<u8> = Rgba([200, 30, 60, 255]);

/// Solid 300x200 PNG
fn fixture(dir: &Path) -> PathBuf {
    let path = dir.join("page.png");
    RgbaImage::from_pixel(300, 200, PAGE_COLOR)
        .save(&path)
        .expect("fixture should be written");
    path
}

#[test]
fn inspect_emits_layout_json() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let output = cargo_bin_cmd!("docview")
        .arg("inspect")
        .arg(fixture(temp.path()))
        .arg("--viewport")
        .arg("348x400")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["viewport"]["width"], 348);
    assert_eq!(value["scale"]["initial"], 1.0);
    assert_eq!(value["page_margin"], 24);
    assert_eq!(value["document"]["width"], 348);
    assert_eq!(value["document"]["height"], 248);
    assert_eq!(value["tile"]["width"], 320);
    assert_eq!(value["rows"], 1);

    let pages = value["pages"].as_array().expect("pages should be an array");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["original"]["width"], 300);
    assert_eq!(pages[0]["top"], 24);
    assert_eq!(pages[0]["columns"], 1);
}

#[test]
fn render_writes_viewport_png() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let output_path = temp.path().join("out/frame.png");

    cargo_bin_cmd!("docview")
        .arg("render")
        .arg(fixture(temp.path()))
        .arg("--viewport")
        .arg("348x400")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("frame.png"));

    let image = image::open(&output_path)
        .expect("frame should be readable image")
        .to_rgba8();
    assert_eq!(image.dimensions(), (348, 400));
    // The page is centered vertically in the view
    assert_eq!(*image.get_pixel(174, 200), PAGE_COLOR);
    assert_ne!(*image.get_pixel(174, 10), PAGE_COLOR);
}

#[test]
fn render_applies_zoom_and_scroll() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let output_path = temp.path().join("zoomed.png");

    cargo_bin_cmd!("docview")
        .arg("render")
        .arg(fixture(temp.path()))
        .arg("--viewport")
        .arg("200x100")
        .arg("--zoom")
        .arg("2")
        .arg("--scroll")
        .arg("100,100")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path)
        .expect("frame should be readable image")
        .to_rgba8();
    assert_eq!(image.dimensions(), (200, 100));
    assert!(image.pixels().all(|pixel| *pixel == PAGE_COLOR));
}

#[test]
fn render_rejects_bad_viewport() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    cargo_bin_cmd!("docview")
        .arg("render")
        .arg(fixture(temp.path()))
        .arg("--viewport")
        .arg("wide")
        .arg("--output")
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected WxH"));
}

#[test]
fn inspect_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    cargo_bin_cmd!("docview")
        .arg("inspect")
        .arg(temp.path().join("missing.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn inspect_fails_for_invalid_image() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("broken.png");
    fs::write(&path, b"not an image").expect("fixture should be written");

    cargo_bin_cmd!("docview")
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open document"));
}

#[test]
fn inspect_honours_config_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("docview.toml");
    fs::write(&config, "[tiles]\ntile_width = 128\ntile_height = 128\n")
        .expect("config should be written");

    let output = cargo_bin_cmd!("docview")
        .arg("inspect")
        .arg(fixture(temp.path()))
        .arg("--viewport")
        .arg("348x400")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["tile"]["width"], 128);
    assert_eq!(value["rows"], 2);
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("docview")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
