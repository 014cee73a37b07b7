//! Full poll cycles against an in-memory remote.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use simwatch::config::{CaseConfig, Transport};
use simwatch::source::MemoryRemote;
use simwatch::{App, MonitorSettings, Point, SeriesKey, SeriesKind};
use tempfile::TempDir;

const LOG: &str = "/scratch/Grid0/run.log";
const SCENE_DIR: &str = "/scratch/Grid0/Pressure";
const HEADER: &str = "Iteration  Continuity  X-momentum  Cd  Y+ maximo\n";

fn settings(out: &TempDir) -> MonitorSettings {
    let case = CaseConfig {
        transport: Transport::Local,
        base_dir: Some("/scratch".to_string()),
        simulation_folder: Some("Grid0".to_string()),
        logfile: Some("run.log".to_string()),
        reports: vec!["Cd".to_string()],
        kpis: vec!["Y+ maximo".to_string()],
        residuals: vec!["Continuity".to_string(), "X-momentum".to_string()],
        image_categories: vec!["Pressure".to_string()],
        recent_window: 5,
        ..CaseConfig::default()
    };
    let mut settings = case.settings("case05", out.path()).unwrap();
    settings.layout.width = 640;
    settings.layout.height = 400;
    settings
}

fn row(i: u64, cd: &str) -> String {
    format!(
        "TimeStep {i}: Time {}\n{i} {:e} {:e} {cd} {}\n",
        i as f64 * 0.01,
        1.0 / i as f64,
        0.1 / i as f64,
        10.0 + i as f64
    )
}

fn rows(from: u64, to: u64) -> String {
    (from..=to).map(|i| row(i, &format!("0.{i:02}"))).collect()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn ordinates(app: &App, key: &SeriesKey) -> Vec<f64> {
    app.state()
        .series
        .get(key)
        .map(|s| s.iter().map(|p| p.ordinate).collect())
        .unwrap_or_default()
}

#[test]
fn test_two_cycles_accumulate_and_reuse_scene() {
    let out = TempDir::new().unwrap();
    let remote = MemoryRemote::new();
    remote.write_file(LOG, format!("{}{}", HEADER, rows(1, 10)).as_bytes(), 1);
    remote.write_file(&format!("{}/scene_0010.png", SCENE_DIR), &png(32, 24), 100);

    let mut app = App::new(settings(&out), Box::new(remote.connector()));
    let first = app.run_cycle().unwrap();
    assert!(first.rendered);
    assert_eq!(first.scene_transfers, 1);
    assert_eq!(remote.fetch_count(), 1);

    // Second cycle: five more rows, one with a garbled report cell.
    let mut more = String::new();
    for i in 11..=15 {
        let cd = if i == 13 { "0.1x3".to_string() } else { format!("0.{i}") };
        more.push_str(&row(i, &cd));
    }
    remote.append(LOG, more.as_bytes());

    let second = app.run_cycle().unwrap();
    assert_eq!(second.dropped_cells, 1);
    assert_eq!(second.scene_transfers, 0);
    assert_eq!(remote.fetch_count(), 1);

    let continuity = ordinates(&app, &SeriesKey::residual("Continuity"));
    assert_eq!(continuity, (1..=15).map(|i| i as f64).collect::<Vec<_>>());

    let cd = ordinates(&app, &SeriesKey::report("Cd"));
    assert_eq!(cd.len(), 14);
    assert!(!cd.iter().any(|t| (t - 0.13).abs() < 1e-9));

    assert_eq!(
        app.state().series.latest(SeriesKind::Kpi, "Y+ maximo"),
        Some(Point::new(0.15, 25.0))
    );
    assert_eq!(app.state().latest_iteration(), Some(15));

    let scene = app.state().scene("Pressure").unwrap();
    assert_eq!(scene.remote_name, "scene_0010.png");
    assert!(scene.local_path.exists());

    let rendered = image::open(&app.settings().output_path).unwrap();
    assert_eq!((rendered.width(), rendered.height()), (640, 400));
}

#[test]
fn test_split_appends_match_single_read() {
    let full = format!("{}{}", HEADER, rows(1, 8));
    let cut = full.len() / 2 + 3;

    let whole_out = TempDir::new().unwrap();
    let whole_remote = MemoryRemote::new();
    whole_remote.write_file(LOG, full.as_bytes(), 1);
    let mut whole = App::new(settings(&whole_out), Box::new(whole_remote.connector()));
    whole.run_cycle().unwrap();

    // Same content, but the first poll ends mid-line.
    let split_out = TempDir::new().unwrap();
    let split_remote = MemoryRemote::new();
    split_remote.write_file(LOG, full[..cut].as_bytes(), 1);
    let mut split = App::new(settings(&split_out), Box::new(split_remote.connector()));
    let first = split.run_cycle().unwrap();
    assert_eq!(first.skipped_lines, 0);
    assert_eq!(first.dropped_cells, 0);
    split_remote.append(LOG, full[cut..].as_bytes());
    split.run_cycle().unwrap();

    for key in [
        SeriesKey::residual("Continuity"),
        SeriesKey::residual("X-momentum"),
        SeriesKey::report("Cd"),
        SeriesKey::kpi("Y+ maximo"),
    ] {
        let a = whole.state().series.get(&key).map(|s| s.points().to_vec());
        let b = split.state().series.get(&key).map(|s| s.points().to_vec());
        assert_eq!(a, b, "series {} differs", key);
    }
}

#[test]
fn test_malformed_cell_drops_only_that_sample() {
    let out = TempDir::new().unwrap();
    let remote = MemoryRemote::new();
    let mut log = String::from(HEADER);
    for i in 1..=6 {
        let line = row(i, "0.5");
        if i == 4 {
            log.push_str(&line.replace(&format!("{:e}", 1.0 / i as f64), "nan"));
        } else {
            log.push_str(&line);
        }
    }
    remote.write_file(LOG, log.as_bytes(), 1);

    let mut app = App::new(settings(&out), Box::new(remote.connector()));
    let report = app.run_cycle().unwrap();
    assert_eq!(report.dropped_cells, 1);

    assert_eq!(ordinates(&app, &SeriesKey::residual("Continuity")).len(), 5);
    assert_eq!(ordinates(&app, &SeriesKey::residual("X-momentum")).len(), 6);
    assert_eq!(ordinates(&app, &SeriesKey::report("Cd")).len(), 6);
}

#[test]
fn test_scene_without_images_renders_placeholder() {
    let out = TempDir::new().unwrap();
    let remote = MemoryRemote::new();
    remote.write_file(LOG, format!("{}{}", HEADER, rows(1, 3)).as_bytes(), 1);

    let mut app = App::new(settings(&out), Box::new(remote.connector()));
    let report = app.run_cycle().unwrap();

    assert!(report.rendered);
    assert!(app.state().scene("Pressure").is_none());
    assert!(app.settings().output_path.exists());
}
