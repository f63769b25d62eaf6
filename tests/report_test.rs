//! レポート出力の結合テスト

use labvad::assembler::{device_records_path, write_records};
use labvad::report::{self, charts::WORKBOOK_FILE};
use labvad_common::{ClipScoreResult, Record};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn clip_result(distance: &str, view: u32, score: Option<f64>) -> ClipScoreResult {
    ClipScoreResult {
        image_id: "data/image/0001.jpg".into(),
        absolute_path: "/tmp/data/image/0001.jpg".into(),
        clip_score: score,
        ref_clip_score: None,
        description: String::new(),
        caption: String::new(),
        distance: Some(distance.into()),
        view: Some(view),
    }
}

fn arm_record(view: &str, anomaly_type: Option<&str>, point: u32) -> Record {
    Record {
        image_id: "data/image/0001.jpg".into(),
        views: Some(view.into()),
        anomaly_label: anomaly_type.is_some(),
        anomaly_type: anomaly_type.map(str::to_string),
        point: Some(point),
        ..Default::default()
    }
}

fn write_clipscores(root: &Path) {
    let dir = root.join("data").join("clipscores");
    fs::create_dir_all(&dir).unwrap();
    let fix = vec![clip_result("near", 0, Some(0.5)), clip_result("far", 0, Some(0.7))];
    let mobile = vec![clip_result("near", 2, Some(0.9)), clip_result("near", 2, None)];
    fs::write(dir.join("fix_results.json"), serde_json::to_string(&fix).unwrap()).unwrap();
    fs::write(dir.join("mobile_results.json"), serde_json::to_string(&mobile).unwrap()).unwrap();
    // 形式の異なるJSONは無視される
    fs::write(dir.join("notes.json"), r#"{"note": 1}"#).unwrap();
}

#[test]
fn test_run_reports_full() {
    let dir = tempdir().unwrap();
    write_clipscores(dir.path());

    let annotation = dir.path().join("data").join("annotation");
    write_records(
        &device_records_path(&annotation, "fix_arm"),
        &[
            arm_record("top-down view", Some("Missing"), 1),
            arm_record("left-down view", None, 2),
        ],
    )
    .unwrap();
    write_records(
        &device_records_path(&annotation, "mobile_arm"),
        &[arm_record("left 90° downward view", Some("Transformer Failure"), 11)],
    )
    .unwrap();

    let summary = report::run_reports(dir.path()).unwrap();
    assert_eq!(summary.pivot_files.len(), 3);
    assert_eq!(summary.heatmaps.len(), 3);

    let reports = dir.path().join("data/clipscores/reports");
    let count = fs::read_to_string(reports.join("clipscore_count.csv")).unwrap();
    assert_eq!(count.lines().next(), Some("distance,0,2,Total"));
    assert!(count.lines().any(|l| l == "Total,2,1,3"));

    let workbook = dir.path().join("data/plot").join(WORKBOOK_FILE);
    assert!(workbook.exists());
    for heatmap in &summary.heatmaps {
        assert!(image::open(heatmap).is_ok(), "{}", heatmap.display());
    }
}

#[test]
fn test_run_reports_with_missing_inputs() {
    let dir = tempdir().unwrap();

    // どちらの入力も無い → 警告のみでエラーにはしない
    let summary = report::run_reports(dir.path()).unwrap();
    assert!(summary.pivot_files.is_empty());
    assert!(summary.workbook.is_none());
    assert!(summary.heatmaps.is_empty());
}

#[test]
fn test_run_reports_with_one_arm() {
    let dir = tempdir().unwrap();
    let annotation = dir.path().join("data").join("annotation");
    write_records(
        &device_records_path(&annotation, "fix_arm"),
        &[arm_record("front-up view", Some("Missing"), 5)],
    )
    .unwrap();

    let summary = report::run_reports(dir.path()).unwrap();
    assert!(summary.workbook.is_some());
    assert_eq!(summary.heatmaps.len(), 3);
}
