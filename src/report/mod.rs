//! 可視化レポート
//!
//! - CLIPScore ピボット表（CSV）
//! - アーム別レコード統計（ビュー・異常種別・撮影ポイント）
//! - 統計のExcelワークブック（レーダー・積み上げ面グラフ、カラースケール表）
//! - 異常件数ヒートマップ（PNG）

pub mod charts;
pub mod heatmap;
pub mod pivot;

use crate::assembler::device_records_path;
use crate::error::Result;
use labvad_common::{parse_records, Record, GROUPED_VIEW_ORDER, VIEW_NAMES};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 撮影ポイント（1〜11）
pub const POINTS: std::ops::RangeInclusive<u32> = 1..=11;

pub const FIX_ARM: &str = "fix_arm";
pub const MOBILE_ARM: &str = "mobile_arm";

lazy_static! {
    static ref POINT_IN_PATH_RE: Regex = Regex::new(r"(?:^|/)point(\d+)/").unwrap();
}

/// 行ラベル × 列ラベルの数値表
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub title: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(title: &str, row_labels: Vec<String>, col_labels: Vec<String>) -> Self {
        let values = vec![vec![0.0; col_labels.len()]; row_labels.len()];
        Self { title: title.to_string(), row_labels, col_labels, values }
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.row_labels.iter().position(|x| x == row)?;
        let c = self.col_labels.iter().position(|x| x == col)?;
        Some(self.values[r][c])
    }

    fn add(&mut self, row: &str, col: &str) {
        let r = self.row_labels.iter().position(|x| x == row);
        let c = self.col_labels.iter().position(|x| x == col);
        if let (Some(r), Some(c)) = (r, c) {
            self.values[r][c] += 1.0;
        }
    }

    pub fn max(&self) -> f64 {
        self.values.iter().flatten().copied().fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty() || self.col_labels.is_empty()
    }
}

/// アーム別のレコード
#[derive(Debug, Clone, Default)]
pub struct ArmRecords {
    pub fix: Vec<Record>,
    pub mobile: Vec<Record>,
}

impl ArmRecords {
    pub fn all(&self) -> impl Iterator<Item = &Record> {
        self.fix.iter().chain(&self.mobile)
    }

    pub fn is_empty(&self) -> bool {
        self.fix.is_empty() && self.mobile.is_empty()
    }
}

fn load_arm(annotation_dir: &Path, device: &str) -> Result<Vec<Record>> {
    let path = device_records_path(annotation_dir, device);
    if !path.exists() {
        log::warn!("ファイルが見つかりません: {}", path.display());
        return Ok(Vec::new());
    }
    Ok(parse_records(&std::fs::read_to_string(&path)?)?)
}

/// `records_fix_arm_final.json` / `records_mobile_arm_final.json` を読み込む
pub fn load_arm_records(annotation_dir: &Path) -> Result<ArmRecords> {
    Ok(ArmRecords {
        fix: load_arm(annotation_dir, FIX_ARM)?,
        mobile: load_arm(annotation_dir, MOBILE_ARM)?,
    })
}

/// レコードの撮影ポイント（Point → Source_Image → Image_Id の順に探す）
pub fn record_point(record: &Record) -> Option<u32> {
    record.point.or_else(|| {
        [record.source_image.as_deref(), Some(record.image_id.as_str())]
            .into_iter()
            .flatten()
            .find_map(|path| POINT_IN_PATH_RE.captures(path)?.get(1)?.as_str().parse().ok())
    })
}

fn abnormal<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<&'a Record> {
    records.into_iter().filter(|r| r.anomaly_label).collect()
}

/// 指定順のうちレコードに出現するビュー
fn present_views<'a>(order: &[&str], records: &[&'a Record]) -> Vec<String> {
    order
        .iter()
        .filter(|v| records.iter().any(|r| r.views.as_deref() == Some(**v)))
        .map(|v| v.to_string())
        .collect()
}

/// 異常レコードの異常種別（名前順、重複なし）
pub fn anomaly_types<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
    let mut types: Vec<String> = abnormal(records)
        .into_iter()
        .filter_map(|r| r.anomaly_type.clone())
        .collect();
    types.sort();
    types.dedup();
    types
}

fn point_labels() -> Vec<String> {
    POINTS.map(|p| p.to_string()).collect()
}

/// ビューごとの異常・正常件数（行: Abnormal / Normal）
pub fn abnormal_vs_normal_by_view(records: &[&Record]) -> Matrix {
    let views = present_views(&VIEW_NAMES, records);
    let mut m = Matrix::zeros(
        "Abnormal vs Normal Counts per View",
        vec!["Abnormal".into(), "Normal".into()],
        views,
    );
    for r in records {
        let Some(view) = r.views.as_deref() else { continue };
        m.add(if r.anomaly_label { "Abnormal" } else { "Normal" }, view);
    }
    m
}

/// 異常種別 × ビューの件数（異常レコードのみ）
pub fn anomaly_type_by_view(title: &str, records: &[&Record], views: &[String], types: &[String]) -> Matrix {
    let mut m = Matrix::zeros(title, types.to_vec(), views.to_vec());
    for r in abnormal(records.iter().copied()) {
        if let (Some(t), Some(v)) = (r.anomaly_type.as_deref(), r.views.as_deref()) {
            m.add(t, v);
        }
    }
    m
}

/// 異常件数のビュー × ポイント（ビューは down → horizontal → up の順）
pub fn abnormal_view_by_point(title: &str, records: &[&Record]) -> Matrix {
    let abn = abnormal(records.iter().copied());
    let views = present_views(&GROUPED_VIEW_ORDER, &abn);
    let mut m = Matrix::zeros(title, views, point_labels());
    for r in abn {
        if let (Some(v), Some(p)) = (r.views.as_deref(), record_point(r)) {
            m.add(v, &p.to_string());
        }
    }
    m
}

/// 異常種別 × ポイントの件数
pub fn anomaly_type_by_point(title: &str, records: &[&Record], types: &[String]) -> Matrix {
    let mut m = Matrix::zeros(title, types.to_vec(), point_labels());
    for r in abnormal(records.iter().copied()) {
        if let (Some(t), Some(p)) = (r.anomaly_type.as_deref(), record_point(r)) {
            m.add(t, &p.to_string());
        }
    }
    m
}

/// アーム別の異常種別件数（行: Fix Arm / Mobile Arm）
pub fn anomaly_type_totals(fix: &[&Record], mobile: &[&Record], types: &[String]) -> Matrix {
    let mut m = Matrix::zeros(
        "Anomaly Type Distribution",
        vec!["Fix Arm".into(), "Mobile Arm".into()],
        types.to_vec(),
    );
    for (label, records) in [("Fix Arm", fix), ("Mobile Arm", mobile)] {
        for r in abnormal(records.iter().copied()) {
            if let Some(t) = r.anomaly_type.as_deref() {
                m.add(label, t);
            }
        }
    }
    m
}

/// 2アーム合計と Mobile / Total 比
pub fn total_and_mobile_ratio(fix: &Matrix, mobile: &Matrix) -> (Matrix, Matrix) {
    let mut total = Matrix::zeros(
        "Total Abnormal Count by Point and Type",
        fix.row_labels.clone(),
        fix.col_labels.clone(),
    );
    let mut ratio = Matrix::zeros(
        "Mobile Ratio by Point and Type",
        fix.row_labels.clone(),
        fix.col_labels.clone(),
    );
    for (r, row) in fix.row_labels.iter().enumerate() {
        for (c, col) in fix.col_labels.iter().enumerate() {
            let f = fix.values[r][c];
            let m = mobile.get(row, col).unwrap_or(0.0);
            total.values[r][c] = f + m;
            ratio.values[r][c] = if f + m > 0.0 { m / (f + m) } else { 0.0 };
        }
    }
    (total, ratio)
}

/// レポート用の統計一式
#[derive(Debug, Clone)]
pub struct RecordStats {
    pub abnormal_vs_normal: Matrix,
    pub type_by_view: Matrix,
    pub type_by_view_fix: Matrix,
    pub type_by_view_mobile: Matrix,
    pub type_totals: Matrix,
    pub view_by_point: Matrix,
    pub view_by_point_fix: Matrix,
    pub view_by_point_mobile: Matrix,
    pub type_by_point_fix: Matrix,
    pub type_by_point_mobile: Matrix,
    pub type_by_point_total: Matrix,
    pub mobile_ratio: Matrix,
}

impl RecordStats {
    pub fn compute(records: &ArmRecords) -> Self {
        let fix: Vec<&Record> = records.fix.iter().collect();
        let mobile: Vec<&Record> = records.mobile.iter().collect();
        let all: Vec<&Record> = records.all().collect();

        let types = anomaly_types(all.iter().copied());
        let abnormal_views = present_views(&VIEW_NAMES, &abnormal(all.iter().copied()));

        let type_by_point_fix = anomaly_type_by_point("Fix Arm Anomaly Type per Point", &fix, &types);
        let type_by_point_mobile = anomaly_type_by_point("Mobile Arm Anomaly Type per Point", &mobile, &types);
        let (type_by_point_total, mobile_ratio) = total_and_mobile_ratio(&type_by_point_fix, &type_by_point_mobile);

        Self {
            abnormal_vs_normal: abnormal_vs_normal_by_view(&all),
            type_by_view: anomaly_type_by_view("Anomaly Types Across Views", &all, &abnormal_views, &types),
            type_by_view_fix: anomaly_type_by_view("Anomaly Types per View (Fix Arm)", &fix, &abnormal_views, &types),
            type_by_view_mobile: anomaly_type_by_view(
                "Anomaly Types per View (Mobile Arm)",
                &mobile,
                &abnormal_views,
                &types,
            ),
            type_totals: anomaly_type_totals(&fix, &mobile, &types),
            view_by_point: abnormal_view_by_point("Abnormal Count by View and Point", &all),
            view_by_point_fix: abnormal_view_by_point("Fix Arm Abnormal Count by View and Point", &fix),
            view_by_point_mobile: abnormal_view_by_point("Mobile Arm Abnormal Count by View and Point", &mobile),
            type_by_point_fix,
            type_by_point_mobile,
            type_by_point_total,
            mobile_ratio,
        }
    }
}

/// レポート出力の結果
#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    pub pivot_files: Vec<PathBuf>,
    pub workbook: Option<PathBuf>,
    pub heatmaps: Vec<PathBuf>,
}

/// `<project_root>/data` 配下のデータからレポートを出力
pub fn run_reports(project_root: &Path) -> Result<ReportSummary> {
    let data_dir = project_root.join("data");
    let mut summary = ReportSummary::default();

    let clip_dir = data_dir.join("clipscores");
    let results = pivot::load_clip_results_dir(&clip_dir)?;
    match pivot::write_pivot_reports(&results, &clip_dir.join("reports"))? {
        Some(files) => summary.pivot_files = files,
        None => log::warn!("有効なCLIPScoreデータがありません: {}", clip_dir.display()),
    }

    let records = load_arm_records(&data_dir.join("annotation"))?;
    if records.is_empty() {
        log::warn!("レコードが無いためグラフ出力をスキップします");
        return Ok(summary);
    }

    let plot_dir = data_dir.join("plot");
    std::fs::create_dir_all(&plot_dir)?;
    let stats = RecordStats::compute(&records);

    let workbook = plot_dir.join(charts::WORKBOOK_FILE);
    charts::write_workbook(&stats, &workbook)?;
    summary.workbook = Some(workbook);

    for (matrix, name) in [
        (&stats.view_by_point, "heatmap_abn_view_point_ordered.png"),
        (&stats.view_by_point_fix, "heatmap_fix_abn_view_point.png"),
        (&stats.view_by_point_mobile, "heatmap_mob_abn_view_point.png"),
    ] {
        let path = plot_dir.join(name);
        heatmap::render_heatmap(matrix, &path)?;
        summary.heatmaps.push(path);
    }

    Ok(summary)
}
