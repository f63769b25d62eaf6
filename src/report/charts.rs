//! 統計ワークブック出力（rust_xlsxwriter）
//!
//! シートごとに数値表を書き、表を参照するレーダー・積み上げ面グラフを配置する。
//! バブルチャートの代わりに、合計件数・Mobile比率はカラースケール付きの表で示す。

use super::{Matrix, RecordStats};
use crate::error::Result;
use chrono::Local;
use rust_xlsxwriter::{
    Chart, ChartType, Color, ConditionalFormat2ColorScale, ConditionalFormat3ColorScale, Format, Workbook,
    Worksheet, XlsxError,
};
use std::path::Path;

pub const WORKBOOK_FILE: &str = "anomaly_report.xlsx";

/// グラフ1つ分の縦幅（行数）
const CHART_ROWS: u32 = 22;

/// 書き込んだ表の位置
#[derive(Debug, Clone, Copy)]
struct TableRange {
    header_row: u32,
    first_row: u32,
    last_row: u32,
    last_col: u16,
}

fn write_matrix(
    worksheet: &mut Worksheet,
    start_row: u32,
    matrix: &Matrix,
    bold: &Format,
) -> std::result::Result<TableRange, XlsxError> {
    worksheet.write_string_with_format(start_row, 0, &matrix.title, bold)?;
    let header_row = start_row + 1;
    for (c, label) in matrix.col_labels.iter().enumerate() {
        worksheet.write_string_with_format(header_row, c as u16 + 1, label, bold)?;
    }
    for (r, (label, row)) in matrix.row_labels.iter().zip(&matrix.values).enumerate() {
        let row_num = header_row + 1 + r as u32;
        worksheet.write_string(row_num, 0, label)?;
        for (c, value) in row.iter().enumerate() {
            worksheet.write_number(row_num, c as u16 + 1, *value)?;
        }
    }

    Ok(TableRange {
        header_row,
        first_row: header_row + 1,
        last_row: header_row + matrix.row_labels.len() as u32,
        last_col: matrix.col_labels.len() as u16,
    })
}

/// 表の各行を系列にしたグラフ
fn series_chart(chart_type: ChartType, sheet: &str, title: &str, range: TableRange) -> Chart {
    let mut chart = Chart::new(chart_type);
    chart.title().set_name(title);
    for row in range.first_row..=range.last_row {
        chart
            .add_series()
            .set_name((sheet, row, 0))
            .set_categories((sheet, range.header_row, 1, range.header_row, range.last_col))
            .set_values((sheet, row, 1, row, range.last_col));
    }
    chart
}

fn blues_scale() -> ConditionalFormat2ColorScale {
    ConditionalFormat2ColorScale::new()
        .set_minimum_color(Color::RGB(0xF7FBFF))
        .set_maximum_color(Color::RGB(0x08306B))
}

fn coolwarm_scale() -> ConditionalFormat3ColorScale {
    ConditionalFormat3ColorScale::new()
        .set_minimum_color(Color::RGB(0x3B4CC0))
        .set_midpoint_color(Color::RGB(0xDDDDDD))
        .set_maximum_color(Color::RGB(0xB40426))
}

/// 表とその右側のレーダーチャート
fn table_with_radar(
    worksheet: &mut Worksheet,
    sheet: &str,
    start_row: u32,
    matrix: &Matrix,
    bold: &Format,
) -> std::result::Result<u32, XlsxError> {
    let range = write_matrix(worksheet, start_row, matrix, bold)?;
    if !matrix.is_empty() {
        let chart = series_chart(ChartType::Radar, sheet, &matrix.title, range);
        worksheet.insert_chart(start_row, range.last_col + 2, &chart)?;
    }
    Ok(start_row + CHART_ROWS.max(range.last_row - start_row + 2))
}

/// 表（カラースケール付き）
fn scaled_table(
    worksheet: &mut Worksheet,
    start_row: u32,
    matrix: &Matrix,
    bold: &Format,
    diverging: bool,
) -> std::result::Result<u32, XlsxError> {
    let range = write_matrix(worksheet, start_row, matrix, bold)?;
    if !matrix.is_empty() {
        if diverging {
            worksheet.add_conditional_format(range.first_row, 1, range.last_row, range.last_col, &coolwarm_scale())?;
        } else {
            worksheet.add_conditional_format(range.first_row, 1, range.last_row, range.last_col, &blues_scale())?;
        }
    }
    Ok(range.last_row + 3)
}

fn build_workbook(stats: &RecordStats) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    // 概要
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Summary")?;
    worksheet.set_column_width(0, 28)?;
    worksheet.write_string_with_format(0, 0, "Anomaly dataset report", &bold)?;
    worksheet.write_string(1, 0, "Generated")?;
    worksheet.write_string(1, 1, Local::now().format("%Y-%m-%d %H:%M:%S").to_string())?;
    let sheets = [
        ("Views", "Abnormal vs normal per view"),
        ("TypesByView", "Anomaly types per view (all / fix / mobile)"),
        ("TypeTotals", "Anomaly type distribution per arm"),
        ("TypesByPoint", "Anomaly types per point, total and mobile ratio"),
        ("ViewsByPoint", "Abnormal count by view and point"),
    ];
    for (i, (name, description)) in sheets.iter().enumerate() {
        worksheet.write_string(3 + i as u32, 0, *name)?;
        worksheet.write_string(3 + i as u32, 1, *description)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Views")?;
    worksheet.set_column_width(0, 24)?;
    table_with_radar(worksheet, "Views", 0, &stats.abnormal_vs_normal, &bold)?;

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("TypesByView")?;
    worksheet.set_column_width(0, 24)?;
    let mut row = 0;
    for matrix in [&stats.type_by_view, &stats.type_by_view_fix, &stats.type_by_view_mobile] {
        row = table_with_radar(worksheet, "TypesByView", row, matrix, &bold)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("TypeTotals")?;
    worksheet.set_column_width(0, 16)?;
    table_with_radar(worksheet, "TypeTotals", 0, &stats.type_totals, &bold)?;

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("TypesByPoint")?;
    worksheet.set_column_width(0, 24)?;
    let fix = write_matrix(worksheet, 0, &stats.type_by_point_fix, &bold)?;
    let mobile = write_matrix(worksheet, fix.last_row + 2, &stats.type_by_point_mobile, &bold)?;
    let mut row = mobile.last_row + 3;
    row = scaled_table(worksheet, row, &stats.type_by_point_total, &bold, false)?;
    scaled_table(worksheet, row, &stats.mobile_ratio, &bold, true)?;
    if !stats.type_by_point_fix.is_empty() {
        let mut chart = Chart::new(ChartType::AreaStacked);
        chart.title().set_name("Stacked Area: Anomaly Type per Point");
        for (range, arm, matrix) in [
            (fix, "Fix", &stats.type_by_point_fix),
            (mobile, "Mobile", &stats.type_by_point_mobile),
        ] {
            for (i, anomaly_type) in matrix.row_labels.iter().enumerate() {
                let data_row = range.first_row + i as u32;
                chart
                    .add_series()
                    .set_name(format!("{} {}", arm, anomaly_type).as_str())
                    .set_categories(("TypesByPoint", range.header_row, 1, range.header_row, range.last_col))
                    .set_values(("TypesByPoint", data_row, 1, data_row, range.last_col));
            }
        }
        worksheet.insert_chart(0, fix.last_col + 2, &chart)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("ViewsByPoint")?;
    worksheet.set_column_width(0, 26)?;
    let mut row = 0;
    for matrix in [&stats.view_by_point, &stats.view_by_point_fix, &stats.view_by_point_mobile] {
        row = scaled_table(worksheet, row, matrix, &bold, false)?;
    }

    Ok(workbook)
}

/// 統計をExcelワークブックとして保存
pub fn write_workbook(stats: &RecordStats, path: &Path) -> Result<()> {
    let mut workbook = build_workbook(stats)?;
    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ArmRecords;
    use labvad_common::Record;

    fn stats() -> RecordStats {
        let rec = |view: &str, abnormal: bool, point: u32| Record {
            image_id: "data/image/0001.jpg".into(),
            views: Some(view.into()),
            anomaly_label: abnormal,
            anomaly_type: abnormal.then(|| "Missing".to_string()),
            point: Some(point),
            ..Default::default()
        };
        RecordStats::compute(&ArmRecords {
            fix: vec![rec("top-down view", true, 1), rec("left-down view", false, 2)],
            mobile: vec![rec("top-down view", true, 3)],
        })
    }

    #[test]
    fn test_write_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WORKBOOK_FILE);
        write_workbook(&stats(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // xlsx は zip コンテナ
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_write_workbook_without_abnormal_records() {
        let stats = RecordStats::compute(&ArmRecords {
            fix: vec![Record {
                views: Some("top-down view".into()),
                ..Default::default()
            }],
            mobile: Vec::new(),
        });
        let dir = tempfile::tempdir().unwrap();
        write_workbook(&stats, &dir.path().join(WORKBOOK_FILE)).unwrap();
    }
}
