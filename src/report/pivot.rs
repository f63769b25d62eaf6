//! CLIPScore ピボット表（distance × view）
//!
//! 平均は `Average`、合計・件数は `Total` のマージン行・列を付けてCSV出力する。
//! 該当データの無いセルは空欄。

use crate::error::Result;
use labvad_common::{parse_clip_results, ClipScoreResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// ピボット対象の1件
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub distance: String,
    pub view: u32,
    pub score: f64,
}

/// 画像名 `<idx>_<distance>_<view>` から (distance, view) を取り出す
fn parse_id_stem(image_id: &str) -> Option<(String, u32)> {
    let stem = Path::new(image_id).file_stem()?.to_str()?;
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        [_, distance, view] => Some((distance.to_string(), view.parse().ok()?)),
        _ => None,
    }
}

/// スコアと distance/view が揃った結果だけを取り出す
///
/// distance/view は結果のフィールドを優先し、無ければ画像IDから読む。
pub fn score_entries(results: &[ClipScoreResult]) -> Vec<ScoreEntry> {
    results
        .iter()
        .filter_map(|r| {
            let score = r.clip_score?;
            let (distance, view) = match (&r.distance, r.view) {
                (Some(d), Some(v)) => (d.clone(), v),
                _ => parse_id_stem(&r.image_id)?,
            };
            Some(ScoreEntry { distance, view, score })
        })
        .collect()
}

/// 集計方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Mean,
    Sum,
    Count,
}

impl Aggregate {
    pub const ALL: [Aggregate; 3] = [Aggregate::Mean, Aggregate::Sum, Aggregate::Count];

    pub fn margin_name(&self) -> &'static str {
        match self {
            Aggregate::Mean => "Average",
            Aggregate::Sum | Aggregate::Count => "Total",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Aggregate::Mean => "clipscore_avg.csv",
            Aggregate::Sum => "clipscore_sum.csv",
            Aggregate::Count => "clipscore_count.csv",
        }
    }

    fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        Some(match self {
            Aggregate::Mean => sum / values.len() as f64,
            Aggregate::Sum => sum,
            Aggregate::Count => values.len() as f64,
        })
    }
}

/// マージン付きピボット表
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub aggregate: Aggregate,
    /// distance（名前順）
    pub rows: Vec<String>,
    /// view index（昇順）
    pub columns: Vec<u32>,
    /// rows × columns の値、最終列・最終行がマージン
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn build(entries: &[ScoreEntry], aggregate: Aggregate) -> Self {
        let mut by_cell: BTreeMap<(&str, u32), Vec<f64>> = BTreeMap::new();
        let mut by_row: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        let mut by_col: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for e in entries {
            by_cell.entry((e.distance.as_str(), e.view)).or_default().push(e.score);
            by_row.entry(e.distance.as_str()).or_default().push(e.score);
            by_col.entry(e.view).or_default().push(e.score);
        }
        let all: Vec<f64> = entries.iter().map(|e| e.score).collect();

        let rows: Vec<String> = by_row.keys().map(|r| r.to_string()).collect();
        let columns: Vec<u32> = by_col.keys().copied().collect();

        let mut cells: Vec<Vec<Option<f64>>> = by_row
            .iter()
            .map(|(row, row_values)| {
                columns
                    .iter()
                    .map(|col| by_cell.get(&(*row, *col)).and_then(|v| aggregate.apply(v)))
                    .chain(std::iter::once(aggregate.apply(row_values)))
                    .collect()
            })
            .collect();
        cells.push(
            by_col
                .values()
                .map(|v| aggregate.apply(v))
                .chain(std::iter::once(aggregate.apply(&all)))
                .collect(),
        );

        Self { aggregate, rows, columns, cells }
    }

    /// マージン込みの値
    pub fn get(&self, row: &str, view: Option<u32>) -> Option<f64> {
        let r = if row == self.aggregate.margin_name() {
            self.rows.len()
        } else {
            self.rows.iter().position(|x| x == row)?
        };
        let c = match view {
            Some(v) => self.columns.iter().position(|&x| x == v)?,
            None => self.columns.len(),
        };
        self.cells.get(r)?.get(c).copied().flatten()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let margin = self.aggregate.margin_name();

        let header = std::iter::once("distance".to_string())
            .chain(self.columns.iter().map(|c| c.to_string()))
            .chain(std::iter::once(margin.to_string()));
        writer.write_record(header)?;

        let labels = self.rows.iter().map(String::as_str).chain(std::iter::once(margin));
        for (label, row) in labels.zip(&self.cells) {
            let fields = std::iter::once(label.to_string())
                .chain(row.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
            writer.write_record(fields)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// `dir` 直下の `*.json` を名前順に読み込む（パースできないファイルは警告して除外）
pub fn load_clip_results_dir(dir: &Path) -> Result<Vec<ClipScoreResult>> {
    if !dir.is_dir() {
        log::warn!("フォルダが見つかりません: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut results = Vec::new();
    for file in files {
        match parse_clip_results(&std::fs::read_to_string(&file)?) {
            Ok(mut parsed) => results.append(&mut parsed),
            Err(e) => log::warn!("CLIPScore結果として読めません: {}: {}", file.display(), e),
        }
    }
    Ok(results)
}

/// 3種類のピボット表をCSVで出力
///
/// 有効なエントリが無ければ何も書かずに None を返す。
pub fn write_pivot_reports(results: &[ClipScoreResult], output_dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    let entries = score_entries(results);
    if entries.is_empty() {
        return Ok(None);
    }

    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for aggregate in Aggregate::ALL {
        let path = output_dir.join(aggregate.file_name());
        PivotTable::build(&entries, aggregate).write_csv(&path)?;
        written.push(path);
    }
    Ok(Some(written))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(distance: &str, view: u32, score: f64) -> ScoreEntry {
        ScoreEntry { distance: distance.into(), view, score }
    }

    fn result(image_id: &str, score: Option<f64>) -> ClipScoreResult {
        ClipScoreResult {
            image_id: image_id.into(),
            absolute_path: String::new(),
            clip_score: score,
            ref_clip_score: None,
            description: String::new(),
            caption: String::new(),
            distance: None,
            view: None,
        }
    }

    #[test]
    fn test_score_entries_sources() {
        let mut with_fields = result("data/image/0001.jpg", Some(0.5));
        with_fields.distance = Some("far".into());
        with_fields.view = Some(4);

        let entries = score_entries(&[
            with_fields,
            result("3_near_2.jpg", Some(0.7)),
            result("data/image/0002.jpg", Some(0.9)),
            result("3_near_2.jpg", None),
        ]);
        assert_eq!(entries, vec![entry("far", 4, 0.5), entry("near", 2, 0.7)]);
    }

    #[test]
    fn test_pivot_mean_with_margins() {
        let entries = vec![entry("near", 0, 1.0), entry("near", 0, 2.0), entry("far", 1, 3.0)];
        let table = PivotTable::build(&entries, Aggregate::Mean);

        assert_eq!(table.rows, vec!["far", "near"]);
        assert_eq!(table.columns, vec![0, 1]);
        assert_eq!(table.get("near", Some(0)), Some(1.5));
        assert_eq!(table.get("near", Some(1)), None);
        assert_eq!(table.get("near", None), Some(1.5));
        assert_eq!(table.get("Average", Some(1)), Some(3.0));
        assert_eq!(table.get("Average", None), Some(2.0));
    }

    #[test]
    fn test_pivot_count_and_sum() {
        let entries = vec![entry("near", 0, 1.0), entry("near", 3, 2.0), entry("far", 3, 3.0)];
        let count = PivotTable::build(&entries, Aggregate::Count);
        assert_eq!(count.get("Total", None), Some(3.0));
        assert_eq!(count.get("Total", Some(3)), Some(2.0));

        let sum = PivotTable::build(&entries, Aggregate::Sum);
        assert_eq!(sum.get("near", None), Some(3.0));
        assert_eq!(sum.get("Total", None), Some(6.0));
    }

    #[test]
    fn test_write_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avg.csv");
        let table = PivotTable::build(&[entry("near", 0, 1.0), entry("far", 1, 2.0)], Aggregate::Mean);
        table.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "distance,0,1,Average");
        assert_eq!(lines[1], "far,,2,2");
        assert_eq!(lines[2], "near,1,,1");
        assert_eq!(lines[3], "Average,1,2,1.5");
    }

    #[test]
    fn test_write_pivot_reports_without_entries() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_pivot_reports(&[result("0001.jpg", Some(1.0))], dir.path()).unwrap();
        assert!(written.is_none());
        assert!(!dir.path().join("clipscore_avg.csv").exists());
    }
}
