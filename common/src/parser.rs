//! JSONファイル内容のパーサー
//!
//! レコード・CLIPScore結果の配列を読み込む。空入力のチェックは呼び出し側で行う。

use crate::error::Result;
use crate::types::{ClipScoreResult, Record};

/// レコード配列をパース
///
/// # Examples
/// ```
/// use labvad_common::parse_records;
///
/// let records = parse_records(r#"[{"Image_Id": "data/image/0001.jpg"}]"#).unwrap();
/// assert_eq!(records[0].image_id, "data/image/0001.jpg");
/// ```
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    Ok(serde_json::from_str(json)?)
}

/// CLIPScore結果配列をパース
pub fn parse_clip_results(json: &str) -> Result<Vec<ClipScoreResult>> {
    Ok(serde_json::from_str(json)?)
}
