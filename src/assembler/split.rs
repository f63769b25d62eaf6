//! デバイス別レコードのステップ分割

use super::{device_records_path, write_records};
use crate::error::{LabVadError, Result};
use labvad_common::{parse_records, Record};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `records_<device>_final.json` を `<device>_<step>.json` に分割
///
/// # Returns
/// (step, 件数, 出力パス) のリスト（step名順）
pub fn split_by_step(project_root: &Path, device: &str) -> Result<Vec<(String, usize, PathBuf)>> {
    let annotation_dir = project_root.join("data").join("annotation");
    let input = device_records_path(&annotation_dir, device);
    if !input.exists() {
        return Err(LabVadError::FileNotFound(input.display().to_string()));
    }

    let records = parse_records(&std::fs::read_to_string(&input)?)?;
    let mut by_step: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        by_step.entry(record.step.clone()).or_default().push(record);
    }

    let mut outputs = Vec::new();
    for (step, records) in by_step {
        let path = annotation_dir.join(format!("{}_{}.json", device, step));
        write_records(&path, &records)?;
        outputs.push((step, records.len(), path));
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_split_by_step() {
        let dir = tempdir().unwrap();
        let annotation_dir = dir.path().join("data").join("annotation");
        let records: Vec<Record> = ["step1", "step2", "step1"]
            .iter()
            .enumerate()
            .map(|(i, step)| Record {
                image_id: format!("data/image/{:04}.jpg", i + 1),
                step: step.to_string(),
                ..Default::default()
            })
            .collect();
        write_records(&device_records_path(&annotation_dir, "fix_arm"), &records).unwrap();

        let outputs = split_by_step(dir.path(), "fix_arm").unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, "step1");
        assert_eq!(outputs[0].1, 2);
        assert!(annotation_dir.join("fix_arm_step2.json").exists());
    }

    #[test]
    fn test_split_missing_input() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            split_by_step(dir.path(), "mobile_arm"),
            Err(LabVadError::FileNotFound(_))
        ));
    }
}
