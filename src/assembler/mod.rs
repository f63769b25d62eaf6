//! アノテーションレコード構築
//!
//! ステップメタデータ × 画像グループ × グラウンディングを結合し、
//! (step, phase, category, 記述index, 画像) ごとに1レコードを出力する。
//!
//! ## 処理フロー
//! 1. metasteps_caption.json 読み込み
//! 2. デバイスごとに画像グループ化（scanner）
//! 3. 全デバイスの画像を連番リネーム（collector）
//! 4. デバイスごとにレコード生成・JSON出力、全体をマージ出力

pub mod split;

use crate::collector::{collect_and_rename_images, PathMapping};
use crate::error::{LabVadError, Result};
use crate::grounding::generate_grounding;
use crate::scanner::filename::{parse_image_name, parse_point_segment};
use crate::scanner::{collect_image_groups_for_device, relative_posix, GroupKey, ImageGroups};
use labvad_common::{view_name, Category, Phase, Record, StepMetadata};
use std::path::{Component, Path, PathBuf};

pub const METADATA_FILE: &str = "metasteps_caption.json";
pub const LABEL_DIR: &str = "anomalyDataset_label";
pub const MERGED_FILE: &str = "annotation.json";

/// ステップメタデータ（JSONファイルの記載順を保持）
#[derive(Debug, Clone, Default)]
pub struct Metasteps {
    steps: Vec<(String, StepMetadata)>,
}

impl Metasteps {
    pub fn from_json(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let steps = map
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_value(value)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LabVadError::FileNotFound(path.display().to_string()));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepMetadata)> {
        self.steps.iter().map(|(k, m)| (k.as_str(), m))
    }

    /// ステップキーで検索（"step1" と "1" は同一視）
    pub fn get(&self, step: &str) -> Option<&StepMetadata> {
        let wanted = folder_step(step);
        self.steps
            .iter()
            .find(|(k, _)| folder_step(k) == wanted)
            .map(|(_, m)| m)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.steps.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// メタデータのステップキーをフォルダ名の形式（stepN）に揃える
pub fn folder_step(key: &str) -> String {
    if key.starts_with("step") {
        key.to_string()
    } else {
        format!("step{}", key)
    }
}

/// 撮影デバイスの説明
pub fn check_device(device: &str) -> String {
    let camera = if device == "fix_arm" { "Realsense455" } else { "Realsense435i" };
    format!("{} mounted on {}", camera, device)
}

/// メタデータの各記述に対応するグループキー（記述indexは1始まり）
fn description_keys<'a>(
    meta: &'a Metasteps,
) -> impl Iterator<Item = (&'a str, &'a StepMetadata, Phase, Category, usize, GroupKey)> + 'a {
    meta.iter().flat_map(|(step, entry)| {
        Phase::ALL.into_iter().flat_map(move |phase| {
            Category::ALL.into_iter().flat_map(move |category| {
                let count = entry.check(phase).descriptions(category).len();
                (1..=count).map(move |i| {
                    let key = GroupKey::new(folder_step(step), phase, category.as_str(), Some(i as u32));
                    (step, entry, phase, category, i - 1, key)
                })
            })
        })
    })
}

/// 生成されるレコード数（記述ごとのグループ画像数の合計）
pub fn expected_record_count(meta: &Metasteps, groups: &ImageGroups) -> usize {
    description_keys(meta).map(|(.., key)| groups.group_size(&key)).sum()
}

fn image_point(image: &Path) -> Option<u32> {
    image.components().rev().find_map(|c| match c {
        Component::Normal(s) => s.to_str().and_then(parse_point_segment),
        _ => None,
    })
}

/// 1デバイス分のレコードを生成
///
/// # Arguments
/// * `meta` - ステップメタデータ
/// * `device` - デバイス名（fix_arm / mobile_arm）
/// * `groups` - デバイスの画像グループ
/// * `mapping` - 全デバイス共通のリネーム対応表
/// * `data_dir` - Source_Image の基準ディレクトリ
pub fn assemble_device_records(
    meta: &Metasteps,
    device: &str,
    groups: &ImageGroups,
    mapping: &PathMapping,
    data_dir: &Path,
) -> Result<Vec<Record>> {
    let check_dev = check_device(device);
    let mut records = Vec::new();

    for (step, entry, phase, category, desc_idx, key) in description_keys(meta) {
        let Some(images) = groups.get(&key) else { continue };
        let check = entry.check(phase);
        let desc = &check.descriptions(category)[desc_idx];

        for img in images {
            let name = img.file_stem().and_then(|s| s.to_str()).and_then(parse_image_name);
            records.push(Record {
                image_id: mapping.image_id(img)?,
                stage_description: entry.subtask.clone(),
                step: step.to_string(),
                phase: phase.as_str().to_string(),
                operator: entry.operator.clone(),
                obj: entry.obj.clone(),
                start_position: entry.start_position.clone(),
                dest_position: entry.dest_position.clone(),
                check_type: check.check_type.map(str::to_string),
                check_dev: check_dev.clone(),
                detection_location: check.location.map(str::to_string),
                detection_content: check.content.map(str::to_string),
                views: name.as_ref().and_then(|n| view_name(n.view)).map(str::to_string),
                distance: name.as_ref().map(|n| n.distance.clone()),
                anomaly_label: category.is_abnormal(),
                anomaly_type: desc.anomaly_type.clone(),
                anomaly_label_description: desc.description.clone(),
                caption: desc.caption.clone(),
                grounding: generate_grounding(img, desc.anomaly_type.as_deref())?,
                point: image_point(img),
                source_image: Some(relative_posix(img, data_dir)),
            });
        }
    }

    Ok(records)
}

/// レコード配列をJSONで書き出し
pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

/// デバイス別出力ファイル名
pub fn device_records_path(annotation_dir: &Path, device: &str) -> PathBuf {
    annotation_dir.join(format!("records_{}_final.json", device))
}

/// デバイス別の出力結果
#[derive(Debug, Clone)]
pub struct DeviceOutput {
    pub device: String,
    pub record_count: usize,
    pub path: PathBuf,
}

/// 構築処理の結果
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub images_copied: usize,
    pub devices: Vec<DeviceOutput>,
    pub total_records: usize,
    pub merged_path: PathBuf,
}

/// データセットフォルダ直下のデバイスフォルダ（名前順）
fn device_folders(label_dir: &Path) -> Result<Vec<PathBuf>> {
    if !label_dir.is_dir() {
        return Err(LabVadError::FolderNotFound(label_dir.display().to_string()));
    }
    let mut folders = std::fs::read_dir(label_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();
    folders.sort();
    Ok(folders)
}

/// `<project_root>/data` 配下のデータセットからレコードを構築
pub fn build_records(project_root: &Path) -> Result<BuildSummary> {
    let data_dir = project_root.join("data");
    let meta = Metasteps::load(&data_dir.join(METADATA_FILE))?;
    let annotation_dir = data_dir.join("annotation");
    std::fs::create_dir_all(&annotation_dir)?;

    let mut device_groups = Vec::new();
    let mut all_groups = ImageGroups::default();
    for folder in device_folders(&data_dir.join(LABEL_DIR))? {
        let groups = collect_image_groups_for_device(&folder)?;
        all_groups.merge(&groups);
        let device = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        device_groups.push((device, groups));
    }

    let mapping = collect_and_rename_images(project_root, &all_groups)?;

    let mut devices = Vec::new();
    let mut all_records = Vec::new();
    for (device, groups) in &device_groups {
        let records = assemble_device_records(&meta, device, groups, &mapping, &data_dir)?;
        let path = device_records_path(&annotation_dir, device);
        write_records(&path, &records)?;
        log::info!("{} 件のレコードを出力: {}", records.len(), path.display());

        devices.push(DeviceOutput { device: device.clone(), record_count: records.len(), path });
        all_records.extend(records);
    }

    let merged_path = annotation_dir.join(MERGED_FILE);
    write_records(&merged_path, &all_records)?;

    Ok(BuildSummary {
        images_copied: mapping.len(),
        devices,
        total_records: all_records.len(),
        merged_path,
    })
}
