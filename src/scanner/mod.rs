//! デバイス別ラベルフォルダのスキャン
//!
//! `<device>/pointN/stepN-<phase>/<category>/...` の階層を走査し、
//! 画像と参照テキストを (step, phase, category, index) 単位にグループ化する。

pub mod filename;

use crate::error::{LabVadError, Result};
use filename::{is_image_extension, parse_image_name, parse_reference_stem, parse_step_segment};
use labvad_common::Phase;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// 点検インスタンスを識別するキー
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// フォルダ名由来のステップ（例: "step1"）
    pub step: String,
    pub phase: Phase,
    pub category: String,
    pub index: Option<u32>,
}

impl GroupKey {
    pub fn new(step: impl Into<String>, phase: Phase, category: impl Into<String>, index: Option<u32>) -> Self {
        Self { step: step.into(), phase, category: category.into(), index }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.map(|i| i.to_string()).unwrap_or_else(|| "None".into());
        write!(f, "{}_{}_{}_{}", self.step, self.phase, self.category, index)
    }
}

/// GroupKey → 画像パス集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageGroups {
    groups: BTreeMap<GroupKey, BTreeSet<PathBuf>>,
}

impl ImageGroups {
    pub fn insert(&mut self, key: GroupKey, path: PathBuf) {
        self.groups.entry(key).or_default().insert(path);
    }

    pub fn get(&self, key: &GroupKey) -> Option<&BTreeSet<PathBuf>> {
        self.groups.get(key)
    }

    /// グループの画像数（無ければ0）
    pub fn group_size(&self, key: &GroupKey) -> usize {
        self.groups.get(key).map_or(0, |g| g.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &BTreeSet<PathBuf>)> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 全グループの画像数合計（グループ間の重複を含む）
    pub fn total_images(&self) -> usize {
        self.groups.values().map(|g| g.len()).sum()
    }

    /// 全画像（重複なし）
    pub fn all_images(&self) -> BTreeSet<&Path> {
        self.groups.values().flatten().map(|p| p.as_path()).collect()
    }

    /// 他のグループ集合をマージ（同じキーの画像は和集合）
    pub fn merge(&mut self, other: &ImageGroups) {
        for (key, paths) in &other.groups {
            self.groups.entry(key.clone()).or_default().extend(paths.iter().cloned());
        }
    }
}

/// デバイスフォルダ内のパス構造
struct PathLayout<'a> {
    /// デバイスフォルダからの相対パス要素
    parts: Vec<&'a str>,
    /// ステップフォルダの位置
    step_pos: usize,
    step: String,
    phase: Phase,
}

impl<'a> PathLayout<'a> {
    /// `stepN-<phase>/<category>/...` を含まないパスは None
    fn parse(relative: &'a Path) -> Option<Self> {
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        let (step_pos, (step, phase)) = parts
            .iter()
            .enumerate()
            .find_map(|(i, p)| parse_step_segment(p).map(|s| (i, s)))?;

        // カテゴリはディレクトリであること（ファイル名自身は不可）
        if step_pos + 2 >= parts.len() {
            return None;
        }

        Some(Self { parts, step_pos, step, phase })
    }

    fn category(&self) -> &str {
        self.parts[self.step_pos + 1]
    }

    /// ステップフォルダの親（撮影ポイントフォルダ）
    fn point_dir(&self, device_folder: &Path) -> PathBuf {
        self.parts[..self.step_pos]
            .iter()
            .fold(device_folder.to_path_buf(), |acc, p| acc.join(p))
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// デバイスフォルダを走査してグループ化（副作用なし）
pub fn scan_device(device_folder: &Path) -> Result<ImageGroups> {
    if !device_folder.is_dir() {
        return Err(LabVadError::FolderNotFound(device_folder.display().to_string()));
    }

    let mut groups = ImageGroups::default();

    for entry in WalkDir::new(device_folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let Some(ext) = lowercase_extension(path) else { continue };
        let Ok(relative) = path.strip_prefix(device_folder) else { continue };

        if is_image_extension(&ext) {
            let Some(layout) = PathLayout::parse(relative) else {
                log::debug!("ステップ構造に一致しないためスキップ: {}", path.display());
                continue;
            };
            let index = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(parse_image_name)
                .map(|n| n.index);
            let key = GroupKey::new(layout.step.clone(), layout.phase, layout.category(), index);
            groups.insert(key, path.to_path_buf());
        } else if ext == "txt" {
            collect_references(device_folder, path, relative, &mut groups);
        }
    }

    Ok(groups)
}

/// 参照テキストが指す別ステップの画像をグループに追加
fn collect_references(device_folder: &Path, path: &Path, relative: &Path, groups: &mut ImageGroups) {
    let Some(spec) = path.file_stem().and_then(|s| s.to_str()).and_then(parse_reference_stem) else {
        log::debug!("参照テキストの形式ではないためスキップ: {}", path.display());
        return;
    };
    let Some(layout) = PathLayout::parse(relative) else {
        log::debug!("ステップ構造に一致しないためスキップ: {}", path.display());
        return;
    };

    let key = GroupKey::new(layout.step.clone(), layout.phase, layout.category(), spec.index);
    let ref_folder = layout
        .point_dir(device_folder)
        .join(spec.step_folder())
        .join(&spec.ref_category);
    if !ref_folder.is_dir() {
        log::debug!("参照先フォルダが存在しません: {}", ref_folder.display());
        return;
    }

    let prefix = spec.file_prefix();
    for entry in WalkDir::new(&ref_folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let img = entry.path();
        let name_matches = img
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&prefix));
        let ext_matches = lowercase_extension(img).is_some_and(|e| is_image_extension(&e));
        if name_matches && ext_matches {
            groups.insert(key.clone(), img.to_path_buf());
        }
    }
}

/// グループ一覧をデバッグ用JSONに書き出し
///
/// 出力先: `<device_folder>/../../annotation/groups_<device>.json`
pub fn write_debug_groups(groups: &ImageGroups, device_folder: &Path) -> Result<PathBuf> {
    let data_dir = device_folder
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let debug_dir = data_dir.join("annotation");
    std::fs::create_dir_all(&debug_dir)?;

    let mut dump = serde_json::Map::new();
    for (key, paths) in groups.iter() {
        let list = paths
            .iter()
            .map(|p| serde_json::Value::String(relative_posix(p, data_dir)))
            .collect();
        dump.insert(key.to_string(), serde_json::Value::Array(list));
    }

    let device_name = device_folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let debug_file = debug_dir.join(format!("groups_{}.json", device_name));
    std::fs::write(&debug_file, serde_json::to_string_pretty(&dump)?)?;
    Ok(debug_file)
}

/// デバイスフォルダをスキャンし、デバッグ用JSONも出力する
pub fn collect_image_groups_for_device(device_folder: &Path) -> Result<ImageGroups> {
    let groups = scan_device(device_folder)?;
    let debug_file = write_debug_groups(&groups, device_folder)?;
    log::debug!(
        "{} グループ / {} 枚 → {}",
        groups.len(),
        groups.total_images(),
        debug_file.display()
    );
    Ok(groups)
}

/// base からの相対パス（`/` 区切り）。base 外なら元のパス。
pub fn relative_posix(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
