//! 画像の収集・連番リネーム
//!
//! 全グループの画像を重複除去し、`data/image/NNNN.jpg` へコピーする。
//! 番号は解決済み絶対パスの文字列順で振るため、同じ入力なら何度実行しても同じ名前になる。

use crate::error::{LabVadError, Result};
use crate::scanner::{relative_posix, ImageGroups};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 元画像（解決済みパス）→ 新しい相対パス
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathMapping {
    entries: BTreeMap<PathBuf, PathBuf>,
}

impl PathMapping {
    /// 元画像パスに対応する新パス（project_root 相対）
    pub fn get(&self, original: &Path) -> Result<&Path> {
        let resolved = original.canonicalize()?;
        self.entries
            .get(&resolved)
            .map(PathBuf::as_path)
            .ok_or_else(|| LabVadError::MissingMapping(original.display().to_string()))
    }

    /// レコードの Image_Id（`/` 区切り）
    pub fn image_id(&self, original: &Path) -> Result<String> {
        Ok(relative_posix(self.get(original)?, Path::new("")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_path(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 連番ファイル名（0001.jpg 〜）
pub fn sequential_name(index: usize) -> String {
    format!("{:04}.jpg", index)
}

/// 全画像を `<project_root>/data/image` にコピーし、対応表を返す
pub fn collect_and_rename_images(project_root: &Path, groups: &ImageGroups) -> Result<PathMapping> {
    let image_dir = project_root.join("data").join("image");
    std::fs::create_dir_all(&image_dir)?;

    let mut resolved = groups
        .all_images()
        .into_iter()
        .map(|p| p.canonicalize())
        .collect::<std::io::Result<Vec<_>>>()?;
    resolved.sort_by_key(|p| p.to_string_lossy().to_string());
    resolved.dedup();

    let mut mapping = PathMapping::default();
    for (i, source) in resolved.into_iter().enumerate() {
        let name = sequential_name(i + 1);
        std::fs::copy(&source, image_dir.join(&name))?;
        mapping
            .entries
            .insert(source, PathBuf::from("data").join("image").join(name));
    }

    log::info!("{}枚の画像を {} にコピー", mapping.len(), image_dir.display());
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::GroupKey;
    use labvad_common::Phase;
    use regex::Regex;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::tempdir;

    fn fixture(root: &Path, names: &[&str]) -> ImageGroups {
        let mut groups = ImageGroups::default();
        for (i, name) in names.iter().enumerate() {
            let path = root.join("src").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, name.as_bytes()).unwrap();
            let key = GroupKey::new("step1", Phase::Pre, "normal", Some(i as u32 % 2));
            groups.insert(key, path);
        }
        groups
    }

    #[test]
    fn test_sequential_name() {
        assert_eq!(sequential_name(1), "0001.jpg");
        assert_eq!(sequential_name(123), "0123.jpg");
    }

    #[test]
    fn test_mapping_is_bijection() {
        let dir = tempdir().unwrap();
        let groups = fixture(dir.path(), &["b/2_far_1.jpg", "a/1_near_0.jpg", "c/3_near_2.png"]);
        let mapping = collect_and_rename_images(dir.path(), &groups).unwrap();

        assert_eq!(mapping.len(), 3);
        let pattern = Regex::new(r"^\d{4}\.jpg$").unwrap();
        let mut seen = HashSet::new();
        for (_, new_path) in mapping.iter() {
            let name = new_path.file_name().unwrap().to_str().unwrap();
            assert!(pattern.is_match(name), "{}", name);
            assert!(seen.insert(name.to_string()));
            assert!(dir.path().join(new_path).exists());
        }
    }

    #[test]
    fn test_numbering_follows_sorted_path() {
        let dir = tempdir().unwrap();
        let groups = fixture(dir.path(), &["b/x.jpg", "a/y.jpg"]);
        let mapping = collect_and_rename_images(dir.path(), &groups).unwrap();

        let a = dir.path().join("src").join("a").join("y.jpg");
        let b = dir.path().join("src").join("b").join("x.jpg");
        assert_eq!(mapping.image_id(&a).unwrap(), "data/image/0001.jpg");
        assert_eq!(mapping.image_id(&b).unwrap(), "data/image/0002.jpg");
        assert_eq!(fs::read(dir.path().join("data/image/0001.jpg")).unwrap(), b"a/y.jpg");
    }

    #[test]
    fn test_same_image_in_two_groups_copied_once() {
        let dir = tempdir().unwrap();
        let mut groups = fixture(dir.path(), &["a/1_near_0.jpg"]);
        let path = dir.path().join("src").join("a").join("1_near_0.jpg");
        groups.insert(GroupKey::new("step2", Phase::Post, "abnormal", Some(1)), path);

        let mapping = collect_and_rename_images(dir.path(), &groups).unwrap();
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_unknown_image_is_error() {
        let dir = tempdir().unwrap();
        let groups = fixture(dir.path(), &["a/1.jpg"]);
        let mapping = collect_and_rename_images(dir.path(), &groups).unwrap();

        let other = dir.path().join("other.jpg");
        fs::write(&other, b"x").unwrap();
        assert!(matches!(mapping.get(&other), Err(LabVadError::MissingMapping(_))));
    }
}
