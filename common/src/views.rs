//! 撮影視点テーブル
//!
//! ファイル名 `<idx>_<near|far>_<view>` の view 番号と視点名の対応。

/// view番号順の視点名（0〜13）
pub const VIEW_NAMES: [&str; 14] = [
    "top-down view",
    "left-down view",
    "front-down view",
    "right-down view",
    "left-horizontal view",
    "front-horizontal view",
    "right-horizontal view",
    "left-up view",
    "front-up view",
    "right-up view",
    "left 90° downward view",
    "right 90° downward view",
    "left 90° horizontal view",
    "right 90° horizontal view",
];

/// ヒートマップ用の並び（下向き → 水平 → 上向き）
pub const GROUPED_VIEW_ORDER: [&str; 14] = [
    "top-down view",
    "left-down view",
    "front-down view",
    "right-down view",
    "left 90° downward view",
    "right 90° downward view",
    "left-horizontal view",
    "front-horizontal view",
    "right-horizontal view",
    "left 90° horizontal view",
    "right 90° horizontal view",
    "left-up view",
    "front-up view",
    "right-up view",
];

pub fn view_name(index: u32) -> Option<&'static str> {
    VIEW_NAMES.get(index as usize).copied()
}

pub fn view_index(name: &str) -> Option<u32> {
    VIEW_NAMES.iter().position(|&v| v == name).map(|i| i as u32)
}
