//! labvad - ロボット実験室 視覚異常検知データセットツール
//!
//! ラベル付き画像ツリーからアノテーションレコードを構築し、
//! CLIPScore評価と統計レポートを出力する。

pub mod assembler;
pub mod cli;
pub mod clipscore;
pub mod collector;
pub mod config;
pub mod error;
pub mod grounding;
pub mod prompt;
pub mod report;
pub mod scanner;

pub use error::{LabVadError, Result};
