use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabVadError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("エンコーダが設定されていません。`labvad config --set-encoder <command...>` または環境変数 LABVAD_ENCODER で設定してください")]
    MissingEncoder,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("JSONファイルが空です: {0}")]
    EmptyInput(String),

    #[error("ラベルXMLの解析に失敗: {path}: {message}")]
    LabelParse { path: PathBuf, message: String },

    #[error("リネーム対応表に画像がありません: {0}")]
    MissingMapping(String),

    #[error("メタデータにステップがありません: {0}")]
    UnknownStep(String),

    #[error("エンコーダ実行エラー: {0}")]
    Encoder(String),

    #[error("対話入力エラー: {0}")]
    Interaction(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV出力エラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel生成エラー: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("共通ライブラリエラー: {0}")]
    Common(#[from] labvad_common::Error),
}

pub type Result<T> = std::result::Result<T, LabVadError>;
