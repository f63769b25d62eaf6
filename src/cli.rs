use clap::{Parser, Subcommand};
use labvad_common::{Phase, PromptLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labvad")]
#[command(about = "ロボット実験室 視覚異常検知データセット構築・評価ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// ラベル画像ツリーからアノテーションレコードを構築
    Build {
        /// プロジェクトルート（data/ を含むフォルダ）
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// デバイス別レコードをステップごとに分割
    Split {
        /// デバイス名 (fix_arm/mobile_arm)
        #[arg(short, long)]
        device: String,

        /// プロジェクトルート
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// CLIPScore / RefCLIPScore を計算
    Score {
        /// レコードJSONファイル
        #[arg(required = true)]
        records_json: PathBuf,

        /// 追加参照文JSON（画像ID → 文字列配列）
        #[arg(long = "references_json", alias = "references-json")]
        references_json: Option<PathBuf>,

        /// 出力JSONファイル
        #[arg(short, long, default_value = crate::clipscore::DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Image_Id の基準フォルダ
        #[arg(long, default_value = ".")]
        images_root: PathBuf,

        /// 埋め込みキャッシュを使用
        #[arg(long)]
        use_cache: bool,
    },

    /// ピボット表・統計ワークブック・ヒートマップを出力
    Report {
        /// プロジェクトルート
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// 異常検知プロンプトを表示
    Prompt {
        /// ステップ（省略時は対話選択）
        #[arg(short, long)]
        step: Option<String>,

        /// フェーズ (pre/post)
        #[arg(short, long, default_value = "pre")]
        phase: Phase,

        /// 情報開示レベル (basic/level0/level1/level2/normal/abnormal)
        #[arg(short, long, default_value = "basic")]
        level: PromptLevel,

        /// プロジェクトルート
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// 設定
    Config {
        /// エンコーダの起動コマンドを設定
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        set_encoder: Option<Vec<String>>,

        /// モデル名を設定
        #[arg(long)]
        set_model: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// 埋め込みキャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// キャッシュのあるフォルダ（出力JSONと同じフォルダ）
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}
