use anyhow::Context;
use clap::Parser;
use labvad::assembler::{self, split, Metasteps};
use labvad::cli::{Cli, Commands};
use labvad::clipscore::{self, CommandEncoder, EmbeddingCache, ScoreJob, ScoreOptions};
use labvad::config::Config;
use labvad::{prompt, report};
use std::path::PathBuf;

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let config = Config::load().context("設定ファイルの読み込みに失敗")?;

    match cli.command {
        Commands::Build { root } => {
            println!("🧪 labvad - アノテーション構築\n");

            println!("[1/2] ラベル画像をスキャン・リネーム中...");
            let summary = assembler::build_records(&root)
                .with_context(|| format!("レコード構築に失敗: {}", root.display()))?;
            println!("✔ {}枚の画像を data/image にコピー\n", summary.images_copied);

            println!("[2/2] レコードを出力中...");
            for device in &summary.devices {
                println!("  {}: {}件 → {}", device.device, device.record_count, device.path.display());
            }
            println!("✔ 合計 {}件 → {}", summary.total_records, summary.merged_path.display());

            println!("\n✅ 構築完了");
        }

        Commands::Split { device, root } => {
            println!("✂ labvad - ステップ分割\n");
            let outputs = split::split_by_step(&root, &device)
                .with_context(|| format!("{} の分割に失敗", device))?;
            for (step, count, path) in &outputs {
                println!("  {}: {}件 → {}", step, count, path.display());
            }
            println!("\n✅ {}ステップに分割", outputs.len());
        }

        Commands::Score { records_json, references_json, output, images_root, use_cache } => {
            println!("📐 labvad - CLIPScore計算\n");

            println!("[1/3] エンコーダ起動中...");
            let argv = config.encoder_command()?;
            let mut encoder = CommandEncoder::spawn(&argv, &config.model).await?;
            println!("✔ {} ({})\n", argv.join(" "), config.model);

            println!("[2/3] スコア計算中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let job = ScoreJob { records_json, references_json, output, images_root, use_cache };
            let options = ScoreOptions::from(&config);
            let summary = clipscore::run_score(&job, &mut encoder, &options, &config.cache_key())
                .await
                .with_context(|| format!("スコア計算に失敗: {}", job.records_json.display()))?;
            encoder.shutdown().await?;
            println!("✔ {}/{}件をスコア化\n", summary.scored, summary.total);

            println!("[3/3] 結果");
            if let Some(mean) = summary.mean_clip_score {
                println!("  CLIPScore 平均: {:.4}", mean);
            }
            if let Some(mean) = summary.mean_ref_clip_score {
                println!("  RefCLIPScore 平均: {:.4}", mean);
            }
            println!("✔ 結果を保存: {}", job.output.display());

            println!("\n✅ 計算完了");
        }

        Commands::Report { root } => {
            println!("📊 labvad - レポート出力\n");
            let summary = report::run_reports(&root)?;

            if summary.pivot_files.is_empty() {
                println!("⚠ 有効なCLIPScoreデータがありません");
            }
            for path in &summary.pivot_files {
                println!("✔ {}", path.display());
            }
            if let Some(workbook) = &summary.workbook {
                println!("✔ {}", workbook.display());
            }
            for path in &summary.heatmaps {
                println!("✔ {}", path.display());
            }

            println!("\n✅ 出力完了");
        }

        Commands::Prompt { step, phase, level, root } => {
            let meta_path = root.join("data").join(assembler::METADATA_FILE);
            let meta = Metasteps::load(&meta_path)
                .with_context(|| format!("メタデータの読み込みに失敗: {}", meta_path.display()))?;

            let step = match step {
                Some(step) => step,
                None => prompt::select_step_interactive(&meta)?,
            };
            let rendered = prompt::render_prompt(&meta, &step, phase, level)?;

            println!("=== System ({} / {}) ===", rendered.step, rendered.phase);
            println!("{}\n", rendered.system);
            println!("=== User ===");
            println!("{}", rendered.user);
        }

        Commands::Config { set_encoder, set_model, show } => {
            let mut config = config;

            if let Some(argv) = set_encoder {
                config.set_encoder_command(argv)?;
                println!("✔ エンコーダを設定しました");
            }

            if let Some(model) = set_model {
                config.set_model(model)?;
                println!("✔ モデルを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  重み w: {}", config.clip_weight);
                println!("  テキスト接頭辞: {}", config.text_prefix);
                println!("  画像サイズ: {}px", config.image_size);
                match config.encoder_command() {
                    Ok(argv) => println!("  エンコーダ: {}", argv.join(" ")),
                    Err(_) => println!("  エンコーダ: 未設定"),
                }
            }
        }

        Commands::Cache { clear, dir, info } => {
            let target = dir.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = EmbeddingCache::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = EmbeddingCache::load(&target, &config.cache_key());
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match EmbeddingCache::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}
