//! 埋め込みエンコーダ
//!
//! CLIPモデル本体は外部プロセスで動かし、標準入出力の改行区切りJSONで通信する。
//!
//! リクエスト（1行1件）:
//! - `{"op": "hello", "model": "..."}`
//! - `{"op": "image", "shape": [3, 224, 224], "pixels": [...]}`
//! - `{"op": "text", "texts": ["...", ...]}`
//!
//! レスポンス: `{"embeddings": [[...], ...]}` または `{"error": "..."}`

use super::preprocess::ImageTensor;
use crate::error::{LabVadError, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// 画像・テキストの埋め込みを返すエンコーダ
#[allow(async_fn_in_trait)]
pub trait ClipEncoder {
    async fn encode_image(&mut self, image: &ImageTensor) -> Result<Vec<f32>>;
    async fn encode_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum EncoderRequest<'a> {
    Hello { model: &'a str },
    Image { shape: [usize; 3], pixels: &'a [f32] },
    Text { texts: &'a [String] },
}

#[derive(Debug, Deserialize)]
struct EncoderResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

/// 子プロセスとして起動するエンコーダ
pub struct CommandEncoder {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl CommandEncoder {
    /// エンコーダを起動し、モデル名を通知する
    pub async fn spawn(argv: &[String], model: &str) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or(LabVadError::MissingEncoder)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LabVadError::Encoder(format!("{} の起動に失敗: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LabVadError::Encoder("標準入力を取得できません".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LabVadError::Encoder("標準出力を取得できません".into()))?;

        let mut encoder = Self { child, stdin, stdout: BufReader::new(stdout).lines() };
        encoder.request(&EncoderRequest::Hello { model }).await?;
        log::debug!("エンコーダ起動: {} (model: {})", program, model);
        Ok(encoder)
    }

    async fn request(&mut self, request: &EncoderRequest<'_>) -> Result<Vec<Vec<f32>>> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let reply = self
            .stdout
            .next_line()
            .await?
            .ok_or_else(|| LabVadError::Encoder("エンコーダが応答前に終了しました".into()))?;
        let response: EncoderResponse = serde_json::from_str(&reply)
            .map_err(|e| LabVadError::Encoder(format!("レスポンスのパースに失敗: {}", e)))?;

        match response.error {
            Some(message) => Err(LabVadError::Encoder(message)),
            None => Ok(response.embeddings),
        }
    }

    /// 標準入力を閉じて終了を待つ
    pub async fn shutdown(self) -> Result<()> {
        let Self { mut child, stdin, .. } = self;
        drop(stdin);
        let status = child.wait().await?;
        if !status.success() {
            log::warn!("エンコーダが異常終了しました: {}", status);
        }
        Ok(())
    }
}

impl ClipEncoder for CommandEncoder {
    async fn encode_image(&mut self, image: &ImageTensor) -> Result<Vec<f32>> {
        let mut embeddings = self
            .request(&EncoderRequest::Image { shape: image.shape, pixels: &image.data })
            .await?;
        if embeddings.len() != 1 {
            return Err(LabVadError::Encoder(format!(
                "画像埋め込みの件数が不正: {}",
                embeddings.len()
            )));
        }
        Ok(embeddings.remove(0))
    }

    async fn encode_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.request(&EncoderRequest::Text { texts }).await?;
        if embeddings.len() != texts.len() {
            return Err(LabVadError::Encoder(format!(
                "テキスト埋め込みの件数が不正: {} (期待値 {})",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }
}
