//! [`Transcriber`] backed by the `whisper` command-line tool.
//!
//! English audio is transcribed with the `small` model. Anything else is
//! re-run through `medium` with `--task translate` so every transcript ends
//! up in English.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::collaborators::{Transcriber, Transcript};
use crate::error::PipelineError;
use crate::process::run_tool;

const ENGLISH_MODEL: &str = "small";
const TRANSLATE_MODEL: &str = "medium";

#[derive(Debug, Clone)]
pub struct WhisperCli {
    bin: String,
}

impl Default for WhisperCli {
    fn default() -> Self {
        Self::new("whisper")
    }
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

impl WhisperCli {
    #[must_use]
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(
        &self,
        audio: &Path,
        model: &str,
        task: &str,
        language: Option<&str>,
    ) -> Result<WhisperOutput, PipelineError> {
        let out_dir = output_dir(audio);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| PipelineError::io(&out_dir, e))?;

        let mut cmd = Command::new(&self.bin);
        cmd.arg(audio)
            .args(["--model", model])
            .args(["--task", task])
            .args(["--temperature", "0", "--beam_size", "5"])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(&out_dir);
        if let Some(lang) = language {
            cmd.args(["--language", lang]);
        }
        run_tool("whisper", &mut cmd).await?;

        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let json_path = out_dir.join(format!("{stem}.json"));
        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| PipelineError::io(&json_path, e))?;
        parse_output(&raw)
    }
}

fn output_dir(audio: &Path) -> PathBuf {
    audio
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("whisper")
}

fn parse_output(raw: &str) -> Result<WhisperOutput, PipelineError> {
    serde_json::from_str(raw).map_err(|e| PipelineError::Deserialize {
        context: "whisper output".to_string(),
        source: e,
    })
}

fn is_english(language: Option<&str>) -> bool {
    language.is_none_or(|l| l.eq_ignore_ascii_case("en") || l.eq_ignore_ascii_case("english"))
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, audio: &Path) -> Result<Option<Transcript>, PipelineError> {
        let first = self.run(audio, ENGLISH_MODEL, "transcribe", None).await?;
        let language = first.language.clone();

        let (output, translated) = if is_english(language.as_deref()) {
            (first, false)
        } else {
            tracing::info!(language = ?language, model = TRANSLATE_MODEL, "translating non-English audio");
            let translated = self
                .run(audio, TRANSLATE_MODEL, "translate", language.as_deref())
                .await?;
            (translated, true)
        };

        let text = output.text.trim();
        if text.is_empty() {
            tracing::warn!(audio = %audio.display(), "transcription came back empty");
            return Ok(None);
        }
        Ok(Some(Transcript {
            text: text.to_string(),
            language,
            translated,
        }))
    }
}
