//! Text recognition seam.
//!
//! [`Recognizer`] turns an image into text for a given script. The bundled
//! [`CommandRecognizer`] shells out to an OCR program (tesseract by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info_span, Instrument};

use crate::config::RecognitionConfig;

/// Script family the recognizer should expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageModel {
    /// English and other Latin-script languages.
    #[default]
    Latin,
    Chinese,
    /// Hindi, Marathi, Sanskrit.
    Devanagari,
    Japanese,
    Korean,
}

impl LanguageModel {
    pub const ALL: [LanguageModel; 5] = [
        LanguageModel::Latin,
        LanguageModel::Chinese,
        LanguageModel::Devanagari,
        LanguageModel::Japanese,
        LanguageModel::Korean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageModel::Latin => "latin",
            LanguageModel::Chinese => "chinese",
            LanguageModel::Devanagari => "devanagari",
            LanguageModel::Japanese => "japanese",
            LanguageModel::Korean => "korean",
        }
    }

    /// Tesseract traineddata name.
    pub fn engine_code(&self) -> &'static str {
        match self {
            LanguageModel::Latin => "eng",
            LanguageModel::Chinese => "chi_sim",
            LanguageModel::Devanagari => "hin",
            LanguageModel::Japanese => "jpn",
            LanguageModel::Korean => "kor",
        }
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        LanguageModel::ALL
            .into_iter()
            .find(|m| m.as_str() == needle || m.engine_code() == needle)
            .ok_or_else(|| {
                format!(
                    "unknown language model '{}' (expected one of: latin, chinese, devanagari, japanese, korean)",
                    s
                )
            })
    }
}

/// Image handed to a recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Image file on disk.
    Path(PathBuf),
    /// Encoded image bytes (e.g. a camera capture).
    Bytes(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Image not readable: {0}")]
    ImageUnavailable(String),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("Recognizer output is not valid UTF-8")]
    InvalidOutput,
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        image: &ImageSource,
        language: LanguageModel,
    ) -> Result<String, RecognitionError>;
}

/// Runs an external OCR command and returns its stdout.
///
/// `{image}` and `{lang}` in the argument list are replaced with the image path and
/// [`LanguageModel::engine_code`].
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn render_args(&self, image: &str, language: LanguageModel) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace("{image}", image)
                    .replace("{lang}", language.engine_code())
            })
            .collect()
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    async fn recognize(
        &self,
        image: &ImageSource,
        language: LanguageModel,
    ) -> Result<String, RecognitionError> {
        // Bytes go through a temp file that lives until the command finishes.
        let mut _scratch = None;
        let image_path = match image {
            ImageSource::Path(path) => {
                if !path.is_file() {
                    return Err(RecognitionError::ImageUnavailable(
                        path.display().to_string(),
                    ));
                }
                path.clone()
            }
            ImageSource::Bytes(bytes) => {
                let mut file = tempfile::NamedTempFile::new()
                    .map_err(|e| RecognitionError::ImageUnavailable(e.to_string()))?;
                file.write_all(bytes)
                    .map_err(|e| RecognitionError::ImageUnavailable(e.to_string()))?;
                let path = file.path().to_path_buf();
                _scratch = Some(file);
                path
            }
        };

        let args = self.render_args(&image_path.to_string_lossy(), language);
        let span = info_span!("recognize", program = %self.program, language = %language);
        let output = async {
            debug!(?args, "Running recognizer");
            let child = Command::new(&self.program)
                .args(&args)
                .kill_on_drop(true)
                .output();
            match tokio::time::timeout(self.timeout, child).await {
                Ok(result) => result.map_err(|source| RecognitionError::Spawn {
                    program: self.program.clone(),
                    source,
                }),
                Err(_) => Err(RecognitionError::Timeout(self.timeout)),
            }
        }
        .instrument(span)
        .await?;

        if !output.status.success() {
            return Err(RecognitionError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8(output.stdout).map_err(|_| RecognitionError::InvalidOutput)?;
        Ok(text.trim_end().to_string())
    }
}
