use std::{fmt, fs, path::Path, str::FromStr, sync::Arc};

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SolveMode {
    Text,
    Math,
}

impl Default for SolveMode {
    fn default() -> Self {
        SolveMode::Text
    }
}

impl SolveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveMode::Text => "text",
            SolveMode::Math => "math",
        }
    }

    /// Label shown when a past result is replayed from history.
    pub fn model_label(&self) -> &'static str {
        match self {
            SolveMode::Text => "Text Model",
            SolveMode::Math => "Math Model",
        }
    }
}

impl fmt::Display for SolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolveMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(SolveMode::Text),
            "math" => Ok(SolveMode::Math),
            other => Err(format!("unknown mode '{other}' (expected text or math)")),
        }
    }
}

/// An image picked by the user, held until it is cleared or replaced.
#[derive(Debug, Clone)]
pub struct ImageInput {
    bytes: Arc<[u8]>,
    mime: String,
    file_name: String,
}

impl ImageInput {
    pub fn new(
        bytes: Vec<u8>,
        mime: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let mime = mime.into();
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage { mime });
        }
        if bytes.is_empty() {
            return Err(ValidationError::EmptyImage);
        }

        Ok(Self {
            bytes: bytes.into(),
            mime,
            file_name: file_name.into(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        // Check the type before touching the disk so a wrong file is
        // reported as such rather than as an IO problem.
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage { mime });
        }

        let bytes = fs::read(path).map_err(|err| ValidationError::Unreadable {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "captcha".to_string());

        Self::new(bytes, mime, file_name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime, encoded)
    }
}

/// One submission. Immutable once built.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub attempt_id: String,
    pub image: ImageInput,
    pub mode: SolveMode,
}
