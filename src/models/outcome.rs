use serde::{Deserialize, Serialize};

/// Successful answer from `/api/solve`.
///
/// Field names on the wire follow the server (`prediction`, `char_details`,
/// ...). Only `prediction` and `confidence` are required; everything else is
/// dropped by degraded or math-mode responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolveOutcome {
    #[serde(rename = "prediction")]
    pub predicted_text: String,
    #[serde(rename = "confidence")]
    pub confidence_percent: f64,
    #[serde(rename = "char_details", default, skip_serializing_if = "Option::is_none")]
    pub per_character_detail: Option<Vec<CharDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Raw recognised expression when the server evaluated a math CAPTCHA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocab_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharDetail {
    pub position: usize,
    #[serde(rename = "predicted")]
    pub predicted_char: String,
    #[serde(rename = "confidence")]
    pub confidence_percent: f64,
    #[serde(rename = "top_3", default)]
    pub top_alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alternative {
    #[serde(rename = "char")]
    pub character: String,
    #[serde(rename = "confidence")]
    pub confidence_percent: f64,
}

/// Model availability reported by `/api/health`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelHealth {
    pub text: bool,
    pub math: bool,
}

fn check_percent(value: f64, field: &str) -> Result<(), String> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} {value} is outside 0..=100"))
    }
}

impl SolveOutcome {
    /// Parses a 2xx body, rejecting payloads that deserialize but carry
    /// impossible confidences.
    pub fn from_body(body: &str) -> Result<Self, String> {
        let outcome: SolveOutcome =
            serde_json::from_str(body).map_err(|err| format!("unexpected body: {err}"))?;
        outcome.validate()?;
        Ok(outcome)
    }

    pub fn validate(&self) -> Result<(), String> {
        check_percent(self.confidence_percent, "confidence")?;
        for detail in self.per_character_detail.iter().flatten() {
            check_percent(detail.confidence_percent, "char confidence")?;
            for alt in &detail.top_alternatives {
                check_percent(alt.confidence_percent, "alternative confidence")?;
            }
        }
        Ok(())
    }

    pub fn char_details(&self) -> &[CharDetail] {
        self.per_character_detail.as_deref().unwrap_or(&[])
    }
}
