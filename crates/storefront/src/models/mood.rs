//! Mood quiz questions and recorded AI sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fastspot_core::{AiSessionId, OwnerKey, QuestionId};

use super::catalog::OptionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodQuestion {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub options: Vec<QuestionOption>,
    /// Display order, ascending.
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
}

impl MoodQuestion {
    /// Labels of the options whose values appear in `selected`, in
    /// question order.
    #[must_use]
    pub fn labels_for(&self, selected: &[String]) -> Vec<String> {
        self.options
            .iter()
            .filter(|opt| selected.contains(&opt.value))
            .map(|opt| opt.label.clone())
            .collect()
    }
}

/// One quiz answer as submitted, optionally enriched with resolved text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodAnswer {
    pub question_id: QuestionId,
    pub selected_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answer_labels: Vec<String>,
}

/// Record of one recommendation run. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSession {
    pub id: AiSessionId,
    #[serde(skip)]
    pub owner: Option<OwnerKey>,
    pub answers: Vec<MoodAnswer>,
    pub recommendations: Vec<String>,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}
