//! Turn model: one inbound conversational exchange

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CdeError;
use crate::types::ScopeKey;

/// A single turn, immutable once validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier
    pub turn_id: String,
    /// Epoch seconds; filled with wall-clock time when omitted
    #[serde(default = "now_epoch_secs")]
    pub ts: f64,
    /// Speaker identifier (e.g. "npc1", "player")
    pub speaker_id: String,
    /// Channel identifier
    pub channel_id: String,
    /// Raw text
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    /// Opaque policy context, carried but never interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_state: Option<serde_json::Value>,
}

impl Turn {
    /// Create a turn stamped with the current time
    pub fn new(
        turn_id: impl Into<String>,
        speaker_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            turn_id: turn_id.into(),
            ts: now_epoch_secs(),
            speaker_id: speaker_id.into(),
            channel_id: channel_id.into(),
            text: text.into(),
            task_id: None,
            scene_id: None,
            policy_state: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_scene(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = Some(scene_id.into());
        self
    }

    pub fn with_ts(mut self, ts: f64) -> Self {
        self.ts = ts;
        self
    }

    /// Parse and validate a turn from JSON
    pub fn from_json(raw: &str) -> Result<Self, CdeError> {
        let turn: Turn = serde_json::from_str(raw)
            .map_err(|e| CdeError::input_invalid(format!("turn does not match schema: {}", e)))?;
        turn.validate()?;
        Ok(turn)
    }

    /// Ingress checks; everything downstream assumes these hold
    pub fn validate(&self) -> Result<(), CdeError> {
        if self.turn_id.trim().is_empty() {
            return Err(CdeError::input_invalid("turn_id must not be empty"));
        }
        if self.speaker_id.trim().is_empty() {
            return Err(CdeError::input_invalid("speaker_id must not be empty"));
        }
        if self.channel_id.trim().is_empty() {
            return Err(CdeError::input_invalid("channel_id must not be empty"));
        }
        if !self.ts.is_finite() {
            return Err(CdeError::input_invalid("ts must be a finite number"));
        }
        if matches!(&self.task_id, Some(id) if id.trim().is_empty()) {
            return Err(CdeError::input_invalid("task_id must not be empty when present"));
        }
        if matches!(&self.scene_id, Some(id) if id.trim().is_empty()) {
            return Err(CdeError::input_invalid("scene_id must not be empty when present"));
        }
        Ok(())
    }

    /// Scopes evaluated when the caller does not name any:
    /// global, the speaker, then task and scene when present
    pub fn default_scopes(&self) -> Vec<ScopeKey> {
        let mut scopes = vec![ScopeKey::Global, ScopeKey::Agent(self.speaker_id.clone())];
        if let Some(task) = &self.task_id {
            scopes.push(ScopeKey::Task(task.clone()));
        }
        if let Some(scene) = &self.scene_id {
            scopes.push(ScopeKey::Scene(scene.clone()));
        }
        scopes
    }
}

/// Wall-clock time as epoch seconds
pub fn now_epoch_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
