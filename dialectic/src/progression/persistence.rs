//! Checkpoint and resume for progression state.
//!
//! A checkpoint is a JSON document holding the per-tension records and the
//! global counters. Missing fields default on load, and a restored checkpoint
//! is validated before the controller adopts it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::intervention::ProgressionMetrics;
use crate::concepts::TensionPair;
use crate::error::{ProgressionError, ProgressionResult};
use crate::tension::TensionState;

/// Serialized progression state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionCheckpoint {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub turn_index: u64,
    pub last_pivot_turn: Option<u64>,
    /// Tension key ("a/b") the discussion is currently centred on.
    pub current_tension: Option<String>,
    pub metrics: ProgressionMetrics,
    /// Per-tension records keyed by "a/b".
    pub tensions: BTreeMap<String, TensionState>,
    /// Topic sets of the most recent turns, oldest first.
    pub recent_topics: Vec<BTreeSet<String>>,
    pub saved_at: DateTime<Utc>,
}

impl Default for ProgressionCheckpoint {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            turn_index: 0,
            last_pivot_turn: None,
            current_tension: None,
            metrics: ProgressionMetrics::default(),
            tensions: BTreeMap::new(),
            recent_topics: Vec::new(),
            saved_at: Utc::now(),
        }
    }
}

impl ProgressionCheckpoint {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    pub fn to_json(&self) -> ProgressionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a checkpoint, rejecting versions newer than this build.
    pub fn from_json(json: &str) -> ProgressionResult<Self> {
        let checkpoint: Self = serde_json::from_str(json)?;
        if checkpoint.version > Self::CURRENT_VERSION {
            return Err(ProgressionError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: checkpoint.version,
            });
        }
        Ok(checkpoint)
    }

    /// Write the checkpoint as pretty JSON.
    pub fn save(&self, path: &Path) -> ProgressionResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProgressionError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| ProgressionError::io(path, e))
    }

    /// Read a checkpoint and check its integrity.
    ///
    /// Corrupted checkpoints are rejected; recoverable ones are returned with
    /// their warnings.
    pub fn load(path: &Path) -> ProgressionResult<(Self, IntegrityStatus)> {
        let raw = std::fs::read_to_string(path).map_err(|e| ProgressionError::io(path, e))?;
        Self::restore(&raw)
    }

    /// Parse and validate in one step.
    pub fn restore(json: &str) -> ProgressionResult<(Self, IntegrityStatus)> {
        let checkpoint = Self::from_json(json)?;
        let status = validate_checkpoint(&checkpoint);
        if let IntegrityStatus::Corrupted { errors } = &status {
            return Err(ProgressionError::IntegrityCheckFailed(errors.join("; ")));
        }
        Ok((checkpoint, status))
    }

    /// Tension records with their keys parsed. Unparseable keys are skipped.
    pub fn parsed_tensions(&self) -> impl Iterator<Item = (TensionPair, &TensionState)> {
        self.tensions
            .iter()
            .filter_map(|(key, state)| TensionPair::from_key(key).map(|pair| (pair, state)))
    }
}

/// Integrity check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// Checkpoint is valid and can be resumed.
    Valid,
    /// Checkpoint has minor inconsistencies but is usable.
    Recoverable { warnings: Vec<String> },
    /// Checkpoint cannot be used.
    Corrupted { errors: Vec<String> },
}

impl IntegrityStatus {
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Valid | Self::Recoverable { .. })
    }
}

/// Check a checkpoint for internal consistency before resuming.
pub fn validate_checkpoint(checkpoint: &ProgressionCheckpoint) -> IntegrityStatus {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if checkpoint.version > ProgressionCheckpoint::CURRENT_VERSION {
        errors.push(format!(
            "version {} > current {}",
            checkpoint.version,
            ProgressionCheckpoint::CURRENT_VERSION
        ));
    }

    let now = checkpoint.turn_index;

    for (key, state) in &checkpoint.tensions {
        if TensionPair::from_key(key).is_none() {
            errors.push(format!("tension key '{}' is not of the form a/b", key));
            continue;
        }
        if let Some(turn) = state.last_new_entailment_turn {
            if turn > now {
                warnings.push(format!(
                    "{}: last entailment turn {} is after turn index {}",
                    key, turn, now
                ));
            }
        }
        for test in &state.consequence_tests {
            if test.turn > now {
                warnings.push(format!(
                    "{}: consequence test at turn {} is after turn index {}",
                    key, test.turn, now
                ));
            }
            if test.had_entailment && !test.responded {
                warnings.push(format!(
                    "{}: test at turn {} has entailment but no response",
                    key, test.turn
                ));
            }
        }
    }

    if let Some(pivot) = checkpoint.last_pivot_turn {
        if pivot > now {
            errors.push(format!(
                "last pivot turn {} is after turn index {}",
                pivot, now
            ));
        }
    }

    if let Some(current) = &checkpoint.current_tension {
        if !checkpoint.tensions.contains_key(current) {
            warnings.push(format!("current tension '{}' has no record", current));
        }
    }

    if !errors.is_empty() {
        IntegrityStatus::Corrupted { errors }
    } else if !warnings.is_empty() {
        IntegrityStatus::Recoverable { warnings }
    } else {
        IntegrityStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tension::ConsequenceTest;

    fn make_checkpoint() -> ProgressionCheckpoint {
        let mut state = TensionState::new(2, 2);
        state.increment_cycle();
        state.increment_cycle();
        state.add_consequence_test(4, "Consequence Test: what follows?");

        let mut cp = ProgressionCheckpoint {
            turn_index: 5,
            current_tension: Some("contingency/necessity".to_string()),
            ..Default::default()
        };
        cp.metrics.turns_processed = 5;
        cp.tensions.insert("contingency/necessity".to_string(), state);
        cp
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let cp = make_checkpoint();
        let json = cp.to_json().unwrap();
        let restored = ProgressionCheckpoint::from_json(&json).unwrap();
        assert_eq!(restored.turn_index, 5);
        assert_eq!(restored.metrics, cp.metrics);
        let state = &restored.tensions["contingency/necessity"];
        assert_eq!(state.cycles, 2);
        assert_eq!(state.consequence_tests.len(), 1);
        assert!(state.consequence_tests[0].is_pending());
    }

    #[test]
    fn test_missing_fields_default() {
        let cp = ProgressionCheckpoint::from_json(r#"{"turn_index": 3}"#).unwrap();
        assert_eq!(cp.version, ProgressionCheckpoint::CURRENT_VERSION);
        assert_eq!(cp.turn_index, 3);
        assert!(cp.tensions.is_empty());
        assert_eq!(cp.metrics, ProgressionMetrics::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = ProgressionCheckpoint::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            ProgressionError::VersionMismatch { expected: 1, found: 99 }
        ));
    }

    #[test]
    fn test_validate_valid() {
        assert_eq!(validate_checkpoint(&make_checkpoint()), IntegrityStatus::Valid);
    }

    #[test]
    fn test_validate_future_test_is_recoverable() {
        let mut cp = make_checkpoint();
        cp.tensions
            .get_mut("contingency/necessity")
            .unwrap()
            .consequence_tests
            .push(ConsequenceTest::new(9, "late"));
        let status = validate_checkpoint(&cp);
        assert!(matches!(status, IntegrityStatus::Recoverable { .. }));
        assert!(status.can_resume());
    }

    #[test]
    fn test_validate_bad_key_is_corrupted() {
        let mut cp = make_checkpoint();
        cp.tensions.insert("nonsense".to_string(), TensionState::default());
        let status = validate_checkpoint(&cp);
        assert!(!status.can_resume());
        assert!(matches!(
            ProgressionCheckpoint::restore(&cp.to_json().unwrap()),
            Err(ProgressionError::IntegrityCheckFailed(_))
        ));
    }

    #[test]
    fn test_validate_future_pivot_is_corrupted() {
        let mut cp = make_checkpoint();
        cp.last_pivot_turn = Some(40);
        assert!(matches!(
            validate_checkpoint(&cp),
            IntegrityStatus::Corrupted { .. }
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        make_checkpoint().save(&path).unwrap();
        let (cp, status) = ProgressionCheckpoint::load(&path).unwrap();
        assert_eq!(status, IntegrityStatus::Valid);
        assert_eq!(cp.parsed_tensions().count(), 1);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProgressionCheckpoint::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ProgressionError::Io { .. }));
    }
}
