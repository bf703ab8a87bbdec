//! Simulation ledger
//!
//! The ledger is the single manifest of everything one generate call created:
//! which students and courses were simulated, with which parameters, and for
//! every student the outcome of each content node plus the ids of every record
//! inserted on their behalf. Cleanup deletes exactly those ids and nothing
//! else, so the ledger is the sole authority on what belongs to a simulation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::simulation::error::{SimulationError, SimulationResult};
use crate::simulation::synthesizer::{QuizOutcome, SynthesizedOutcome};
use crate::store::{LedgerSlot, StoreResult};
use crate::types::{ActivityParams, ActivityStatus, BatchId, ContentId, ContentKind, RecordId, StudentId};

/// Name of the durable slot holding the ledger
pub const LEDGER_SLOT: &str = "activity_simulation_batch";

/// Score summary of a simulated quiz attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    /// Score percentage (0-100)
    pub percentage: u8,
    /// Questions answered correctly
    pub correct_count: u32,
    /// Questions in the attempt
    pub total_questions: u32,
    /// Whether the attempt passed
    pub pass: bool,
}

impl From<&QuizOutcome> for QuizScore {
    fn from(quiz: &QuizOutcome) -> Self {
        Self {
            percentage: quiz.percentage,
            correct_count: quiz.correct_count,
            total_questions: quiz.total_questions,
            pass: quiz.pass,
        }
    }
}

/// Outcome of one content node for one student, as recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOutcome {
    /// Activity record created for the node
    pub record_id: RecordId,
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time, if completed
    pub completed: Option<DateTime<Utc>>,
    /// Completion status
    pub status: ActivityStatus,
    /// Score, for quizzes only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizScore>,
}

impl EntityOutcome {
    /// Outcome stored under `record_id`
    pub fn new(record_id: RecordId, outcome: &SynthesizedOutcome) -> Self {
        let quiz = match outcome {
            SynthesizedOutcome::Quiz(q) => Some(QuizScore::from(q)),
            SynthesizedOutcome::Progress(_) => None,
        };
        Self {
            record_id,
            started: outcome.started(),
            completed: outcome.completed(),
            status: outcome.status(),
            quiz,
        }
    }
}

/// Everything recorded for one student
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentActivity {
    /// Course outcomes
    #[serde(default)]
    pub courses: BTreeMap<ContentId, EntityOutcome>,
    /// Lesson outcomes
    #[serde(default)]
    pub lessons: BTreeMap<ContentId, EntityOutcome>,
    /// Topic outcomes
    #[serde(default)]
    pub topics: BTreeMap<ContentId, EntityOutcome>,
    /// Quiz outcomes
    #[serde(default)]
    pub quizzes: BTreeMap<ContentId, EntityOutcome>,
    /// Every record id inserted for the student, in insertion order
    #[serde(default)]
    pub record_ids: Vec<RecordId>,
}

impl StudentActivity {
    /// Outcome map for a content kind
    pub fn outcomes(&self, kind: ContentKind) -> &BTreeMap<ContentId, EntityOutcome> {
        match kind {
            ContentKind::Course => &self.courses,
            ContentKind::Lesson => &self.lessons,
            ContentKind::Topic => &self.topics,
            ContentKind::Quiz => &self.quizzes,
        }
    }

    fn outcomes_mut(&mut self, kind: ContentKind) -> &mut BTreeMap<ContentId, EntityOutcome> {
        match kind {
            ContentKind::Course => &mut self.courses,
            ContentKind::Lesson => &mut self.lessons,
            ContentKind::Topic => &mut self.topics,
            ContentKind::Quiz => &mut self.quizzes,
        }
    }

    /// Remember the outcome of a node
    ///
    /// A node recorded twice (a quiz reused by two lessons) keeps its latest
    /// outcome in the map; both record ids stay in `record_ids`.
    pub fn record(&mut self, kind: ContentKind, id: ContentId, outcome: EntityOutcome) {
        self.outcomes_mut(kind).insert(id, outcome);
    }

    /// Track a record id inserted for the student
    pub fn track_record(&mut self, id: RecordId) {
        self.record_ids.push(id);
    }

    /// Whether a quiz already has an outcome
    pub fn has_quiz(&self, quiz: ContentId) -> bool {
        self.quizzes.contains_key(&quiz)
    }

    /// Number of completed nodes of a kind
    pub fn completed_count(&self, kind: ContentKind) -> usize {
        self.outcomes(kind).values().filter(|o| o.status.is_completed()).count()
    }
}

/// The manifest of one generate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationBatch {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Students simulated
    pub students: BTreeSet<StudentId>,
    /// Courses simulated
    pub courses: BTreeSet<ContentId>,
    /// Time the batch was generated
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Parameters the batch was generated with
    pub params: ActivityParams,
    /// Per-student activity
    pub activity: BTreeMap<StudentId, StudentActivity>,
}

impl SimulationBatch {
    /// Empty batch for the given selection
    pub fn new(
        students: BTreeSet<StudentId>,
        courses: BTreeSet<ContentId>,
        params: ActivityParams,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id: BatchId::new(),
            students,
            courses,
            created_at,
            params,
            activity: BTreeMap::new(),
        }
    }

    /// Every record id in the batch, student by student
    pub fn record_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.activity.values().flat_map(|a| a.record_ids.iter().copied())
    }

    /// Total number of records in the batch
    pub fn record_count(&self) -> usize {
        self.activity.values().map(|a| a.record_ids.len()).sum()
    }
}

/// Reads and writes the ledger slot
#[derive(Debug, Clone)]
pub struct SimulationLedger {
    slot: String,
}

impl Default for SimulationLedger {
    fn default() -> Self {
        Self { slot: LEDGER_SLOT.to_string() }
    }
}

impl SimulationLedger {
    /// Ledger stored in the default slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger stored in a custom slot
    pub fn with_slot(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }

    /// Name of the slot
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Store `batch`, replacing whatever the slot held
    pub fn save<S: LedgerSlot + ?Sized>(&self, store: &mut S, batch: &SimulationBatch) -> StoreResult<()> {
        let json = serde_json::to_string(batch)?;
        store.write_slot(&self.slot, json)?;
        debug!("Saved ledger for batch {} ({} records)", batch.batch_id, batch.record_count());
        Ok(())
    }

    /// The stored batch, if any
    pub fn load<S: LedgerSlot + ?Sized>(&self, store: &S) -> SimulationResult<Option<SimulationBatch>> {
        let Some(json) = store.read_slot(&self.slot).map_err(SimulationError::LedgerUnavailable)? else {
            return Ok(None);
        };
        let batch = serde_json::from_str(&json).map_err(SimulationError::LedgerCorrupt)?;
        Ok(Some(batch))
    }

    /// Delete the stored batch. Returns whether one existed.
    pub fn clear<S: LedgerSlot + ?Sized>(&self, store: &mut S) -> StoreResult<bool> {
        store.delete_slot(&self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn sample_batch() -> SimulationBatch {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let mut batch = SimulationBatch::new(
            BTreeSet::from([StudentId(4)]),
            BTreeSet::from([ContentId(12)]),
            ActivityParams::default(),
            created,
        );

        let mut activity = StudentActivity::default();
        let outcome = EntityOutcome {
            record_id: RecordId(1),
            started: created,
            completed: None,
            status: ActivityStatus::NotStarted,
            quiz: None,
        };
        activity.record(ContentKind::Course, ContentId(12), outcome);
        activity.track_record(RecordId(1));

        let quiz = EntityOutcome {
            record_id: RecordId(2),
            started: created,
            completed: Some(created),
            status: ActivityStatus::Completed,
            quiz: Some(QuizScore { percentage: 80, correct_count: 8, total_questions: 10, pass: true }),
        };
        activity.record(ContentKind::Quiz, ContentId(41), quiz);
        activity.track_record(RecordId(2));

        batch.activity.insert(StudentId(4), activity);
        batch
    }

    #[test]
    fn test_batch_json_shape() {
        let batch = sample_batch();
        let value = serde_json::to_value(&batch).unwrap();

        assert!(value.get("timestamp").is_some());
        assert!(value.get("created_at").is_none());
        assert!(value["batch_id"].as_str().unwrap().starts_with("BATCH_"));
        assert_eq!(value["students"], serde_json::json!([4]));
        assert_eq!(value["activity"]["4"]["record_ids"], serde_json::json!([1, 2]));
        assert!(value["activity"]["4"]["courses"]["12"].get("quiz").is_none());
        assert_eq!(value["activity"]["4"]["quizzes"]["41"]["quiz"]["percentage"], 80);
        assert_eq!(value["activity"]["4"]["courses"]["12"]["status"], "not_started");
    }

    #[test]
    fn test_record_ids_and_counts() {
        let batch = sample_batch();
        assert_eq!(batch.record_ids().collect::<Vec<_>>(), vec![RecordId(1), RecordId(2)]);
        assert_eq!(batch.record_count(), 2);

        let activity = &batch.activity[&StudentId(4)];
        assert!(activity.has_quiz(ContentId(41)));
        assert_eq!(activity.completed_count(ContentKind::Quiz), 1);
        assert_eq!(activity.completed_count(ContentKind::Course), 0);
    }

    #[test]
    fn test_save_load_clear() {
        let mut store = MemoryStore::new();
        let ledger = SimulationLedger::new();
        assert!(ledger.load(&store).unwrap().is_none());

        let batch = sample_batch();
        ledger.save(&mut store, &batch).unwrap();
        assert_eq!(ledger.load(&store).unwrap(), Some(batch));

        assert!(ledger.clear(&mut store).unwrap());
        assert!(ledger.load(&store).unwrap().is_none());
        assert!(!ledger.clear(&mut store).unwrap());
    }

    #[test]
    fn test_save_replaces_previous_batch() {
        let mut store = MemoryStore::new();
        let ledger = SimulationLedger::new();

        let first = sample_batch();
        let mut second = sample_batch();
        second.students.insert(StudentId(9));

        ledger.save(&mut store, &first).unwrap();
        ledger.save(&mut store, &second).unwrap();

        let loaded = ledger.load(&store).unwrap().unwrap();
        assert_eq!(loaded.batch_id, second.batch_id);
        assert!(loaded.students.contains(&StudentId(9)));
    }

    #[test]
    fn test_corrupt_slot() {
        let mut store = MemoryStore::new();
        store.write_slot(LEDGER_SLOT, "{not json".to_string()).unwrap();

        let result = SimulationLedger::new().load(&store);
        assert!(matches!(result, Err(SimulationError::LedgerCorrupt(_))));
    }

    #[test]
    fn test_custom_slot() {
        let mut store = MemoryStore::new();
        let ledger = SimulationLedger::with_slot("other_slot");
        ledger.save(&mut store, &sample_batch()).unwrap();

        assert_eq!(ledger.slot(), "other_slot");
        assert!(SimulationLedger::new().load(&store).unwrap().is_none());
    }
}
