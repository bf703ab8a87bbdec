//! In-memory storage backend.
//!
//! [`MemoryStore`] implements every storage trait the simulator needs. It is
//! the backend of the command line binary, which persists it to a JSON state
//! file between runs, and the reference backend for tests. Transactions are
//! snapshot based: `begin` copies the state, `rollback` restores the copy.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::records::{ActivityMeta, ActivityRecord, NewActivityRecord, QuizAttempt};
use crate::store::traits::{
    ActivityStore, AggregateStateStore, CourseProgressMap, LedgerSlot, LessonCompletions,
    StorageError, StoreResult, Transactional,
};
use crate::types::{ActivityTable, RecordId, StudentId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StudentAggregate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    course_progress: Option<CourseProgressMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lesson_completions: Option<LessonCompletions>,
    #[serde(default)]
    quiz_history: Vec<QuizAttempt>,
    #[serde(default)]
    markers: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_record_id: u64,
    records: BTreeMap<RecordId, ActivityRecord>,
    meta: Vec<ActivityMeta>,
    students: BTreeMap<StudentId, StudentAggregate>,
    slots: BTreeMap<String, String>,
}

/// Snapshot-transactional in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: StoreState,
    snapshot: Option<StoreState>,
    fail_on_write: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON state file; a missing file yields an empty store
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("State file {} not found, starting with an empty store", path.display());
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let state: StoreState = serde_json::from_str(&content)?;
        debug!(
            "Loaded {} activity records and {} meta rows from {}",
            state.records.len(),
            state.meta.len(),
            path.display()
        );
        Ok(Self { state, ..Default::default() })
    }

    /// Persist the committed state as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StorageError::Transaction(
                "cannot save while a transaction is open".to_string(),
            ));
        }
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Make the `nth` write from now fail (1 = the next write)
    ///
    /// Used to exercise rollback paths. The failure fires once.
    pub fn fail_on_write(&mut self, nth: usize) {
        self.fail_on_write = Some(nth.max(1));
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Look up a record by id
    pub fn record(&self, id: RecordId) -> Option<&ActivityRecord> {
        self.state.records.get(&id)
    }

    /// All records in id order
    pub fn records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.state.records.values()
    }

    /// Number of stored records
    pub fn record_count(&self) -> usize {
        self.state.records.len()
    }

    /// Meta rows attached to a record
    pub fn meta_for(&self, id: RecordId) -> Vec<&ActivityMeta> {
        self.state.meta.iter().filter(|m| m.record_id == id).collect()
    }

    /// Number of stored meta rows
    pub fn meta_count(&self) -> usize {
        self.state.meta.len()
    }

    fn check_write(&mut self, target: &str) -> StoreResult<()> {
        if let Some(remaining) = self.fail_on_write {
            if remaining <= 1 {
                self.fail_on_write = None;
                return Err(StorageError::WriteFailed {
                    target: target.to_string(),
                    reason: "injected write failure".to_string(),
                });
            }
            self.fail_on_write = Some(remaining - 1);
        }
        Ok(())
    }

    fn student_mut(&mut self, student: StudentId) -> &mut StudentAggregate {
        self.state.students.entry(student).or_default()
    }
}

impl ActivityStore for MemoryStore {
    fn insert_record(&mut self, record: NewActivityRecord) -> StoreResult<RecordId> {
        self.check_write(&ActivityTable::Records.to_string())?;
        self.state.next_record_id += 1;
        let id = RecordId(self.state.next_record_id);
        self.state.records.insert(id, ActivityRecord::from_new(id, record));
        Ok(id)
    }

    fn insert_meta(&mut self, record_id: RecordId, key: &str, value: i64) -> StoreResult<()> {
        self.check_write(&ActivityTable::Meta.to_string())?;
        if !self.state.records.contains_key(&record_id) {
            return Err(StorageError::WriteFailed {
                target: ActivityTable::Meta.to_string(),
                reason: format!("{} does not exist", record_id),
            });
        }
        self.state.meta.push(ActivityMeta { record_id, key: key.to_string(), value });
        Ok(())
    }

    fn bulk_delete(&mut self, table: ActivityTable, ids: &[RecordId]) -> StoreResult<usize> {
        self.check_write(&table.to_string())?;
        let deleted = match table {
            ActivityTable::Records => {
                ids.iter().filter(|id| self.state.records.remove(*id).is_some()).count()
            }
            ActivityTable::Meta => {
                let before = self.state.meta.len();
                self.state.meta.retain(|m| !ids.contains(&m.record_id));
                before - self.state.meta.len()
            }
        };
        Ok(deleted)
    }
}

impl AggregateStateStore for MemoryStore {
    fn course_progress(&self, student: StudentId) -> StoreResult<CourseProgressMap> {
        Ok(self
            .state
            .students
            .get(&student)
            .and_then(|s| s.course_progress.clone())
            .unwrap_or_default())
    }

    fn replace_course_progress(
        &mut self,
        student: StudentId,
        progress: CourseProgressMap,
    ) -> StoreResult<()> {
        self.check_write("course_progress")?;
        self.student_mut(student).course_progress = Some(progress);
        Ok(())
    }

    fn delete_course_progress(&mut self, student: StudentId) -> StoreResult<bool> {
        self.check_write("course_progress")?;
        Ok(self.student_mut(student).course_progress.take().is_some())
    }

    fn lesson_completions(&self, student: StudentId) -> StoreResult<LessonCompletions> {
        Ok(self
            .state
            .students
            .get(&student)
            .and_then(|s| s.lesson_completions.clone())
            .unwrap_or_default())
    }

    fn replace_lesson_completions(
        &mut self,
        student: StudentId,
        completions: LessonCompletions,
    ) -> StoreResult<()> {
        self.check_write("lesson_completions")?;
        self.student_mut(student).lesson_completions = Some(completions);
        Ok(())
    }

    fn delete_lesson_completions(&mut self, student: StudentId) -> StoreResult<bool> {
        self.check_write("lesson_completions")?;
        Ok(self.student_mut(student).lesson_completions.take().is_some())
    }

    fn quiz_history(&self, student: StudentId) -> StoreResult<Vec<QuizAttempt>> {
        Ok(self.state.students.get(&student).map(|s| s.quiz_history.clone()).unwrap_or_default())
    }

    fn append_quiz_attempt(&mut self, student: StudentId, attempt: QuizAttempt) -> StoreResult<()> {
        self.check_write("quiz_history")?;
        self.student_mut(student).quiz_history.push(attempt);
        Ok(())
    }

    fn replace_quiz_history(
        &mut self,
        student: StudentId,
        history: Vec<QuizAttempt>,
    ) -> StoreResult<()> {
        self.check_write("quiz_history")?;
        self.student_mut(student).quiz_history = history;
        Ok(())
    }

    fn set_marker(&mut self, student: StudentId, key: &str, value: i64) -> StoreResult<()> {
        self.check_write("markers")?;
        self.student_mut(student).markers.insert(key.to_string(), value);
        Ok(())
    }

    fn marker(&self, student: StudentId, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.state.students.get(&student).and_then(|s| s.markers.get(key).copied()))
    }

    fn delete_markers(
        &mut self,
        student: StudentId,
        matches: &dyn Fn(&str) -> bool,
    ) -> StoreResult<usize> {
        self.check_write("markers")?;
        let markers = &mut self.student_mut(student).markers;
        let before = markers.len();
        markers.retain(|key, _| !matches(key.as_str()));
        Ok(before - markers.len())
    }
}

impl LedgerSlot for MemoryStore {
    fn read_slot(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.state.slots.get(name).cloned())
    }

    fn write_slot(&mut self, name: &str, value: String) -> StoreResult<()> {
        self.check_write(name)?;
        self.state.slots.insert(name.to_string(), value);
        Ok(())
    }

    fn delete_slot(&mut self, name: &str) -> StoreResult<bool> {
        self.check_write(name)?;
        Ok(self.state.slots.remove(name).is_some())
    }
}

impl Transactional for MemoryStore {
    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StorageError::Transaction("a transaction is already open".to_string()));
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StorageError::Transaction("commit without an open transaction".to_string())),
        }
    }

    fn rollback(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.state = snapshot;
                Ok(())
            }
            None => {
                Err(StorageError::Transaction("rollback without an open transaction".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::CourseProgress;
    use crate::types::{ActivityStatus, ContentId, ContentKind};
    use chrono::{TimeZone, Utc};

    fn new_record(student: u64, content: u64) -> NewActivityRecord {
        NewActivityRecord {
            student_id: StudentId(student),
            content_id: ContentId(content),
            course_id: None,
            kind: ContentKind::Course,
            started: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            completed: None,
            status: ActivityStatus::NotStarted,
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut store = MemoryStore::new();
        let a = store.insert_record(new_record(1, 10)).unwrap();
        let b = store.insert_record(new_record(1, 11)).unwrap();
        assert_eq!(a, RecordId(1));
        assert_eq!(b, RecordId(2));
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.record(b).unwrap().content_id, ContentId(11));
    }

    #[test]
    fn test_meta_requires_existing_record() {
        let mut store = MemoryStore::new();
        assert!(store.insert_meta(RecordId(7), "steps_total", 10).is_err());

        let id = store.insert_record(new_record(1, 10)).unwrap();
        store.insert_meta(id, "steps_total", 10).unwrap();
        store.insert_meta(id, "steps_completed", 4).unwrap();
        assert_eq!(store.meta_for(id).len(), 2);
    }

    #[test]
    fn test_bulk_delete_counts_rows() {
        let mut store = MemoryStore::new();
        let a = store.insert_record(new_record(1, 10)).unwrap();
        let b = store.insert_record(new_record(2, 10)).unwrap();
        store.insert_meta(a, "steps_total", 10).unwrap();
        store.insert_meta(a, "steps_completed", 10).unwrap();
        store.insert_meta(b, "steps_total", 10).unwrap();

        assert_eq!(store.bulk_delete(ActivityTable::Meta, &[a, RecordId(99)]).unwrap(), 2);
        assert_eq!(store.bulk_delete(ActivityTable::Records, &[a, RecordId(99)]).unwrap(), 1);
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.meta_count(), 1);
    }

    #[test]
    fn test_rollback_restores_everything() {
        let mut store = MemoryStore::new();
        let kept = store.insert_record(new_record(1, 10)).unwrap();

        store.begin().unwrap();
        store.insert_record(new_record(1, 11)).unwrap();
        store.set_marker(StudentId(1), "course_completed_10", 1).unwrap();
        store.write_slot("ledger", "{}".to_string()).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.record_count(), 1);
        assert!(store.record(kept).is_some());
        assert_eq!(store.marker(StudentId(1), "course_completed_10").unwrap(), None);
        assert_eq!(store.read_slot("ledger").unwrap(), None);
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_nested_begin_rejected() {
        let mut store = MemoryStore::new();
        store.begin().unwrap();
        assert!(matches!(store.begin(), Err(StorageError::Transaction(_))));
        store.commit().unwrap();
        assert!(store.commit().is_err());
        assert!(store.rollback().is_err());
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let mut store = MemoryStore::new();
        store.fail_on_write(2);
        store.insert_record(new_record(1, 10)).unwrap();
        let err = store.insert_record(new_record(1, 11)).unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { .. }));
        store.insert_record(new_record(1, 12)).unwrap();
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn test_aggregate_keys_replace_and_delete() {
        let mut store = MemoryStore::new();
        let student = StudentId(3);
        assert!(store.course_progress(student).unwrap().is_empty());
        assert!(!store.delete_course_progress(student).unwrap());

        let mut progress = CourseProgressMap::new();
        progress.insert(ContentId(10), CourseProgress { completed: true, total: 1 });
        store.replace_course_progress(student, progress.clone()).unwrap();
        assert_eq!(store.course_progress(student).unwrap(), progress);
        assert!(store.delete_course_progress(student).unwrap());
        assert!(store.course_progress(student).unwrap().is_empty());
    }

    #[test]
    fn test_delete_markers_with_predicate() {
        let mut store = MemoryStore::new();
        let student = StudentId(4);
        store.set_marker(student, "completed_10_20", 1).unwrap();
        store.set_marker(student, "course_completed_10", 1).unwrap();
        store.set_marker(student, "nickname_set", 1).unwrap();

        let removed = store.delete_markers(student, &|key: &str| key.contains("completed")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.marker(student, "nickname_set").unwrap(), Some(1));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = MemoryStore::new();
        let id = store.insert_record(new_record(8, 10)).unwrap();
        store.insert_meta(id, "steps_total", 10).unwrap();
        store.write_slot("ledger", "{\"x\":1}".to_string()).unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.record_count(), 1);
        assert_eq!(loaded.meta_count(), 1);
        assert_eq!(loaded.read_slot("ledger").unwrap().as_deref(), Some("{\"x\":1}"));

        // Ids keep increasing after a reload
        let mut loaded = loaded;
        assert_eq!(loaded.insert_record(new_record(8, 11)).unwrap(), RecordId(2));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load(dir.path().join("missing.json")).unwrap();
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn test_save_refused_inside_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        store.begin().unwrap();
        assert!(store.save(dir.path().join("state.json")).is_err());
    }
}
