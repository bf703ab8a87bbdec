//! Simulator facade
//!
//! [`ActivitySimulator`] owns the store, the content provider and the
//! configuration and exposes the three operations of the request triad.
//! The `handle_*` methods wrap each operation in a [`ResponseEnvelope`];
//! the plain methods return typed results for library callers.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{error, info, warn};

use crate::api::{GenerateRequest, ResponseEnvelope};
use crate::content::ContentHierarchyProvider;
use crate::simulation::cleanup::{CleanupExecutor, CleanupReport};
use crate::simulation::error::{SimulationError, SimulationResult};
use crate::simulation::export::{ExportReceipt, ExportSerializer};
use crate::simulation::ledger::{SimulationBatch, SimulationLedger};
use crate::simulation::recorder::BatchRecorder;
use crate::store::SimulationStore;
use crate::types::{ContentId, SimulationConfig, StudentId};

/// Entry point for generate, export and cleanup
pub struct ActivitySimulator<S: SimulationStore, P: ContentHierarchyProvider> {
    store: S,
    provider: P,
    config: SimulationConfig,
    ledger: SimulationLedger,
    exporter: ExportSerializer,
    rng: Box<dyn RngCore>,
}

impl<S, P> fmt::Debug for ActivitySimulator<S, P>
where
    S: SimulationStore + fmt::Debug,
    P: ContentHierarchyProvider + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivitySimulator")
            .field("store", &self.store)
            .field("provider", &self.provider)
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .field("exporter", &self.exporter)
            .field("rng", &"<RngCore>")
            .finish()
    }
}

impl<S: SimulationStore, P: ContentHierarchyProvider> ActivitySimulator<S, P> {
    /// Create a simulator; the random source is seeded when `config.seed` is set
    pub fn new(store: S, provider: P, config: SimulationConfig) -> SimulationResult<Self> {
        config
            .validate()
            .map_err(|e| SimulationError::configuration_error(e.to_string()))?;

        let rng: Box<dyn RngCore> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::thread_rng()),
        };
        let mut exporter = ExportSerializer::new(&config.export_dir);
        if let Some(base_url) = &config.export_base_url {
            exporter = exporter.with_base_url(base_url.clone());
        }

        Ok(Self { store, provider, config, ledger: SimulationLedger::new(), exporter, rng })
    }

    /// Replace the random source
    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = rng;
        self
    }

    /// Store the ledger under a different slot name
    pub fn with_ledger(mut self, ledger: SimulationLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Generate request using the configured rate parameters
    pub fn request(
        &self,
        students: impl IntoIterator<Item = StudentId>,
        courses: impl IntoIterator<Item = ContentId>,
    ) -> GenerateRequest {
        GenerateRequest::new(students, courses).with_params(self.config.activity_params())
    }

    /// Generate activity with the window ending now
    pub fn generate(&mut self, request: GenerateRequest) -> SimulationResult<SimulationBatch> {
        self.generate_at(request, Utc::now())
    }

    /// Generate activity with the window ending at `now`
    ///
    /// Input is validated before anything is written. On failure every
    /// write of the call has been rolled back. With
    /// `overwrite_existing_batch` set, a stored or unreadable ledger is
    /// replaced.
    pub fn generate_at(
        &mut self,
        request: GenerateRequest,
        now: DateTime<Utc>,
    ) -> SimulationResult<SimulationBatch> {
        let students: BTreeSet<StudentId> = request.students.into_iter().collect();
        let courses: BTreeSet<ContentId> = request.courses.into_iter().collect();
        if students.is_empty() {
            return Err(SimulationError::NoStudents);
        }
        if courses.is_empty() {
            return Err(SimulationError::NoCourses);
        }
        request.params.validate()?;

        match self.ledger.load(&self.store) {
            Ok(None) => {}
            Ok(Some(existing)) => {
                if !self.config.overwrite_existing_batch {
                    return Err(SimulationError::BatchAlreadyExists {
                        batch_id: existing.batch_id,
                        created_at: existing.created_at,
                    });
                }
                warn!(
                    "Replacing ledger of batch {}; its {} records stay in the store",
                    existing.batch_id,
                    existing.record_count()
                );
            }
            Err(SimulationError::LedgerCorrupt(e)) if self.config.overwrite_existing_batch => {
                warn!("Replacing unreadable ledger in slot {}: {}", self.ledger.slot(), e);
            }
            Err(e) => return Err(e),
        }

        BatchRecorder::new(&self.provider, &self.ledger, request.params, now)
            .record(&mut self.store, students, courses, &mut *self.rng)
            .map_err(SimulationError::GenerationFailed)
    }

    /// Export the stored batch, naming the file after the current time
    pub fn export(&self) -> SimulationResult<ExportReceipt> {
        self.export_at(Utc::now())
    }

    /// Export the stored batch, naming the file after `now`
    pub fn export_at(&self, now: DateTime<Utc>) -> SimulationResult<ExportReceipt> {
        self.exporter.export(&self.store, &self.ledger, now)
    }

    /// Delete everything the stored batch created
    pub fn cleanup(&mut self) -> SimulationResult<CleanupReport> {
        CleanupExecutor::new(&self.ledger).cleanup(&mut self.store)
    }

    /// Generate and wrap the result in an envelope
    pub fn handle_generate(&mut self, request: GenerateRequest) -> ResponseEnvelope<SimulationBatch> {
        match self.generate(request) {
            Ok(batch) => {
                let message = generated_message(batch.students.len());
                info!("{}", message);
                ResponseEnvelope::success(message, batch)
            }
            Err(e) => failure(e),
        }
    }

    /// Export and wrap the result in an envelope
    pub fn handle_export(&self) -> ResponseEnvelope<ExportReceipt> {
        match self.export() {
            Ok(receipt) => ResponseEnvelope::success(receipt.message.clone(), receipt),
            Err(e) => failure(e),
        }
    }

    /// Clean up and wrap the result in an envelope
    pub fn handle_cleanup(&mut self) -> ResponseEnvelope<CleanupReport> {
        match self.cleanup() {
            Ok(report) => ResponseEnvelope::success(report.message.clone(), report),
            Err(e) => failure(e),
        }
    }

    /// The stored batch, if any
    pub fn current_batch(&self) -> SimulationResult<Option<SimulationBatch>> {
        self.ledger.load(&self.store)
    }

    /// Configuration in use
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Content provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Underlying store, mutably
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the simulator and return the store
    pub fn into_store(self) -> S {
        self.store
    }
}

fn generated_message(students: usize) -> String {
    if students == 1 {
        "Generated activity for 1 student.".to_string()
    } else {
        format!("Generated activity for {} students.", students)
    }
}

fn failure<T>(err: SimulationError) -> ResponseEnvelope<T> {
    if err.is_input_error() {
        warn!(code = err.code(), category = err.category(), "Request rejected: {}", err);
    } else {
        error!(code = err.code(), category = err.category(), "Operation failed: {}", err);
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentCatalog;
    use crate::simulation::LEDGER_SLOT;
    use crate::store::{LedgerSlot, MemoryStore};
    use crate::types::{ActivityParams, ConfigValidationError};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn catalog() -> ContentCatalog {
        ContentCatalog::new()
            .with_course(ContentId(1))
            .with_lesson(ContentId(10))
            .with_topic(ContentId(11))
            .with_quiz(ContentId(12))
            .with_course_quiz(ContentId(13))
    }

    fn simulator(dir: &TempDir, seed: u64) -> ActivitySimulator<MemoryStore, ContentCatalog> {
        let config = SimulationConfig {
            seed: Some(seed),
            export_dir: dir.path().display().to_string(),
            ..Default::default()
        };
        ActivitySimulator::new(MemoryStore::new(), catalog(), config).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_validation_happens_before_writes() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 1);

        let result = sim.generate_at(GenerateRequest::new([], [ContentId(1)]), now());
        assert!(matches!(result, Err(SimulationError::NoStudents)));

        let result = sim.generate_at(GenerateRequest::new([StudentId(1)], []), now());
        assert!(matches!(result, Err(SimulationError::NoCourses)));

        let bad = ActivityParams { activity_days: 0, ..Default::default() };
        let result = sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]).with_params(bad), now());
        assert!(matches!(
            result,
            Err(SimulationError::InvalidParameter(ConfigValidationError::InvalidActivityDays(0)))
        ));

        assert_eq!(sim.store().record_count(), 0);
        assert!(sim.current_batch().unwrap().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig { completion_rate: 150, ..Default::default() };
        let result = ActivitySimulator::new(MemoryStore::new(), catalog(), config);
        assert!(matches!(result, Err(SimulationError::ConfigurationError(_))));
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 2);

        let request = GenerateRequest::new(
            [StudentId(5), StudentId(3), StudentId(5)],
            [ContentId(1), ContentId(1)],
        );
        let batch = sim.generate_at(request, now()).unwrap();
        assert_eq!(batch.students, BTreeSet::from([StudentId(3), StudentId(5)]));
        assert_eq!(batch.courses.len(), 1);
        // course, lesson, topic, topic quiz, course quiz
        assert_eq!(sim.store().record_count(), 10);
    }

    #[test]
    fn test_existing_batch_blocks_generate() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 3);

        let first = sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]), now()).unwrap();
        let second = sim.generate_at(GenerateRequest::new([StudentId(2)], [ContentId(1)]), now());
        match second {
            Err(SimulationError::BatchAlreadyExists { batch_id, .. }) => assert_eq!(batch_id, first.batch_id),
            other => panic!("expected BatchAlreadyExists, got {:?}", other),
        }
        assert_eq!(sim.store().record_count(), 5);
    }

    #[test]
    fn test_overwrite_replaces_ledger() {
        let dir = TempDir::new().unwrap();
        let config = SimulationConfig {
            overwrite_existing_batch: true,
            export_dir: dir.path().display().to_string(),
            ..Default::default()
        };
        let mut sim = ActivitySimulator::new(MemoryStore::new(), catalog(), config).unwrap();

        sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]), now()).unwrap();
        let second = sim.generate_at(GenerateRequest::new([StudentId(2)], [ContentId(1)]), now()).unwrap();

        assert_eq!(sim.current_batch().unwrap(), Some(second));
        // rows of the replaced batch are left behind
        assert_eq!(sim.store().record_count(), 10);
    }

    #[test]
    fn test_forced_generate_replaces_unreadable_ledger() {
        let dir = TempDir::new().unwrap();
        let config = SimulationConfig {
            overwrite_existing_batch: true,
            export_dir: dir.path().display().to_string(),
            ..Default::default()
        };
        let mut sim = ActivitySimulator::new(MemoryStore::new(), catalog(), config).unwrap();
        sim.store_mut().write_slot(LEDGER_SLOT, "{truncated".to_string()).unwrap();

        let batch = sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]), now()).unwrap();
        assert_eq!(sim.current_batch().unwrap(), Some(batch));

        let report = sim.cleanup().unwrap();
        assert_eq!(report.deleted_activity, 5);
        assert_eq!(sim.store().record_count(), 0);
    }

    #[test]
    fn test_unreadable_ledger_blocks_generate_without_force() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 6);
        sim.store_mut().write_slot(LEDGER_SLOT, "{truncated".to_string()).unwrap();

        let result = sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]), now());
        assert!(matches!(result, Err(SimulationError::LedgerCorrupt(_))));
        assert_eq!(sim.store().record_count(), 0);
        assert_eq!(sim.handle_cleanup().code(), Some("ledger_corrupt"));
    }

    #[test]
    fn test_injected_rng_drives_outcomes() {
        let dir = TempDir::new().unwrap();
        let request = GenerateRequest::new([StudentId(1), StudentId(2)], [ContentId(1)]);

        let a = simulator(&dir, 1)
            .with_rng(Box::new(StdRng::seed_from_u64(9)))
            .generate_at(request.clone(), now())
            .unwrap();
        let b = simulator(&dir, 2)
            .with_rng(Box::new(StdRng::seed_from_u64(9)))
            .generate_at(request, now())
            .unwrap();
        assert_eq!(a.activity, b.activity);
    }

    #[test]
    fn test_custom_ledger_slot() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 7).with_ledger(SimulationLedger::with_slot("staging_batch"));

        let batch = sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]), now()).unwrap();
        assert!(sim.store().read_slot(LEDGER_SLOT).unwrap().is_none());
        assert!(sim.store().read_slot("staging_batch").unwrap().is_some());
        assert_eq!(sim.current_batch().unwrap(), Some(batch));

        assert_eq!(sim.cleanup().unwrap().deleted_activity, 5);
        assert!(sim.store().read_slot("staging_batch").unwrap().is_none());
    }

    #[test]
    fn test_store_failure_maps_to_generation_failed() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 4);
        sim.store_mut().fail_on_write(7);

        let result = sim.generate_at(GenerateRequest::new([StudentId(1)], [ContentId(1)]), now());
        assert!(matches!(result, Err(SimulationError::GenerationFailed(_))));
        assert_eq!(sim.store().record_count(), 0);
        assert_eq!(sim.store().meta_count(), 0);
        assert!(sim.current_batch().unwrap().is_none());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let dir = TempDir::new().unwrap();
        let request = GenerateRequest::new([StudentId(1), StudentId(2)], [ContentId(1)]);

        let a = simulator(&dir, 42).generate_at(request.clone(), now()).unwrap();
        let b = simulator(&dir, 42).generate_at(request, now()).unwrap();
        assert_ne!(a.batch_id, b.batch_id);
        assert_eq!(a.activity, b.activity);
    }

    #[test]
    fn test_envelopes() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(&dir, 5);

        let envelope = sim.handle_export();
        assert_eq!(envelope.code(), Some("no_data"));

        let request = sim.request([StudentId(1)], [ContentId(1)]);
        let envelope = sim.handle_generate(request);
        match &envelope {
            ResponseEnvelope::Success { message, data } => {
                assert_eq!(message, "Generated activity for 1 student.");
                assert!(data.is_some());
            }
            ResponseEnvelope::Failure { error, .. } => panic!("generate failed: {}", error),
        }

        let envelope = sim.handle_generate(sim.request([StudentId(2), StudentId(3)], [ContentId(1)]));
        assert_eq!(envelope.code(), Some("batch_exists"));

        let export = sim.handle_export();
        assert!(export.is_success());

        let cleanup = sim.handle_cleanup();
        assert_eq!(cleanup.data().map(|r| r.deleted_activity), Some(5));
        assert_eq!(sim.handle_cleanup().code(), Some("no_data"));
    }

    #[test]
    fn test_generated_message() {
        assert_eq!(generated_message(1), "Generated activity for 1 student.");
        assert_eq!(generated_message(4), "Generated activity for 4 students.");
    }
}
