//! In-memory store doubles for tests, with per-step failure switches.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{
    AssessmentStateStore, CandidateLookup, InstructionStore, PositionLookup, QuestionSetStore,
    SectionStore, Stores,
};
use crate::models::assessment::{AssessmentAssignment, AssessmentKey, AssessmentState};
use crate::models::position::{CandidateRef, PositionProfile};
use crate::models::question_set::QuestionSet;
use crate::question_set::documents::{InstructionDocument, SectionDocument};

#[derive(Default)]
pub struct MemoryBackend {
    question_sets: Mutex<HashMap<Uuid, QuestionSet>>,
    sections: Mutex<HashMap<Uuid, SectionDocument>>,
    instructions: Mutex<HashMap<Uuid, InstructionDocument>>,
    assessments: Mutex<HashMap<AssessmentKey, AssessmentState>>,
    bindings: Mutex<HashMap<Uuid, Vec<CandidateRef>>>,
    positions: Mutex<HashMap<Uuid, PositionProfile>>,
    failing_candidates: Mutex<HashSet<Uuid>>,
    pub fail_question_sets: AtomicBool,
    pub fail_sections: AtomicBool,
    pub fail_instructions: AtomicBool,
    pub fail_lookup: AtomicBool,
}

impl MemoryBackend {
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            question_sets: self.clone(),
            sections: self.clone(),
            instructions: self.clone(),
            assessments: self.clone(),
            candidates: self.clone(),
            positions: self.clone(),
        }
    }

    pub fn bind_candidates(&self, position_id: Uuid, candidates: Vec<CandidateRef>) {
        self.bindings.lock().unwrap().insert(position_id, candidates);
    }

    pub fn add_position(&self, profile: PositionProfile) {
        self.positions.lock().unwrap().insert(profile.id, profile);
    }

    pub fn fail_candidate(&self, candidate_id: Uuid) {
        self.failing_candidates.lock().unwrap().insert(candidate_id);
    }

    pub fn question_set(&self, id: Uuid) -> Option<QuestionSet> {
        self.question_sets.lock().unwrap().get(&id).cloned()
    }

    pub fn question_set_count(&self) -> usize {
        self.question_sets.lock().unwrap().len()
    }

    pub fn section(&self, question_set_id: Uuid) -> Option<SectionDocument> {
        self.sections.lock().unwrap().get(&question_set_id).cloned()
    }

    pub fn instruction(&self, question_set_id: Uuid) -> Option<InstructionDocument> {
        self.instructions
            .lock()
            .unwrap()
            .get(&question_set_id)
            .cloned()
    }

    pub fn assessment_states(&self) -> Vec<AssessmentState> {
        self.assessments.lock().unwrap().values().cloned().collect()
    }

    /// Simulates the interview runtime finishing round 1 for a candidate.
    pub fn mark_round1_completed(&self, candidate_id: Uuid) {
        for state in self.assessments.lock().unwrap().values_mut() {
            if state.candidate_id == candidate_id {
                state.round1_completed = true;
            }
        }
    }
}

fn check(flag: &AtomicBool, what: &str) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        bail!("{what} unavailable");
    }
    Ok(())
}

#[async_trait]
impl QuestionSetStore for MemoryBackend {
    async fn create(&self, set: &QuestionSet) -> Result<Uuid> {
        check(&self.fail_question_sets, "question set store")?;
        self.question_sets
            .lock()
            .unwrap()
            .insert(set.id, set.clone());
        Ok(set.id)
    }

    async fn update(&self, set: &QuestionSet) -> Result<Uuid> {
        check(&self.fail_question_sets, "question set store")?;
        let mut sets = self.question_sets.lock().unwrap();
        let existing = sets
            .get_mut(&set.id)
            .ok_or_else(|| anyhow!("question set {} does not exist", set.id))?;
        *existing = set.clone();
        Ok(set.id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<QuestionSet>> {
        Ok(self.question_set(id))
    }
}

#[async_trait]
impl SectionStore for MemoryBackend {
    async fn create(&self, doc: &SectionDocument) -> Result<()> {
        check(&self.fail_sections, "section store")?;
        self.sections
            .lock()
            .unwrap()
            .insert(doc.question_set_id, doc.clone());
        Ok(())
    }

    async fn update(&self, doc: &SectionDocument) -> Result<()> {
        SectionStore::create(self, doc).await
    }

    async fn get(&self, question_set_id: Uuid) -> Result<Option<SectionDocument>> {
        Ok(self.section(question_set_id))
    }
}

#[async_trait]
impl InstructionStore for MemoryBackend {
    async fn create(&self, doc: &InstructionDocument) -> Result<()> {
        check(&self.fail_instructions, "instruction store")?;
        self.instructions
            .lock()
            .unwrap()
            .insert(doc.question_set_id, doc.clone());
        Ok(())
    }

    async fn update(&self, doc: &InstructionDocument) -> Result<()> {
        InstructionStore::create(self, doc).await
    }

    async fn get(&self, question_set_id: Uuid) -> Result<Option<InstructionDocument>> {
        Ok(self.instruction(question_set_id))
    }
}

#[async_trait]
impl AssessmentStateStore for MemoryBackend {
    async fn upsert(&self, assignment: &AssessmentAssignment) -> Result<AssessmentState> {
        let rejected = self
            .failing_candidates
            .lock()
            .unwrap()
            .contains(&assignment.key.candidate_id);
        if rejected {
            bail!("assessment write rejected for {}", assignment.key.candidate_id);
        }
        // Let other upserts interleave like real I/O would.
        tokio::task::yield_now().await;

        let mut states = self.assessments.lock().unwrap();
        let state = states
            .entry(assignment.key)
            .and_modify(|state| assignment.apply_to(state))
            .or_insert_with(|| assignment.to_new_state());
        Ok(state.clone())
    }

    async fn get(&self, key: &AssessmentKey) -> Result<Option<AssessmentState>> {
        Ok(self.assessments.lock().unwrap().get(key).cloned())
    }
}

#[async_trait]
impl CandidateLookup for MemoryBackend {
    async fn bound_candidates(
        &self,
        _organization_id: Uuid,
        position_id: Uuid,
    ) -> Result<Vec<CandidateRef>> {
        check(&self.fail_lookup, "candidate lookup")?;
        Ok(self
            .bindings
            .lock()
            .unwrap()
            .get(&position_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PositionLookup for MemoryBackend {
    async fn position(&self, position_id: Uuid) -> Result<Option<PositionProfile>> {
        Ok(self.positions.lock().unwrap().get(&position_id).cloned())
    }
}
