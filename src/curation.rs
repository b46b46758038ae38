use serde::{Deserialize, Serialize};

use crate::models::{
    BACK_MAX_CHARS, BulkAcceptRequest, BulkFlashcardItem, FlashcardSource, FRONT_MAX_CHARS,
    GenerationResponse,
};
use uuid::Uuid;

/// Curation status of one proposal. Every proposal enters as `pending`
/// right after generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurationError {
    #[error("no proposal with id '{0}'")]
    UnknownProposal(String),

    #[error("rejected proposals cannot be edited")]
    EditRejected,

    #[error("no edit in progress for proposal '{0}'")]
    NoDraft(String),

    #[error("{0}")]
    InvalidContent(String),

    #[error("no approved proposals to save")]
    NothingApproved,
}

/// In-progress edit of a proposal. The proposal's own fields stay
/// untouched until the draft is saved, so cancelling restores the
/// pre-edit values by simply dropping the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProposalDraft {
    front: String,
    back: String,
}

/// One candidate flashcard under curation.
#[derive(Debug, Clone)]
pub struct CurationProposal {
    pub id: String,
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
    pub status: ProposalStatus,
    draft: Option<ProposalDraft>,
}

impl CurationProposal {
    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }
}

/// The proposal curation state machine: per-proposal approve/reject
/// toggles and a draft-based edit flow, pure and UI-free.
#[derive(Debug, Clone, Default)]
pub struct CurationBoard {
    generation_id: Option<Uuid>,
    proposals: Vec<CurationProposal>,
}

impl CurationBoard {
    /// Builds a board from a fresh generation. Proposal ids are derived
    /// from the generation id and the ordinal index.
    pub fn from_generation(response: &GenerationResponse) -> Self {
        let proposals = response
            .flashcards_proposals
            .iter()
            .enumerate()
            .map(|(index, proposal)| CurationProposal {
                id: format!("{}-{index}", response.generation_id),
                front: proposal.front.clone(),
                back: proposal.back.clone(),
                source: proposal.source,
                status: ProposalStatus::Pending,
                draft: None,
            })
            .collect();

        Self { generation_id: Some(response.generation_id), proposals }
    }

    pub fn proposals(&self) -> &[CurationProposal] {
        &self.proposals
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Exact count of approved proposals; gates the bulk-save action.
    pub fn approved_count(&self) -> usize {
        self.proposals
            .iter()
            .filter(|p| p.status == ProposalStatus::Approved)
            .count()
    }

    /// `pending`/`rejected` become `approved`; `approved` toggles back to
    /// `pending`.
    pub fn toggle_approve(&mut self, id: &str) -> Result<ProposalStatus, CurationError> {
        let proposal = self.proposal_mut(id)?;
        proposal.status = match proposal.status {
            ProposalStatus::Approved => ProposalStatus::Pending,
            ProposalStatus::Pending | ProposalStatus::Rejected => ProposalStatus::Approved,
        };
        Ok(proposal.status)
    }

    /// `pending`/`approved` become `rejected`; `rejected` toggles back to
    /// `pending`.
    pub fn toggle_reject(&mut self, id: &str) -> Result<ProposalStatus, CurationError> {
        let proposal = self.proposal_mut(id)?;
        proposal.status = match proposal.status {
            ProposalStatus::Rejected => ProposalStatus::Pending,
            ProposalStatus::Pending | ProposalStatus::Approved => ProposalStatus::Rejected,
        };
        Ok(proposal.status)
    }

    /// Opens edit mode, seeding the draft with the current content.
    /// Rejected proposals are not editable.
    pub fn begin_edit(&mut self, id: &str) -> Result<(), CurationError> {
        let proposal = self.proposal_mut(id)?;
        if proposal.status == ProposalStatus::Rejected {
            return Err(CurationError::EditRejected);
        }
        if proposal.draft.is_none() {
            proposal.draft = Some(ProposalDraft {
                front: proposal.front.clone(),
                back: proposal.back.clone(),
            });
        }
        Ok(())
    }

    /// Replaces the in-progress draft content without committing it.
    pub fn set_draft(&mut self, id: &str, front: &str, back: &str) -> Result<(), CurationError> {
        let proposal = self.proposal_mut(id)?;
        match proposal.draft.as_mut() {
            Some(draft) => {
                draft.front = front.to_string();
                draft.back = back.to_string();
                Ok(())
            }
            None => Err(CurationError::NoDraft(id.to_string())),
        }
    }

    /// Commits the draft: validates lengths, applies the content, forces
    /// `status = approved` and `source = ai-edited`, closes edit mode.
    /// On validation failure nothing changes and the draft stays open.
    pub fn save_edit(&mut self, id: &str) -> Result<(), CurationError> {
        let proposal = self.proposal_mut(id)?;
        let draft = proposal
            .draft
            .as_ref()
            .ok_or_else(|| CurationError::NoDraft(id.to_string()))?;

        let front = draft.front.trim().to_string();
        let back = draft.back.trim().to_string();

        if front.is_empty() || front.chars().count() > FRONT_MAX_CHARS {
            return Err(CurationError::InvalidContent(format!(
                "front must be 1-{FRONT_MAX_CHARS} characters"
            )));
        }
        if back.is_empty() || back.chars().count() > BACK_MAX_CHARS {
            return Err(CurationError::InvalidContent(format!(
                "back must be 1-{BACK_MAX_CHARS} characters"
            )));
        }

        proposal.front = front;
        proposal.back = back;
        proposal.status = ProposalStatus::Approved;
        proposal.source = FlashcardSource::AiEdited;
        proposal.draft = None;
        Ok(())
    }

    /// Drops the draft; the proposal keeps its pre-edit content and
    /// status.
    pub fn cancel_edit(&mut self, id: &str) -> Result<(), CurationError> {
        let proposal = self.proposal_mut(id)?;
        if proposal.draft.take().is_none() {
            return Err(CurationError::NoDraft(id.to_string()));
        }
        Ok(())
    }

    /// Approved proposals mapped to bulk-accept items, dropping local id
    /// and status.
    pub fn approved_items(&self) -> Vec<BulkFlashcardItem> {
        self.proposals
            .iter()
            .filter(|p| p.status == ProposalStatus::Approved)
            .map(|p| BulkFlashcardItem {
                front: p.front.clone(),
                back: p.back.clone(),
                source: p.source,
            })
            .collect()
    }

    /// The save payload. Fails when nothing is approved; the caller keeps
    /// the board untouched on any save failure and clears it on success.
    pub fn bulk_accept_request(&self) -> Result<BulkAcceptRequest, CurationError> {
        let generation_id = self.generation_id.ok_or(CurationError::NothingApproved)?;
        let flashcards = self.approved_items();
        if flashcards.is_empty() {
            return Err(CurationError::NothingApproved);
        }
        Ok(BulkAcceptRequest { generation_id, flashcards })
    }

    /// Fresh start after a successful save or a new generation.
    pub fn clear(&mut self) {
        self.generation_id = None;
        self.proposals.clear();
    }

    fn proposal_mut(&mut self, id: &str) -> Result<&mut CurationProposal, CurationError> {
        self.proposals
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CurationError::UnknownProposal(id.to_string()))
    }
}
