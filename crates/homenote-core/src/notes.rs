//! Home notes and their inspection checklists

use crate::error::{ServiceError, ServiceResult};
use crate::models::{ChecklistUpdate, HomeNote, HomeNoteDraft};
use crate::notify::{Notice, NoticeLevel, Notifier};
use crate::optimistic::ToggleSet;
use homenote_client::{endpoints, ApiClient, ClientError, RequestOptions};
use std::fmt;
use std::sync::Arc;

const CHECKLIST_FAILED: &str = "Could not update the checklist. Please try again.";

pub struct HomeNoteService {
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
    checklist: ToggleSet<(u64, u64)>,
}

impl HomeNoteService {
    #[must_use]
    pub fn new(client: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            notifier,
            checklist: ToggleSet::new(),
        }
    }

    pub async fn list(&self) -> ServiceResult<Vec<HomeNote>> {
        let notes: Vec<HomeNote> = self.client.get_data(endpoints::HOME_NOTES).await?;
        notes.iter().for_each(|note| self.remember(note));
        Ok(notes)
    }

    pub async fn get(&self, id: u64) -> ServiceResult<HomeNote> {
        let note: HomeNote = self.client.get_data(&note_path(id)).await?;
        self.remember(&note);
        Ok(note)
    }

    /// Create a note
    ///
    /// # Errors
    /// - `ServiceError::Validation` when the title is blank
    pub async fn create(&self, draft: &HomeNoteDraft) -> ServiceResult<HomeNote> {
        validate(draft)?;
        let note: HomeNote = self.client.post_data(endpoints::HOME_NOTES, draft).await?;
        self.remember(&note);
        self.notifier
            .notify(Notice::new(NoticeLevel::Success, "Home note saved."));
        Ok(note)
    }

    /// Replace title, address and memo
    ///
    /// # Errors
    /// - `ServiceError::Validation` when the title is blank
    pub async fn update(&self, id: u64, draft: &HomeNoteDraft) -> ServiceResult<HomeNote> {
        validate(draft)?;
        let note: HomeNote = self
            .client
            .request_data(&note_path(id), RequestOptions::put().with_json(draft)?)
            .await?;
        self.remember(&note);
        Ok(note)
    }

    pub async fn delete(&self, id: u64) -> ServiceResult<()> {
        self.client.delete(&note_path(id)).await?;
        Ok(())
    }

    /// Local checklist state
    #[inline]
    #[must_use]
    pub fn is_checked(&self, note_id: u64, item_id: u64) -> bool {
        self.checklist.get((note_id, item_id))
    }

    /// Flip a checklist item, returning the confirmed value
    ///
    /// # Errors
    /// - `ServiceError::Client` after rolling back when the backend refuses
    /// - `ServiceError::Validation` if a toggle for the item is still pending
    pub async fn toggle_checklist_item(&self, note_id: u64, item_id: u64) -> ServiceResult<bool> {
        self.checklist
            .toggle(
                (note_id, item_id),
                self.notifier.as_ref(),
                CHECKLIST_FAILED,
                |checked| self.send_checked(note_id, item_id, checked),
            )
            .await
    }

    async fn send_checked(&self, note_id: u64, item_id: u64, checked: bool) -> Result<(), ClientError> {
        let path = format!("{}/checklist/{item_id}", note_path(note_id));
        let options = RequestOptions::patch().with_json(&ChecklistUpdate { checked })?;
        self.client.request_ok(&path, options).await
    }

    fn remember(&self, note: &HomeNote) {
        for item in &note.checklist {
            let key = (note.id, item.id);
            if !self.checklist.is_pending(key) {
                self.checklist.set(key, item.checked);
            }
        }
    }
}

impl fmt::Debug for HomeNoteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeNoteService")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

fn validate(draft: &HomeNoteDraft) -> ServiceResult<()> {
    if draft.title.trim().is_empty() {
        Err(ServiceError::Validation("title is required".to_string()))
    } else {
        Ok(())
    }
}

fn note_path(id: u64) -> String {
    format!("{}/{id}", endpoints::HOME_NOTES)
}
