//! Member profile and onboarding
//!
//! New members pick a nickname, then one or more lifestyle tags.
//! [`Onboarding`] holds the form state between those steps.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Lifestyle, LifestyleSelection, Member, MemberUpdate};
use crate::nickname::{check_nickname, filter_nickname};
use homenote_client::{endpoints, ApiClient, RequestOptions};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct MemberService {
    client: ApiClient,
}

impl MemberService {
    #[inline]
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Signed-in member
    pub async fn me(&self) -> ServiceResult<Member> {
        Ok(self.client.get_data(endpoints::MEMBERS_ME).await?)
    }

    /// Change the nickname after checking it locally
    ///
    /// # Errors
    /// - `ServiceError::Validation` if the nickname breaks a rule; nothing
    ///   is sent in that case
    pub async fn update_nickname(&self, nickname: &str) -> ServiceResult<Member> {
        check_nickname(nickname).map_err(|e| ServiceError::Validation(e.to_string()))?;

        let body = MemberUpdate {
            nickname: nickname.to_string(),
        };
        let member: Member = self
            .client
            .request_data(endpoints::MEMBERS_ME, RequestOptions::patch().with_json(&body)?)
            .await?;
        tracing::info!("Nickname updated for member {}", member.id);
        Ok(member)
    }

    /// Lifestyle tags, with the member's current selection
    pub async fn lifestyles(&self) -> ServiceResult<Vec<Lifestyle>> {
        Ok(self.client.get_data(endpoints::LIFESTYLES).await?)
    }

    /// Save the selected lifestyle tags
    ///
    /// # Errors
    /// - `ServiceError::Validation` when `ids` is empty
    pub async fn save_lifestyles(&self, ids: &[u64]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Err(ServiceError::Validation(
                "select at least one lifestyle".to_string(),
            ));
        }
        let body = LifestyleSelection {
            lifestyle_ids: ids.to_vec(),
        };
        self.client
            .request_ok(endpoints::LIFESTYLES, RequestOptions::post().with_json(&body)?)
            .await?;
        Ok(())
    }
}

/// Onboarding step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    Nickname,
    Lifestyles,
    Done,
}

/// Onboarding form state
#[derive(Debug, Clone)]
pub struct Onboarding {
    step: OnboardingStep,
    nickname: String,
    selected: BTreeSet<u64>,
}

impl Onboarding {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: OnboardingStep::Nickname,
            nickname: String::new(),
            selected: BTreeSet::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    #[inline]
    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Typed input; disallowed characters are dropped
    pub fn input_nickname(&mut self, raw: &str) -> &str {
        self.nickname = filter_nickname(raw);
        &self.nickname
    }

    /// Select or deselect a lifestyle; returns whether it is now selected
    pub fn toggle_lifestyle(&mut self, id: u64) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Selected lifestyle ids in ascending order
    #[must_use]
    pub fn selected(&self) -> Vec<u64> {
        self.selected.iter().copied().collect()
    }

    /// Submit the current step and advance
    ///
    /// # Errors
    /// - `ServiceError::Validation` for an invalid nickname or empty selection
    /// - API errors; the step does not advance
    pub async fn submit(&mut self, members: &MemberService) -> ServiceResult<OnboardingStep> {
        match self.step {
            OnboardingStep::Nickname => {
                members.update_nickname(&self.nickname).await?;
                self.step = OnboardingStep::Lifestyles;
            }
            OnboardingStep::Lifestyles => {
                members.save_lifestyles(&self.selected()).await?;
                self.step = OnboardingStep::Done;
            }
            OnboardingStep::Done => {}
        }
        Ok(self.step)
    }
}

impl Default for Onboarding {
    fn default() -> Self {
        Self::new()
    }
}
