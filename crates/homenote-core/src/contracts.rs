//! Easy-contract analysis
//!
//! Submitting uploads the contract scans, creates the analysis and moves
//! the [`AnalysisContext`] to `Processing`. The result normally arrives
//! over SSE; [`EasyContractService::refresh_status`] polls instead.

use crate::analysis::{AnalysisContext, AnalysisResultEvent};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{EasyContract, EasyContractRequest, EasyContractSummary};
use crate::uploads::{UploadFile, UploadService};
use homenote_client::{endpoints, ApiClient};

#[derive(Debug, Clone)]
pub struct EasyContractService {
    client: ApiClient,
    uploads: UploadService,
    analysis: AnalysisContext,
}

impl EasyContractService {
    #[must_use]
    pub fn new(client: ApiClient, uploads: UploadService, analysis: AnalysisContext) -> Self {
        Self {
            client,
            uploads,
            analysis,
        }
    }

    /// Shared analysis state
    #[inline]
    #[must_use]
    pub fn analysis(&self) -> &AnalysisContext {
        &self.analysis
    }

    /// Upload `files` and start an analysis
    ///
    /// # Errors
    /// - `ServiceError::Validation` when `files` is empty
    /// - upload and API errors as returned by the backend
    pub async fn submit(&self, files: &[UploadFile]) -> ServiceResult<EasyContract> {
        if files.is_empty() {
            return Err(ServiceError::Validation(
                "select at least one contract file".to_string(),
            ));
        }

        let assets = self.uploads.upload_all(files).await?;
        let request = EasyContractRequest {
            file_asset_ids: assets.iter().map(|asset| asset.id).collect(),
        };
        let contract: EasyContract = self
            .client
            .post_data(endpoints::EASY_CONTRACTS, &request)
            .await?;

        self.analysis.begin(contract.id);
        if contract.status.is_terminal() {
            self.track(&contract);
        }
        Ok(contract)
    }

    /// Fetch one analysis
    pub async fn get(&self, id: u64) -> ServiceResult<EasyContract> {
        Ok(self.client.get_data(&contract_path(id)).await?)
    }

    /// All analyses of the member
    pub async fn list(&self) -> ServiceResult<Vec<EasyContractSummary>> {
        Ok(self.client.get_data(endpoints::EASY_CONTRACTS).await?)
    }

    /// Delete an analysis; clears the context if it was being tracked
    pub async fn delete(&self, id: u64) -> ServiceResult<()> {
        self.client.delete(&contract_path(id)).await?;
        if self.analysis.current().easy_contract_id == Some(id) {
            self.analysis.clear();
        }
        Ok(())
    }

    /// Fetch the analysis and feed its status into the context
    pub async fn refresh_status(&self, id: u64) -> ServiceResult<EasyContract> {
        let contract = self.get(id).await?;
        self.track(&contract);
        Ok(contract)
    }

    fn track(&self, contract: &EasyContract) {
        self.analysis.apply_result(AnalysisResultEvent {
            easy_contract_id: contract.id,
            status: contract.status,
            error: None,
        });
    }
}

fn contract_path(id: u64) -> String {
    format!("{}/{id}", endpoints::EASY_CONTRACTS)
}
