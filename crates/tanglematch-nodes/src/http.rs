//! REST implementation of [`NodeApi`].
//!
//! Submission failures split into two classes: HTTP 4xx means the node
//! rejected the transaction itself (permanent, `TM_ERR_600`); everything
//! else is a transport problem (transient, `TM_ERR_501`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tanglematch_types::{
    Address, OutputKind, ProtocolParameters, Result, SignedTransactionPayload, TanglematchError,
    TransferId,
};

use crate::api::{NodeApi, NodeInfo, UnspentOutput};

/// REST client for one node.
#[derive(Debug, Clone)]
pub struct HttpNodeApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    name: String,
    version: String,
    status: StatusResponse,
    protocol: ProtocolParameters,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    is_healthy: bool,
}

#[derive(Debug, Deserialize)]
struct OutputsResponse {
    items: Vec<UnspentOutput>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    block_id: TransferId,
}

fn transport(err: &reqwest::Error) -> TanglematchError {
    TanglematchError::NodeRequestFailed {
        reason: err.to_string(),
    }
}

impl HttpNodeApi {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| transport(&e))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl NodeApi for HttpNodeApi {
    async fn health(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint("/health"))
            .send()
            .await
            .map_err(|e| transport(&e))?;
        Ok(response.status().is_success())
    }

    async fn info(&self) -> Result<NodeInfo> {
        let response: InfoResponse = self
            .client
            .get(self.endpoint("/api/core/v2/info"))
            .send()
            .await
            .map_err(|e| transport(&e))?
            .error_for_status()
            .map_err(|e| transport(&e))?
            .json()
            .await
            .map_err(|e| transport(&e))?;
        Ok(NodeInfo {
            name: response.name,
            version: response.version,
            healthy: response.status.is_healthy,
            protocol: response.protocol,
        })
    }

    async fn outputs_for_address(
        &self,
        address: Address,
        kind: OutputKind,
    ) -> Result<Vec<UnspentOutput>> {
        let response: OutputsResponse = self
            .client
            .get(self.endpoint("/api/indexer/v1/outputs"))
            .query(&[
                ("address", address.to_string()),
                ("kind", kind.to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport(&e))?
            .error_for_status()
            .map_err(|e| transport(&e))?
            .json()
            .await
            .map_err(|e| transport(&e))?;
        Ok(response.items)
    }

    async fn submit(&self, payload: &SignedTransactionPayload) -> Result<TransferId> {
        let response = self
            .client
            .post(self.endpoint("/api/core/v2/blocks"))
            .json(payload)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        if status.is_client_error() {
            let reason = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(TanglematchError::TransactionRejected { reason });
        }
        if !status.is_success() {
            return Err(TanglematchError::NodeRequestFailed {
                reason: format!("submission returned {status}"),
            });
        }
        let accepted: SubmitResponse = response.json().await.map_err(|e| transport(&e))?;
        Ok(accepted.block_id)
    }
}
