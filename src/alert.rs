//! Outbound alert contract (§6: "Outbound alert")
//!
//! `emitAlert` is one logical operation whose transport (a chat protocol)
//! is an external collaborator, out of scope here (§1). This module
//! defines the contract only: an `AlertTransport` trait concrete
//! deployments implement, plus the outcome type the contract specifies.

use async_trait::async_trait;

use crate::model::AlertRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Ok,
    Transient,
    Permanent,
}

#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn emit_alert(&self, record: &AlertRecord) -> EmitOutcome;
}

/// No-op transport used when no chat integration is configured; logs
/// instead of delivering, so the pipeline still runs end to end in
/// development and in the scenario test suite.
pub struct NullAlertTransport;

#[async_trait]
impl AlertTransport for NullAlertTransport {
    async fn emit_alert(&self, record: &AlertRecord) -> EmitOutcome {
        tracing::info!(
            dedup_key = %record.dedup_key,
            token = %record.token,
            wallets = record.wallets.len(),
            "alert emitted (no transport configured, logging only)"
        );
        EmitOutcome::Ok
    }
}
