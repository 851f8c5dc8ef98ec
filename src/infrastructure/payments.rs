use crate::domain::payment::{ChargeRequest, ChargeResult};
use crate::domain::ports::PaymentExecutor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Ledger {
    attempts: usize,
    settled: Vec<ChargeRequest>,
    references: HashMap<String, String>,
}

/// Payment provider stand-in that settles charges in memory.
///
/// Behaves like a real provider where it matters to the engine: charges are
/// deduplicated by idempotency key, payment methods containing `declined` are
/// rejected, and an optional latency keeps a charge in flight.
#[derive(Default, Clone)]
pub struct SimulatedPaymentExecutor {
    ledger: Arc<Mutex<Ledger>>,
    latency: Duration,
    decline_reason: Option<String>,
}

impl SimulatedPaymentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Rejects every charge with `reason`.
    pub fn declining(mut self, reason: impl Into<String>) -> Self {
        self.decline_reason = Some(reason.into());
        self
    }

    /// Number of times `charge` was invoked.
    pub async fn attempts(&self) -> usize {
        self.ledger.lock().await.attempts
    }

    /// Requests that were settled, in order.
    pub async fn settled(&self) -> Vec<ChargeRequest> {
        self.ledger.lock().await.settled.clone()
    }
}

#[async_trait]
impl PaymentExecutor for SimulatedPaymentExecutor {
    async fn charge(&self, request: &ChargeRequest) -> ChargeResult {
        self.ledger.lock().await.attempts += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(reason) = &self.decline_reason {
            return ChargeResult::Failed {
                reason: reason.clone(),
            };
        }
        if request.payment_method_reference.contains("declined") {
            return ChargeResult::Failed {
                reason: "Your card was declined".to_string(),
            };
        }

        let mut ledger = self.ledger.lock().await;
        if let Some(reference) = ledger.references.get(&request.idempotency_key) {
            return ChargeResult::Charged {
                reference: reference.clone(),
            };
        }
        let reference = format!("ch_sim_{:06}", ledger.settled.len() + 1);
        ledger
            .references
            .insert(request.idempotency_key.clone(), reference.clone());
        ledger.settled.push(request.clone());
        ChargeResult::Charged { reference }
    }
}
