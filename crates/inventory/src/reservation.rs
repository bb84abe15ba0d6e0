//! The inventory reservation activity.

use std::time::Instant;

use async_trait::async_trait;
use state_store::{PutOptions, StateOperation, StateStore, StateStoreError, StateStoreExt, Version};

use crate::activity::{Activity, ActivityContext};
use crate::config::{ReservationConfig, WriteMode};
use crate::error::{ActivityError, ReservationError, Result};
use crate::model::{InventoryRecord, PaymentRequest, ReservationMarker, marker_key};

/// Name the activity is registered under.
pub const RESERVE_INVENTORY_ACTIVITY: &str = "ReserveInventoryActivity";

/// Checks that enough stock exists for a payment request and debits it.
///
/// In [`WriteMode::Optimistic`] the debit is conditioned on the version that
/// was read and committed together with a [`ReservationMarker`], so
/// concurrent reservations of the same item never oversell and a redelivered
/// request never debits twice.
pub struct ReserveInventoryActivity<S: StateStore> {
    store: S,
    config: ReservationConfig,
}

impl<S: StateStore> ReserveInventoryActivity<S> {
    /// Creates a new reservation activity backed by `store`.
    pub fn new(store: S, config: ReservationConfig) -> Self {
        Self { store, config }
    }

    /// Returns the activity configuration.
    pub fn config(&self) -> &ReservationConfig {
        &self.config
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserves `request.amount` units of `request.item_being_purchased`.
    ///
    /// Fails with `InsufficientInventory` without writing anything when the
    /// stock is too low, and with `StoreUnavailable` when the store cannot be
    /// reached or conflicts persist past the configured attempts.
    #[tracing::instrument(
        skip(self, request),
        fields(
            request_id = %request.request_id,
            item = %request.item_being_purchased,
            amount = request.amount,
        )
    )]
    pub async fn reserve(&self, request: &PaymentRequest) -> Result<()> {
        metrics::counter!("inventory_reservations_total").increment(1);
        let started = Instant::now();

        let result = self.run_reservation(request).await;

        metrics::histogram!("inventory_reservation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if let Err(ref e) = result {
            metrics::counter!("inventory_reservations_rejected_total", "reason" => e.reason())
                .increment(1);
        }
        result
    }

    async fn run_reservation(&self, request: &PaymentRequest) -> Result<()> {
        tracing::info!(
            write_mode = %self.config.write_mode,
            "inventory check started"
        );
        request.validate()?;

        if !self.config.processing_delay.is_zero() {
            tokio::time::sleep(self.config.processing_delay).await;
        }

        match self.config.write_mode {
            WriteMode::Optimistic => self.reserve_optimistic(request).await,
            WriteMode::Unconditional => self.reserve_unconditional(request).await,
        }
    }

    async fn reserve_optimistic(&self, request: &PaymentRequest) -> Result<()> {
        let attempts = self.config.attempts();
        let marker_at = marker_key(&request.request_id);

        for attempt in 1..=attempts {
            if let Some(marker) = self.load_marker(request, &marker_at).await? {
                return self.acknowledge_replay(request, marker);
            }

            let (record, version) = self.load_record(request).await?;
            let updated = self.debit(request, &record)?;
            let marker = ReservationMarker::new(request, updated.quantity);

            let operations = vec![
                StateOperation::upsert(
                    request.item_being_purchased.as_str(),
                    &updated,
                    PutOptions::expect_version(version),
                )
                .map_err(|e| self.store_fault(request, e))?,
                StateOperation::upsert(marker_at.as_str(), &marker, PutOptions::expect_new())
                    .map_err(|e| self.store_fault(request, e))?,
            ];

            match self.store.transact(operations).await {
                Ok(()) => {
                    tracing::info!(
                        remaining = updated.quantity,
                        attempt,
                        "inventory debited"
                    );
                    return Ok(());
                }
                Err(e) if e.is_conflict() => {
                    metrics::counter!("inventory_reservation_conflicts_total").increment(1);
                    tracing::debug!(attempt, error = %e, "version conflict, restarting cycle");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.backoff_after(attempt)).await;
                    }
                }
                Err(e) => return Err(self.store_fault(request, e)),
            }
        }

        tracing::warn!(attempts, "gave up after repeated version conflicts");
        Err(ReservationError::StoreUnavailable {
            request_id: request.request_id.clone(),
            reason: format!("version conflicts persisted after {attempts} attempts"),
        })
    }

    async fn reserve_unconditional(&self, request: &PaymentRequest) -> Result<()> {
        let (record, _) = self.load_record(request).await?;
        let updated = self.debit(request, &record)?;

        self.store
            .put_as(
                request.item_being_purchased.as_str(),
                &updated,
                PutOptions::new(),
            )
            .await
            .map_err(|e| self.store_fault(request, e))?;

        tracing::info!(remaining = updated.quantity, "inventory debited");
        Ok(())
    }

    async fn load_record(&self, request: &PaymentRequest) -> Result<(InventoryRecord, Version)> {
        let key = request.item_being_purchased.as_str();
        let entry = self
            .store
            .get(key)
            .await
            .map_err(|e| self.store_fault(request, e))?
            .ok_or_else(|| {
                tracing::warn!("item not found in inventory");
                ReservationError::UnknownItem {
                    request_id: request.request_id.clone(),
                    item: request.item_being_purchased.clone(),
                }
            })?;

        let record = entry
            .decode::<InventoryRecord>()
            .map_err(|source| ReservationError::CorruptRecord {
                key: key.to_string(),
                source,
            })?;
        Ok((record, entry.version))
    }

    async fn load_marker(
        &self,
        request: &PaymentRequest,
        key: &str,
    ) -> Result<Option<ReservationMarker>> {
        match self.store.get(key).await {
            Ok(Some(entry)) => entry
                .decode()
                .map(Some)
                .map_err(|source| ReservationError::CorruptRecord {
                    key: key.to_string(),
                    source,
                }),
            Ok(None) => Ok(None),
            Err(e) => Err(self.store_fault(request, e)),
        }
    }

    fn debit(&self, request: &PaymentRequest, record: &InventoryRecord) -> Result<InventoryRecord> {
        record.debit(request.amount).ok_or_else(|| {
            tracing::warn!(
                requested = request.amount,
                available = record.quantity,
                "insufficient inventory"
            );
            ReservationError::InsufficientInventory {
                request_id: request.request_id.clone(),
                item: request.item_being_purchased.clone(),
                requested: request.amount,
                available: record.quantity,
            }
        })
    }

    fn acknowledge_replay(&self, request: &PaymentRequest, marker: ReservationMarker) -> Result<()> {
        if !marker.matches(request) {
            tracing::warn!(
                previous_item = %marker.item,
                previous_amount = marker.amount,
                "request id reused for a different reservation"
            );
            return Err(ReservationError::RequestIdReused {
                request_id: request.request_id.clone(),
                previous_item: marker.item,
                previous_amount: marker.amount,
            });
        }

        metrics::counter!("inventory_reservation_replays_total").increment(1);
        tracing::info!(
            remaining = marker.remaining_quantity,
            reserved_at = %marker.reserved_at,
            "reservation already applied"
        );
        Ok(())
    }

    fn store_fault(&self, request: &PaymentRequest, err: StateStoreError) -> ReservationError {
        tracing::warn!(error = %err, transient = err.is_transient(), "state store call failed");
        ReservationError::StoreUnavailable {
            request_id: request.request_id.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl<S: StateStore + 'static> Activity for ReserveInventoryActivity<S> {
    type Input = PaymentRequest;
    type Output = ();

    const NAME: &'static str = RESERVE_INVENTORY_ACTIVITY;

    async fn run(
        &self,
        ctx: &ActivityContext,
        input: PaymentRequest,
    ) -> std::result::Result<(), ActivityError> {
        tracing::debug!(
            workflow_instance_id = %ctx.workflow_instance_id,
            attempt = ctx.attempt,
            "running activity"
        );
        self.reserve(&input).await.map_err(ActivityError::from)
    }
}

impl From<ReservationError> for ActivityError {
    fn from(err: ReservationError) -> Self {
        if err.is_retryable() {
            ActivityError::retryable(RESERVE_INVENTORY_ACTIVITY, err.to_string())
        } else {
            ActivityError::terminal(RESERVE_INVENTORY_ACTIVITY, err.to_string())
        }
    }
}
