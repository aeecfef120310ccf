//! Background task that releases reservations whose expiry time has passed.
//!
//! Each tick asks the store for due reservations (oldest first, bounded by
//! `batch_size`) and expires them through the allocator, so the release path
//! is the same one a user cancel takes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::allocator::ReservationAllocator;
use crate::domain::DomainResult;
use crate::shared::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    pub sweep_interval: Duration,
    pub batch_size: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
            batch_size: 500,
        }
    }
}

pub struct ExpiryScheduler {
    allocator: Arc<ReservationAllocator>,
    config: ExpiryConfig,
}

impl ExpiryScheduler {
    pub fn new(allocator: Arc<ReservationAllocator>) -> Self {
        Self {
            allocator,
            config: ExpiryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExpiryConfig) -> Self {
        self.config = config;
        self
    }

    /// Run a single sweep. Returns how many reservations this sweep released.
    pub async fn sweep(&self) -> DomainResult<usize> {
        sweep_once(&self.allocator, self.config.batch_size).await
    }

    /// Spawn the periodic sweep. The task exits when `shutdown` fires.
    pub fn start(&self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        let allocator = self.allocator.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            info!(
                sweep_interval_ms = config.sweep_interval.as_millis() as u64,
                batch_size = config.batch_size,
                "Reservation expiry task started"
            );

            let mut interval = tokio::time::interval(config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = sweep_once(&allocator, config.batch_size).await {
                            warn!(error = %e, "Reservation expiry sweep failed");
                        }
                    }
                    _ = shutdown.notified().wait() => {
                        info!("Reservation expiry task shutting down");
                        break;
                    }
                }
            }

            info!("Reservation expiry task stopped");
        })
    }
}

async fn sweep_once(allocator: &ReservationAllocator, batch_size: usize) -> DomainResult<usize> {
    let now = allocator.clock().now();
    let due = allocator.store().find_expired(now, batch_size).await?;

    if due.is_empty() {
        return Ok(0);
    }

    debug!(count = due.len(), "Expiring overdue reservations");

    let mut released = 0;
    for reservation in due {
        match allocator.expire(&reservation.id).await {
            Ok(true) => released += 1,
            // cancelled between the scan and the release
            Ok(false) => {}
            Err(e) => warn!(
                reservation_id = %reservation.id,
                error = %e,
                "Failed to expire reservation"
            ),
        }
    }

    if released > 0 {
        info!(released, "Expired overdue reservations");
    }

    Ok(released)
}
