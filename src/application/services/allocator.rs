//! Reservation allocator
//!
//! Owns every write to a location's `available` counter. The store decides
//! capacity inside the commit itself; the allocator only checks what the
//! commit cannot (input shape, category rules) and sends a `Conflict` from
//! a contended store round again through `retry_with_backoff`.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::domain::{
    DomainError, DomainResult, ParkingLocation, ReleaseOutcome, ReleaseReason, Reservation,
    ReservationStore, SpotCategory,
};
use crate::notifications::{
    Event, ReservationCreatedEvent, ReservationReleasedEvent, SharedEventBus,
};
use crate::shared::{retry_with_backoff, Clock, RetryConfig};

/// Tunables for the allocator
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    pub retry: RetryConfig,
    /// Longest reservation a user may hold
    pub max_duration: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_duration: Duration::hours(24),
        }
    }
}

/// Input to [`ReservationAllocator::reserve`]
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    /// Authenticated user, as supplied by the identity provider
    pub user_id: String,
    pub location_id: String,
    pub spot_category: SpotCategory,
    pub duration: Duration,
}

pub struct ReservationAllocator {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    config: AllocatorConfig,
    event_bus: Option<SharedEventBus>,
}

impl ReservationAllocator {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            config: AllocatorConfig::default(),
            event_bus: None,
        }
    }

    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Claim one spot at a location for `duration`.
    ///
    /// Errors: `Validation`, `NotFound`, `NoCapacity`, `AlreadyReserved`, or
    /// `Unavailable` once conflicts outlast the retry budget.
    pub async fn reserve(&self, request: ReserveRequest) -> DomainResult<Reservation> {
        self.validate(&request)?;

        let result = retry_with_backoff(
            &self.config.retry,
            || self.try_reserve(&request),
            DomainError::is_transient,
            "reserve",
        )
        .await;

        match result {
            Ok((reservation, location)) => {
                info!(
                    reservation_id = %reservation.id,
                    user_id = %reservation.user_id,
                    location_id = %location.id,
                    spot_category = %reservation.spot_category,
                    expires_at = %reservation.expires_at,
                    available = location.available,
                    "Reservation created"
                );
                metrics::counter!("reservations_created_total").increment(1);
                self.publish(Event::ReservationCreated(ReservationCreatedEvent {
                    reservation_id: reservation.id.clone(),
                    user_id: reservation.user_id.clone(),
                    location_id: location.id,
                    spot_category: reservation.spot_category,
                    expires_at: reservation.expires_at,
                    available: location.available,
                }));
                Ok(reservation)
            }
            Err(err) => {
                let err = self.exhausted(err, "reserve");
                debug!(
                    user_id = %request.user_id,
                    location_id = %request.location_id,
                    error = %err,
                    "Reservation rejected"
                );
                metrics::counter!("reservation_rejections_total", "reason" => err.kind())
                    .increment(1);
                Err(err)
            }
        }
    }

    /// User-initiated release. No-op if the reservation is already released.
    pub async fn cancel(&self, reservation_id: &str) -> DomainResult<()> {
        self.release(reservation_id, ReleaseReason::Cancelled)
            .await
            .map(|_| ())
    }

    /// Scheduler-initiated release, same effect as [`cancel`](Self::cancel).
    ///
    /// Returns whether this call was the one that released it.
    pub async fn expire(&self, reservation_id: &str) -> DomainResult<bool> {
        let outcome = self.release(reservation_id, ReleaseReason::Expired).await?;
        Ok(matches!(outcome, ReleaseOutcome::Released { .. }))
    }

    pub async fn get_active_reservation(&self, user_id: &str) -> DomainResult<Option<Reservation>> {
        self.store.find_active_for_user(user_id).await
    }

    fn validate(&self, request: &ReserveRequest) -> DomainResult<()> {
        if request.user_id.trim().is_empty() {
            return Err(DomainError::Validation("user id must not be empty".into()));
        }
        if request.location_id.trim().is_empty() {
            return Err(DomainError::Validation("location id must not be empty".into()));
        }
        if !request.spot_category.is_reservable() {
            return Err(DomainError::Validation(format!(
                "spot category {} cannot be reserved",
                request.spot_category
            )));
        }
        if request.duration <= Duration::zero() {
            return Err(DomainError::Validation("duration must be positive".into()));
        }
        if request.duration > self.config.max_duration {
            return Err(DomainError::Validation(format!(
                "duration must not exceed {} minutes",
                self.config.max_duration.num_minutes()
            )));
        }
        Ok(())
    }

    async fn try_reserve(
        &self,
        request: &ReserveRequest,
    ) -> DomainResult<(Reservation, ParkingLocation)> {
        let location = self
            .store
            .find_location(&request.location_id)
            .await?
            .ok_or_else(|| DomainError::location_not_found(&request.location_id))?;
        if !location.accepts(request.spot_category) {
            return Err(DomainError::Validation(format!(
                "location {} has no {} spots",
                location.id, request.spot_category
            )));
        }

        let reservation = Reservation::new(
            &request.user_id,
            &location.id,
            request.spot_category,
            self.clock.now(),
            request.duration,
        );

        match self.store.commit_reserve(&reservation).await {
            Ok(committed) => Ok((reservation, committed)),
            Err(err) => {
                if err.is_transient() {
                    metrics::counter!("reservation_conflicts_total").increment(1);
                }
                Err(err)
            }
        }
    }

    async fn release(
        &self,
        reservation_id: &str,
        reason: ReleaseReason,
    ) -> DomainResult<ReleaseOutcome> {
        let outcome = retry_with_backoff(
            &self.config.retry,
            || self.store.commit_release(reservation_id, self.clock.now(), reason),
            DomainError::is_transient,
            reason.as_str(),
        )
        .await
        .map_err(|err| self.exhausted(err, reason.as_str()))?;

        match &outcome {
            ReleaseOutcome::Released {
                reservation,
                location,
            } => {
                info!(
                    reservation_id = %reservation.id,
                    user_id = %reservation.user_id,
                    location_id = %location.id,
                    reason = %reason,
                    available = location.available,
                    "Reservation released"
                );
                metrics::counter!("reservations_released_total", "reason" => reason.as_str())
                    .increment(1);
                self.publish(Event::ReservationReleased(ReservationReleasedEvent {
                    reservation_id: reservation.id.clone(),
                    user_id: reservation.user_id.clone(),
                    location_id: location.id.clone(),
                    reason,
                    available: location.available,
                }));
            }
            ReleaseOutcome::AlreadyReleased(reservation) => {
                debug!(
                    reservation_id = %reservation.id,
                    reason = %reason,
                    "Reservation already released, nothing to do"
                );
            }
        }

        Ok(outcome)
    }

    /// A conflict that survived every retry becomes `Unavailable`.
    fn exhausted(&self, err: DomainError, operation: &str) -> DomainError {
        match err {
            DomainError::Conflict(msg) => {
                warn!(operation, error = %msg, "Giving up after repeated conflicts");
                DomainError::Unavailable(format!(
                    "{} did not commit after {} attempts: {}",
                    operation, self.config.retry.max_attempts, msg
                ))
            }
            other => other,
        }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinates, ReservationStatus};
    use crate::infrastructure::InMemoryReservationStore;
    use crate::notifications::EventBus;
    use crate::shared::ManualClock;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn location(id: &str, capacity: i32) -> ParkingLocation {
        ParkingLocation::new(
            id,
            format!("Lot {}", id),
            Coordinates {
                latitude: 43.8563,
                longitude: 18.4131,
            },
            capacity,
        )
    }

    fn fast_retry() -> AllocatorConfig {
        AllocatorConfig {
            retry: RetryConfig {
                max_attempts: 50,
                initial_delay: std::time::Duration::from_millis(1),
                backoff_multiplier: 1.5,
                max_delay: std::time::Duration::from_millis(5),
                jitter: 0.5,
            },
            ..AllocatorConfig::default()
        }
    }

    async fn setup(capacity: i32) -> (Arc<InMemoryReservationStore>, ReservationAllocator) {
        let store = Arc::new(InMemoryReservationStore::new());
        store.seed_location(location("P1", capacity)).await.unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let allocator = ReservationAllocator::new(store.clone(), clock).with_config(fast_retry());
        (store, allocator)
    }

    fn request(user: &str, location: &str) -> ReserveRequest {
        ReserveRequest {
            user_id: user.to_string(),
            location_id: location.to_string(),
            spot_category: SpotCategory::Regular,
            duration: Duration::minutes(10),
        }
    }

    async fn available(store: &InMemoryReservationStore, id: &str) -> i32 {
        store.find_location(id).await.unwrap().unwrap().available
    }

    #[tokio::test]
    async fn reserve_decrements_available() {
        let (store, allocator) = setup(3).await;
        let r = allocator.reserve(request("amra", "P1")).await.unwrap();
        assert_eq!(r.status, ReservationStatus::Active);
        assert_eq!(r.parking_location_id, "P1");
        assert_eq!(available(&store, "P1").await, 2);
        assert_eq!(
            allocator.get_active_reservation("amra").await.unwrap().map(|a| a.id),
            Some(r.id)
        );
    }

    #[tokio::test]
    async fn reserve_rejects_bad_durations() {
        let (_store, allocator) = setup(3).await;
        let mut req = request("amra", "P1");
        req.duration = Duration::zero();
        assert!(matches!(
            allocator.reserve(req.clone()).await,
            Err(DomainError::Validation(_))
        ));
        req.duration = Duration::days(2);
        assert!(matches!(
            allocator.reserve(req).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn reserve_unknown_location_is_not_found() {
        let (_store, allocator) = setup(3).await;
        let err = allocator.reserve(request("amra", "P404")).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "ParkingLocation", .. }));
    }

    #[tokio::test]
    async fn second_reservation_for_same_user_is_rejected() {
        let (store, allocator) = setup(3).await;
        store.seed_location(location("P2", 3)).await.unwrap();
        allocator.reserve(request("amra", "P1")).await.unwrap();

        let err = allocator.reserve(request("amra", "P2")).await.unwrap_err();
        assert_eq!(err, DomainError::AlreadyReserved("amra".into()));
        assert_eq!(available(&store, "P1").await, 2);
        assert_eq!(available(&store, "P2").await, 3);
    }

    #[tokio::test]
    async fn full_location_reports_no_capacity() {
        let (_store, allocator) = setup(1).await;
        allocator.reserve(request("amra", "P1")).await.unwrap();
        let err = allocator.reserve(request("haris", "P1")).await.unwrap_err();
        assert_eq!(err, DomainError::NoCapacity("P1".into()));
    }

    #[tokio::test]
    async fn reserved_in_use_category_is_rejected() {
        let (store, allocator) = setup(3).await;
        let mut req = request("amra", "P1");
        req.spot_category = SpotCategory::ReservedInUse;
        assert!(matches!(
            allocator.reserve(req).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(available(&store, "P1").await, 3);
    }

    #[tokio::test]
    async fn category_must_be_offered_when_location_lists_categories() {
        let (store, allocator) = setup(3).await;
        store
            .seed_location(
                location("P2", 3)
                    .with_category(SpotCategory::Regular, 2)
                    .with_category(SpotCategory::Motorcycle, 0),
            )
            .await
            .unwrap();

        let mut req = request("amra", "P2");
        req.spot_category = SpotCategory::ElectricVehicle;
        assert!(matches!(
            allocator.reserve(req.clone()).await,
            Err(DomainError::Validation(_))
        ));
        req.spot_category = SpotCategory::Motorcycle;
        assert!(matches!(
            allocator.reserve(req.clone()).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(available(&store, "P2").await, 3);

        req.spot_category = SpotCategory::Regular;
        allocator.reserve(req).await.unwrap();

        // P1 lists no categories, so any reservable one is accepted
        let mut any = request("haris", "P1");
        any.spot_category = SpotCategory::Accessible;
        allocator.reserve(any).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn spare_capacity_never_turns_racers_away() {
        let (store, allocator) = setup(100).await;
        let allocator = Arc::new(allocator.with_config(AllocatorConfig::default()));

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.reserve(request(&format!("u{}", i), "P1")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(available(&store, "P1").await, 60);
    }

    #[tokio::test]
    async fn cancel_and_expire_release_exactly_once() {
        let (store, allocator) = setup(2).await;
        let r = allocator.reserve(request("amra", "P1")).await.unwrap();
        assert_eq!(available(&store, "P1").await, 1);

        allocator.cancel(&r.id).await.unwrap();
        assert_eq!(available(&store, "P1").await, 2);

        allocator.cancel(&r.id).await.unwrap();
        assert!(!allocator.expire(&r.id).await.unwrap());
        assert_eq!(available(&store, "P1").await, 2);

        let stored = store.find_reservation(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Released);
        assert_eq!(stored.release_reason, Some(ReleaseReason::Cancelled));
        assert!(allocator.get_active_reservation("amra").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_unknown_reservation_is_not_found() {
        let (_store, allocator) = setup(1).await;
        let err = allocator.cancel("missing").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Reservation", .. }));
    }

    #[tokio::test]
    async fn three_users_fill_then_cancel_frees_one_for_fourth() {
        let (store, allocator) = setup(3).await;
        let first = allocator.reserve(request("u1", "P1")).await.unwrap();
        allocator.reserve(request("u2", "P1")).await.unwrap();
        allocator.reserve(request("u3", "P1")).await.unwrap();
        assert_eq!(available(&store, "P1").await, 0);

        allocator.cancel(&first.id).await.unwrap();
        assert_eq!(available(&store, "P1").await, 1);

        allocator.reserve(request("u4", "P1")).await.unwrap();
        assert_eq!(available(&store, "P1").await, 0);
    }

    #[tokio::test]
    async fn user_can_reserve_again_after_release() {
        let (_store, allocator) = setup(1).await;
        let r = allocator.reserve(request("amra", "P1")).await.unwrap();
        allocator.expire(&r.id).await.unwrap();
        allocator.reserve(request("amra", "P1")).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reserves_for_last_spot_yield_one_winner() {
        let (store, allocator) = setup(1).await;
        let allocator = Arc::new(allocator);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.reserve(request(&format!("u{}", i), "P1")).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(DomainError::NoCapacity(_)) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(available(&store, "P1").await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn available_stays_in_bounds_under_mixed_load() {
        let (store, allocator) = setup(3).await;
        let allocator = Arc::new(allocator);

        let handles: Vec<_> = (0..24)
            .map(|i| {
                let allocator = allocator.clone();
                tokio::spawn(async move {
                    let user = format!("u{}", i % 8);
                    if let Ok(r) = allocator.reserve(request(&user, "P1")).await {
                        if i % 2 == 0 {
                            let _ = allocator.cancel(&r.id).await;
                        } else {
                            let _ = allocator.expire(&r.id).await;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let loc = store.find_location("P1").await.unwrap().unwrap();
        assert_eq!(loc.available, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_cancel_and_expire_release_once() {
        let (store, allocator) = setup(1).await;
        let allocator = Arc::new(allocator);
        let r = allocator.reserve(request("amra", "P1")).await.unwrap();

        let a = {
            let allocator = allocator.clone();
            let id = r.id.clone();
            tokio::spawn(async move { allocator.cancel(&id).await })
        };
        let b = {
            let allocator = allocator.clone();
            let id = r.id.clone();
            tokio::spawn(async move { allocator.expire(&id).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(available(&store, "P1").await, 1);
    }

    #[tokio::test]
    async fn events_are_published_on_commit() {
        let store = Arc::new(InMemoryReservationStore::new());
        store.seed_location(location("P1", 1)).await.unwrap();
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe();
        let allocator = ReservationAllocator::new(store, Arc::new(ManualClock::new(Utc::now())))
            .with_event_bus(bus);

        let r = allocator.reserve(request("amra", "P1")).await.unwrap();
        allocator.cancel(&r.id).await.unwrap();
        allocator.cancel(&r.id).await.unwrap();

        let created = sub.recv().await.unwrap();
        assert_eq!(created.event.event_type(), "reservation_created");
        let released = sub.recv().await.unwrap();
        assert_eq!(released.event.event_type(), "reservation_released");
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), sub.recv())
            .await
            .is_err());
    }

    /// Store whose reserve commit always reports contention.
    struct ContendedStore {
        inner: InMemoryReservationStore,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ReservationStore for ContendedStore {
        async fn seed_location(&self, location: ParkingLocation) -> DomainResult<bool> {
            self.inner.seed_location(location).await
        }
        async fn find_location(&self, id: &str) -> DomainResult<Option<ParkingLocation>> {
            self.inner.find_location(id).await
        }
        async fn list_locations(&self) -> DomainResult<Vec<ParkingLocation>> {
            self.inner.list_locations().await
        }
        async fn find_reservation(&self, id: &str) -> DomainResult<Option<Reservation>> {
            self.inner.find_reservation(id).await
        }
        async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Reservation>> {
            self.inner.find_active_for_user(user_id).await
        }
        async fn find_expired(
            &self,
            now: DateTime<Utc>,
            limit: usize,
        ) -> DomainResult<Vec<Reservation>> {
            self.inner.find_expired(now, limit).await
        }
        async fn commit_reserve(&self, _reservation: &Reservation) -> DomainResult<ParkingLocation> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::Conflict("busy".into()))
        }
        async fn commit_release(
            &self,
            reservation_id: &str,
            released_at: DateTime<Utc>,
            reason: ReleaseReason,
        ) -> DomainResult<ReleaseOutcome> {
            self.inner.commit_release(reservation_id, released_at, reason).await
        }
    }

    #[tokio::test]
    async fn exhausted_conflicts_surface_as_unavailable() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryReservationStore::new(),
            attempts: AtomicU32::new(0),
        });
        store.seed_location(location("P1", 1)).await.unwrap();
        let mut config = fast_retry();
        config.retry.max_attempts = 4;
        let allocator = ReservationAllocator::new(store.clone(), Arc::new(ManualClock::new(Utc::now())))
            .with_config(config);

        let err = allocator.reserve(request("amra", "P1")).await.unwrap_err();
        assert!(matches!(err, DomainError::Unavailable(_)));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(store.find_location("P1").await.unwrap().unwrap().available, 1);
    }
}
