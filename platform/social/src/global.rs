use std::sync::Arc;

use crate::config::AppConfig;
use crate::service::{BlockFilter, FollowDirectory, NotificationLedger, ReviewEdges, UserDirectory};
use crate::store::{MemoryStore, PgStore, Store, StoreResult};
use crate::verification::{EmailVerifications, MemoryEmailVerifications, PgEmailVerifications};

/// Every service wired to one store.
pub struct GlobalState<S, V> {
	pub config: AppConfig,
	pub store: Arc<S>,

	pub users: UserDirectory<S, V>,
	pub follows: FollowDirectory<S>,
	pub blocks: BlockFilter<S>,
	pub notifications: NotificationLedger<S>,
	pub reviews: ReviewEdges<S>,
}

impl<S: Store, V: EmailVerifications> GlobalState<S, V> {
	pub fn new(config: AppConfig, store: Arc<S>, verifications: Arc<V>) -> Self {
		Self {
			users: UserDirectory::new(store.clone(), verifications, config.registration.verification_ttl()),
			follows: FollowDirectory::new(store.clone()),
			blocks: BlockFilter::new(store.clone()),
			notifications: NotificationLedger::new(store.clone()),
			reviews: ReviewEdges::new(store.clone()),
			store,
			config,
		}
	}
}

impl GlobalState<PgStore, PgEmailVerifications> {
	pub async fn connect(config: AppConfig) -> StoreResult<Self> {
		let store = PgStore::connect(&config.database).await?;
		let verifications = PgEmailVerifications::new(store.db().clone());

		Ok(Self::new(config, Arc::new(store), Arc::new(verifications)))
	}
}

impl GlobalState<MemoryStore, MemoryEmailVerifications> {
	/// In-process state, returns the verification store so callers can seed it.
	pub fn in_memory(config: AppConfig) -> (Self, MemoryEmailVerifications) {
		let verifications = MemoryEmailVerifications::new();
		let global = Self::new(config, Arc::new(MemoryStore::new()), Arc::new(verifications.clone()));

		(global, verifications)
	}
}
