//! Credential Store: the only mutable state shared between refreshers and readers.
//!
//! The store holds at most one [`Credential`]. Readers take cheap snapshots, writers replace
//! the whole `(access_token, expires_at)` pair under a write lock, so a token is never observed
//! next to the wrong expiry. An empty store is the "never fetched" state and always reports
//! itself as expiring.

// self
use crate::{
	_prelude::*,
	auth::{Credential, ExpiryState},
};

/// Thread-safe single-slot credential store.
#[derive(Debug, Default)]
pub struct CredentialStore(RwLock<Option<Credential>>);
impl CredentialStore {
	/// Creates a store that already holds `credential`.
	pub fn seeded(credential: Credential) -> Self {
		Self(RwLock::new(Some(credential)))
	}

	/// Classifies the stored credential at `now`.
	pub fn expiry_at(&self, now: OffsetDateTime) -> ExpiryState {
		ExpiryState::of(self.0.read().as_ref(), now)
	}

	/// Returns `true` if nothing was ever stored or `now` reached the stored expiry.
	pub fn is_expiring_at(&self, now: OffsetDateTime) -> bool {
		self.expiry_at(now).is_expiring()
	}

	/// Same as [`is_expiring_at`](Self::is_expiring_at) against the current UTC clock.
	pub fn is_expiring(&self) -> bool {
		self.is_expiring_at(OffsetDateTime::now_utc())
	}

	/// Returns the stored credential only if it is still valid at `now`.
	///
	/// The check and the copy happen under the same read lock.
	pub fn valid_at(&self, now: OffsetDateTime) -> Option<Credential> {
		self.0.read().as_ref().filter(|credential| !credential.is_expired_at(now)).cloned()
	}

	/// Atomically replaces the stored pair and returns the previous one.
	pub fn set(&self, credential: Credential) -> Option<Credential> {
		self.0.write().replace(credential)
	}

	/// Latest snapshot, if any credential was ever stored.
	pub fn current(&self) -> Option<Credential> {
		self.0.read().clone()
	}

	/// Returns the store to the never-fetched state.
	pub fn clear(&self) -> Option<Credential> {
		self.0.write().take()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::thread;
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn empty_store_is_expiring() {
		let store = CredentialStore::default();

		assert!(store.is_expiring());
		assert_eq!(store.expiry_at(OffsetDateTime::UNIX_EPOCH), ExpiryState::Unset);
		assert!(store.current().is_none());
	}

	#[test]
	fn expiry_boundary_has_no_grace_margin() {
		let expires = macros::datetime!(2025-01-01 00:00 UTC);
		let store = CredentialStore::seeded(Credential::new("tok", expires));

		assert!(!store.is_expiring_at(expires - Duration::seconds(1)));
		assert!(store.is_expiring_at(expires));
		assert!(store.valid_at(expires - Duration::seconds(1)).is_some());
		assert!(store.valid_at(expires).is_none());
	}

	#[test]
	fn set_replaces_pair_and_clear_resets() {
		let store = CredentialStore::default();
		let first = Credential::new("first", macros::datetime!(2025-01-01 00:00 UTC));
		let second = Credential::new("second", macros::datetime!(2025-01-01 01:00 UTC));

		assert_eq!(store.set(first.clone()), None);
		assert_eq!(store.set(second.clone()), Some(first));
		assert_eq!(store.current(), Some(second.clone()));
		assert_eq!(store.clear(), Some(second));
		assert!(store.is_expiring());
	}

	#[test]
	fn concurrent_writers_never_tear_the_pair() {
		let store = Arc::new(CredentialStore::default());
		let base = macros::datetime!(2025-01-01 00:00 UTC);
		let writers = (0..8_i64)
			.map(|idx| {
				let store = Arc::clone(&store);

				thread::spawn(move || {
					for _ in 0..200 {
						store.set(Credential::new(
							format!("tok-{idx}"),
							base + Duration::seconds(idx),
						));
					}
				})
			})
			.collect::<Vec<_>>();

		for _ in 0..500 {
			if let Some(snapshot) = store.current() {
				let idx: i64 = snapshot
					.access_token
					.expose()
					.trim_start_matches("tok-")
					.parse()
					.expect("Token suffix should be numeric.");

				assert_eq!(snapshot.expires_at, base + Duration::seconds(idx));
			}
		}
		for writer in writers {
			writer.join().expect("Writer thread should not panic.");
		}
	}
}
