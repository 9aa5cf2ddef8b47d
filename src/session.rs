//! Session/Profile store: the single source of truth for "who is acting now".
//!
//! Owns the bearer credentials, the account record, the set of linked
//! patient profiles and the active-profile pointer. Everything is
//! persisted through a `KeyValueStore` so it survives restarts; the
//! active profile is additionally published on a `watch` channel so list
//! loaders can react to a switch without polling.
//!
//! Lifecycle:
//! `LoggedOut → (OTP verified) → LoggedIn(no profile) → (bootstrap or
//! select) → LoggedIn(active=P) → (select Q) → LoggedIn(active=Q) →
//! (logout / refresh failure) → LoggedOut`.

use std::fmt;
use std::future::Future;

use tokio::sync::watch;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ClientError;
use crate::models::{PatientProfile, ProfileId, ProfileListing, User};
use crate::storage::{self, KeyValueStore, MemoryStore, StorageError};

/// Persistence keys.
pub mod keys {
    pub const TOKEN: &str = "auth.token";
    pub const REFRESH_TOKEN: &str = "auth.refresh_token";
    pub const USER: &str = "auth.user";
    pub const PROFILES: &str = "patient.profiles";
    pub const ACTIVE_PROFILE: &str = "patient.active_profile";

    /// Every key the session owns; cleared together on logout.
    pub const ALL: &[&str] = &[TOKEN, REFRESH_TOKEN, USER, PROFILES, ACTIVE_PROFILE];
}

// ═══════════════════════════════════════════════════════════
// Credentials — zeroed on drop
// ═══════════════════════════════════════════════════════════

/// Bearer credentials. Zeroed on drop; never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    /// Logged in; `active` is `None` until a profile is selected, which
    /// screens treat as "prompt for a profile", not as an error.
    LoggedIn { active: Option<ProfileId> },
}

/// Result of `bootstrap_profiles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileBootstrap {
    pub profiles: Vec<PatientProfile>,
    pub default_profile: Option<PatientProfile>,
    /// Profile left active: the preferred one when still linked, else
    /// `default_profile`.
    pub active: Option<PatientProfile>,
}

/// Source of the account's linked patient profiles.
///
/// Implemented by `ApiClient` (`GET /api/auth/patient-profiles`).
pub trait ProfileDirectory: Send + Sync {
    fn fetch_patient_profiles(
        &self,
    ) -> impl Future<Output = Result<ProfileListing, ClientError>> + Send;
}

// ═══════════════════════════════════════════════════════════
// SessionStore
// ═══════════════════════════════════════════════════════════

pub struct SessionStore {
    kv: Box<dyn KeyValueStore>,
    active_tx: watch::Sender<Option<PatientProfile>>,
}

impl SessionStore {
    /// Open a store over persisted state, seeding the active-profile
    /// channel from what was saved last run.
    ///
    /// An unreadable active-profile entry is dropped rather than failing
    /// startup: the user is simply asked to pick a profile again.
    pub fn open(kv: impl KeyValueStore + 'static) -> Result<Self, StorageError> {
        let active = match storage::get_json::<PatientProfile>(&kv, keys::ACTIVE_PROFILE) {
            Ok(active) => active,
            Err(StorageError::Corrupt { key, source }) => {
                tracing::warn!(key = %key, error = %source, "Discarding corrupt active profile");
                kv.remove(keys::ACTIVE_PROFILE)?;
                None
            }
            Err(e) => return Err(e),
        };

        let (active_tx, _) = watch::channel(active);
        Ok(Self {
            kv: Box::new(kv),
            active_tx,
        })
    }

    /// Ephemeral store with nothing persisted.
    pub fn in_memory() -> Self {
        let (active_tx, _) = watch::channel(None);
        Self {
            kv: Box::new(MemoryStore::new()),
            active_tx,
        }
    }

    // ── Credentials ─────────────────────────────────────────

    /// Current access token, if any.
    pub fn token(&self) -> Result<Option<String>, StorageError> {
        self.kv.get(keys::TOKEN)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.kv.get(keys::REFRESH_TOKEN)
    }

    pub fn credentials(&self) -> Result<Option<Credentials>, StorageError> {
        let Some(access_token) = self.token()? else {
            return Ok(None);
        };
        Ok(Some(Credentials {
            access_token,
            refresh_token: self.refresh_token()?,
        }))
    }

    pub fn save_token(&self, token: &str) -> Result<(), StorageError> {
        self.kv.set(keys::TOKEN, token)
    }

    pub fn save_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        self.kv.set(keys::REFRESH_TOKEN, token)
    }

    // ── Account record ──────────────────────────────────────

    pub fn save_user(&self, user: &User) -> Result<(), StorageError> {
        storage::set_json(self.kv.as_ref(), keys::USER, user)
    }

    pub fn user(&self) -> Result<Option<User>, StorageError> {
        storage::get_json(self.kv.as_ref(), keys::USER)
    }

    // ── Profiles ────────────────────────────────────────────

    /// Linked profiles in server order. Empty before bootstrap.
    pub fn profiles(&self) -> Result<Vec<PatientProfile>, StorageError> {
        Ok(storage::get_json(self.kv.as_ref(), keys::PROFILES)?.unwrap_or_default())
    }

    /// Fetch the linked profiles, replace the stored set and select the
    /// default (server-declared, else first).
    ///
    /// Requires an access token. Zero profiles is a valid outcome and
    /// leaves no active profile.
    pub async fn bootstrap_profiles<D: ProfileDirectory>(
        &self,
        directory: &D,
    ) -> Result<ProfileBootstrap, ClientError> {
        self.bootstrap_profiles_preferring(directory, None).await
    }

    /// Like `bootstrap_profiles`, but keeps `preferred` active when the
    /// fresh listing still contains it. Subscribers see a single update.
    pub async fn bootstrap_profiles_preferring<D: ProfileDirectory>(
        &self,
        directory: &D,
        preferred: Option<&ProfileId>,
    ) -> Result<ProfileBootstrap, ClientError> {
        if self.token()?.is_none() {
            return Err(ClientError::Auth("no access token".into()));
        }

        let listing = directory.fetch_patient_profiles().await?;
        let default_profile = listing.default_profile().cloned();
        let active = preferred
            .and_then(|id| listing.profiles.iter().find(|p| &p.id == id))
            .cloned()
            .or_else(|| default_profile.clone());

        storage::set_json(self.kv.as_ref(), keys::PROFILES, &listing.profiles)?;
        self.persist_active(active.as_ref())?;

        tracing::info!(
            count = listing.profiles.len(),
            default = ?default_profile.as_ref().map(|p| p.id.as_str()),
            active = ?active.as_ref().map(|p| p.id.as_str()),
            "Patient profiles bootstrapped"
        );

        Ok(ProfileBootstrap {
            profiles: listing.profiles,
            default_profile,
            active,
        })
    }

    // ── Active profile ──────────────────────────────────────

    /// Persisted active profile, if one is selected.
    pub fn active_profile(&self) -> Result<Option<PatientProfile>, StorageError> {
        storage::get_json(self.kv.as_ref(), keys::ACTIVE_PROFILE)
    }

    /// Switch (or clear, with `None`) the active profile and notify
    /// subscribers.
    ///
    /// The profile must belong to the stored set; the stored copy is what
    /// gets persisted.
    pub fn set_active_profile(&self, profile: Option<&PatientProfile>) -> Result<(), ClientError> {
        let selected = match profile {
            None => None,
            Some(wanted) => {
                let member = self
                    .profiles()?
                    .into_iter()
                    .find(|p| p.id == wanted.id)
                    .ok_or_else(|| ClientError::UnknownProfile(wanted.id.clone()))?;
                Some(member)
            }
        };

        self.persist_active(selected.as_ref())?;
        tracing::info!(
            profile = ?selected.as_ref().map(|p| p.id.as_str()),
            "Active profile changed"
        );
        Ok(())
    }

    /// Watch the active profile. The current value is available
    /// immediately; `changed()` resolves on every switch.
    pub fn subscribe(&self) -> watch::Receiver<Option<PatientProfile>> {
        self.active_tx.subscribe()
    }

    fn persist_active(&self, profile: Option<&PatientProfile>) -> Result<(), StorageError> {
        match profile {
            Some(p) => storage::set_json(self.kv.as_ref(), keys::ACTIVE_PROFILE, p)?,
            None => self.kv.remove(keys::ACTIVE_PROFILE)?,
        }
        self.active_tx.send_replace(profile.cloned());
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────

    pub fn state(&self) -> Result<SessionState, StorageError> {
        if self.token()?.is_none() {
            return Ok(SessionState::LoggedOut);
        }
        Ok(SessionState::LoggedIn {
            active: self.active_profile()?.map(|p| p.id),
        })
    }

    /// Clear credentials, user, profiles and active profile in one
    /// storage transaction.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.kv.remove_many(keys::ALL)?;
        self.active_tx.send_replace(None);
        tracing::info!("Session cleared");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
