pub mod api;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod otp;
pub mod seo;
pub mod session;
pub mod storage;

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use api::{ApiClient, ResourceFeed};
use config::ClientConfig;
use error::ClientError;
use loader::PaginatedLoader;
use models::ProfileId;
use otp::{OtpFlow, OtpStep};
use session::{SessionState, SessionStore};
use storage::SqliteStore;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Session store persisted under the configured data directory, plus an
/// API client bound to it.
pub fn connect(config: &ClientConfig) -> Result<(Arc<SessionStore>, Arc<ApiClient>), ClientError> {
    let kv = SqliteStore::open(&config.session_db_path())?;
    let session = Arc::new(SessionStore::open(kv)?);
    let client = Arc::new(ApiClient::new(config, session.clone())?);
    Ok((session, client))
}

/// Counts from one `sync` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub profile: Option<ProfileId>,
    pub profiles: usize,
    pub appointments: usize,
    pub bills: usize,
    pub prescriptions: usize,
}

/// Refresh the linked profiles and load the first page of every list
/// for the active profile.
///
/// A profile the user picked earlier stays active as long as the backend
/// still lists it; otherwise the backend default takes over.
pub async fn sync(session: &Arc<SessionStore>, client: &Arc<ApiClient>, page_size: u32) -> Result<SyncReport, ClientError> {
    if session.state()? == SessionState::LoggedOut {
        return Err(ClientError::Auth("not logged in".into()));
    }

    let previous = session.active_profile()?.map(|p| p.id);
    let boot = session
        .bootstrap_profiles_preferring(client.as_ref(), previous.as_ref())
        .await?;

    let Some(active) = boot.active else {
        tracing::info!(profiles = boot.profiles.len(), "No patient profile linked to this account");
        return Ok(SyncReport {
            profiles: boot.profiles.len(),
            ..SyncReport::default()
        });
    };

    let appointments =
        PaginatedLoader::with_page_size(ResourceFeed::appointments(client.clone()), session.clone(), page_size);
    let bills = PaginatedLoader::with_page_size(ResourceFeed::bills(client.clone()), session.clone(), page_size);
    let prescriptions =
        PaginatedLoader::with_page_size(ResourceFeed::prescriptions(client.clone()), session.clone(), page_size);

    let outcomes = tokio::join!(
        appointments.load_page(1),
        bills.load_page(1),
        prescriptions.load_page(1),
    );
    tracing::debug!(?outcomes, "First pages loaded");

    let report = SyncReport {
        profile: Some(active.id),
        profiles: boot.profiles.len(),
        appointments: appointments.state().items.len(),
        bills: bills.state().items.len(),
        prescriptions: prescriptions.state().items.len(),
    };
    tracing::info!(
        profile = ?report.profile.as_ref().map(ProfileId::as_str),
        appointments = report.appointments,
        bills = report.bills,
        prescriptions = report.prescriptions,
        "Sync complete"
    );
    Ok(report)
}

/// Request an OTP for `mobile`, read the code with `read_code`, and
/// verify it once.
pub async fn login<F, Fut>(client: &ApiClient, mobile: &str, read_code: F) -> Result<OtpStep, ClientError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<String, ClientError>>,
{
    let mut flow = OtpFlow::new(client, mobile)?;
    flow.send_code().await?;
    let code = read_code().await?;
    flow.paste(&code).await
}

/// Select the linked profile with `id` as the active one.
pub fn use_profile(session: &SessionStore, id: &str) -> Result<(), ClientError> {
    let id = ProfileId::new(id);
    let profile = session
        .profiles()?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or(ClientError::UnknownProfile(id))?;
    session.set_active_profile(Some(&profile))
}

pub fn prerender(template: &Path, routes: &Path, out_dir: &Path) -> Result<usize, seo::SeoError> {
    Ok(seo::prerender(template, routes, out_dir)?.len())
}
