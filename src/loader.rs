//! Paginated resource loader.
//!
//! One loader backs one list screen. It accumulates pages of a single
//! resource for whichever patient profile is active when a load starts:
//! page 1 replaces the list, later pages append.
//!
//! Concurrency follows the screen model:
//! - `on_end_reached` is guarded by `is_loading_more`, checked and set
//!   under the state lock.
//! - A refresh (`load_page(1)`) does not cancel an outstanding page
//!   request. Both results apply in completion order, so a late page 2
//!   can still append after a refresh.
//! - A change of active profile starts a new scope. Responses from an
//!   older scope are dropped.
//! - After `unmount` every response is dropped. In-flight requests are
//!   not aborted.
//!
//! Fetch failures never reach the caller as errors: the list stays as it
//! was, flags reset, and the failure is logged.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::api::ResourceKind;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::ClientError;
use crate::models::{Page, ProfileId};
use crate::session::SessionStore;

/// Where pages come from. Implemented by `ResourceFeed` over HTTP.
pub trait PageSource: Send + Sync {
    type Item: Clone + Send + Sync + 'static;

    fn kind(&self) -> ResourceKind;

    fn fetch_page(
        &self,
        patient_id: &ProfileId,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Page<Self::Item>, ClientError>> + Send;
}

/// Snapshot of a list screen's state.
///
/// `current_page == 0` means nothing has been loaded in this scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub is_loading_initial: bool,
    pub is_loading_more: bool,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current_page: 0,
            total_pages: 0,
            is_loading_initial: false,
            is_loading_more: false,
        }
    }
}

impl<T> ListState<T> {
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading_initial || self.is_loading_more
    }
}

/// What a load attempt did. Screens can ignore it; tests rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was applied to the list.
    Loaded { page: u32, count: usize },
    /// No profile is selected; the list was cleared.
    NoActiveProfile,
    /// A load was already running; nothing was requested.
    Busy,
    /// The last known page is already loaded.
    Exhausted,
    /// The loader was unmounted before or during the request.
    Unmounted,
    /// The active profile changed while the request was in flight.
    Stale,
    /// The fetch failed. Logged and swallowed.
    Failed,
}

struct LoaderState<T> {
    list: ListState<T>,
    bound_profile: Option<ProfileId>,
    /// Bumped on every scope reset; responses carry the value they
    /// started with.
    generation: u64,
    mounted: bool,
}

impl<T> LoaderState<T> {
    fn rebind(&mut self, profile: Option<ProfileId>) {
        self.list = ListState::default();
        self.bound_profile = profile;
        self.generation += 1;
    }

    fn clear_flag(&mut self, page: u32) {
        if page == 1 {
            self.list.is_loading_initial = false;
        } else {
            self.list.is_loading_more = false;
        }
    }
}

pub struct PaginatedLoader<S: PageSource> {
    source: S,
    session: Arc<SessionStore>,
    page_size: u32,
    state: Mutex<LoaderState<S::Item>>,
}

impl<S: PageSource> PaginatedLoader<S> {
    pub fn new(source: S, session: Arc<SessionStore>) -> Self {
        Self::with_page_size(source, session, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(source: S, session: Arc<SessionStore>, page_size: u32) -> Self {
        Self {
            source,
            session,
            page_size: page_size.max(1),
            state: Mutex::new(LoaderState {
                list: ListState::default(),
                bound_profile: None,
                generation: 0,
                mounted: true,
            }),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.source.kind()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Copy of the current list state.
    pub fn state(&self) -> ListState<S::Item> {
        self.lock().list.clone()
    }

    /// Profile the list currently belongs to.
    pub fn bound_profile(&self) -> Option<ProfileId> {
        self.lock().bound_profile.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState<S::Item>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `page` for the profile active right now.
    pub async fn load_page(&self, page: u32) -> LoadOutcome {
        let mut page = page.max(1);
        let kind = self.source.kind().as_str();

        let active = match self.session.active_profile() {
            Ok(active) => active.map(|p| p.id),
            Err(e) => {
                tracing::warn!(resource = kind, page, error = %e, "Could not read active profile");
                self.lock().clear_flag(page);
                return LoadOutcome::Failed;
            }
        };

        let (patient_id, generation) = {
            let mut state = self.lock();
            if !state.mounted {
                return LoadOutcome::Unmounted;
            }
            let Some(patient_id) = active else {
                if state.bound_profile.is_some() || !state.list.items.is_empty() {
                    state.rebind(None);
                }
                state.list.is_loading_initial = false;
                state.list.is_loading_more = false;
                return LoadOutcome::NoActiveProfile;
            };
            if state.bound_profile.as_ref() != Some(&patient_id) {
                tracing::debug!(resource = kind, profile = %patient_id, "Loader rebound to new profile");
                state.rebind(Some(patient_id.clone()));
                // A new scope always starts from its first page.
                page = 1;
            }
            if page == 1 {
                state.list.is_loading_initial = true;
            } else {
                state.list.is_loading_more = true;
            }
            (patient_id, state.generation)
        };

        let result = self
            .source
            .fetch_page(&patient_id, page, self.page_size)
            .await;

        let mut state = self.lock();
        if !state.mounted {
            return LoadOutcome::Unmounted;
        }
        if state.generation != generation {
            tracing::debug!(resource = kind, page, profile = %patient_id, "Dropping response from previous profile");
            return LoadOutcome::Stale;
        }
        state.clear_flag(page);

        match result {
            Ok(fetched) => {
                let count = fetched.items.len();
                if page == 1 {
                    state.list.items = fetched.items;
                } else {
                    state.list.items.extend(fetched.items);
                }
                state.list.current_page = fetched.page_number;
                state.list.total_pages = fetched.total_pages;
                tracing::debug!(
                    resource = kind,
                    page,
                    count,
                    total_pages = fetched.total_pages,
                    "Page loaded"
                );
                LoadOutcome::Loaded { page, count }
            }
            Err(e) => {
                tracing::warn!(resource = kind, page, profile = %patient_id, error = %e, "Page load failed");
                LoadOutcome::Failed
            }
        }
    }

    /// Reload from page 1. Outstanding page requests are left to finish.
    pub async fn refresh(&self) -> LoadOutcome {
        self.load_page(1).await
    }

    /// Scroll-threshold trigger: load the next page unless a load is
    /// running or the last page is already here.
    pub async fn on_end_reached(&self) -> LoadOutcome {
        let next = {
            let mut state = self.lock();
            if !state.mounted {
                return LoadOutcome::Unmounted;
            }
            if state.list.is_loading() {
                return LoadOutcome::Busy;
            }
            if !state.list.has_more() {
                return LoadOutcome::Exhausted;
            }
            state.list.is_loading_more = true;
            state.list.current_page + 1
        };
        self.load_page(next).await
    }

    /// Empty the list and start a new scope. Responses already in flight
    /// are dropped when they land.
    pub fn reset(&self) {
        let mut state = self.lock();
        let bound = state.bound_profile.take();
        state.rebind(bound);
    }

    /// Stop applying responses. The list is kept as it was.
    pub fn unmount(&self) {
        self.lock().mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }
}

impl<S> PaginatedLoader<S>
where
    S: PageSource + 'static,
{
    /// Reload page 1 every time the active profile changes, and clear the
    /// list when it is unset. Ends once the loader is unmounted and the
    /// next change arrives, or when the store is dropped.
    pub fn follow_active_profile(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.session.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let profile = rx.borrow_and_update().as_ref().map(|p| p.id.clone());
                if !self.is_mounted() {
                    break;
                }
                tracing::debug!(
                    resource = self.source.kind().as_str(),
                    profile = ?profile.as_ref().map(ProfileId::as_str),
                    "Active profile changed, reloading"
                );
                {
                    let mut state = self.lock();
                    state.rebind(profile);
                }
                self.load_page(1).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientProfile, ProfileListing};
    use crate::session::ProfileDirectory;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    // ── Fakes ───────────────────────────────────────────────

    struct FakeSource {
        calls: Mutex<Vec<(ProfileId, u32)>>,
        total_pages: AtomicU32,
        fail: AtomicBool,
        /// Holds back the next request for the given page until notified.
        gate: Mutex<Option<(u32, Arc<Notify>)>>,
    }

    impl FakeSource {
        fn new(total_pages: u32) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                total_pages: AtomicU32::new(total_pages),
                fail: AtomicBool::new(false),
                gate: Mutex::new(None),
            }
        }

        fn hold(&self, page: u32) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            *self.gate.lock().unwrap() = Some((page, notify.clone()));
            notify
        }

        fn calls(&self) -> Vec<(ProfileId, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PageSource for Arc<FakeSource> {
        type Item = String;

        fn kind(&self) -> ResourceKind {
            ResourceKind::Appointments
        }

        async fn fetch_page(
            &self,
            patient_id: &ProfileId,
            page: u32,
            _limit: u32,
        ) -> Result<Page<String>, ClientError> {
            let call_no = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((patient_id.clone(), page));
                calls.len()
            };

            let gate = {
                let mut gate = self.gate.lock().unwrap();
                if gate.as_ref().is_some_and(|(held, _)| *held == page) {
                    gate.take().map(|(_, n)| n)
                } else {
                    None
                }
            };
            if let Some(notify) = gate {
                notify.notified().await;
            }

            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Network);
            }
            let n = DEFAULT_PAGE_SIZE;
            Ok(Page {
                items: (0..n).map(|i| format!("{patient_id}/p{page}/c{call_no}/{i}")).collect(),
                page_number: page,
                total_pages: self.total_pages.load(Ordering::SeqCst),
            })
        }
    }

    struct Directory(ProfileListing);

    impl ProfileDirectory for Directory {
        async fn fetch_patient_profiles(&self) -> Result<ProfileListing, ClientError> {
            Ok(self.0.clone())
        }
    }

    fn profile(id: u64) -> PatientProfile {
        PatientProfile {
            id: ProfileId::from(id),
            name: format!("Patient {id}"),
            clinic_id: None,
            clinic_name: None,
            display_id: None,
        }
    }

    /// Logged-in session with profiles 1 and 2; profile 1 active.
    async fn session() -> Arc<SessionStore> {
        let session = SessionStore::in_memory();
        session.save_token("t").unwrap();
        let listing = ProfileListing {
            profiles: vec![profile(1), profile(2)],
            default_profile_id: None,
        };
        session.bootstrap_profiles(&Directory(listing)).await.unwrap();
        Arc::new(session)
    }

    fn loader(source: &Arc<FakeSource>, session: &Arc<SessionStore>) -> Arc<PaginatedLoader<Arc<FakeSource>>> {
        Arc::new(PaginatedLoader::new(source.clone(), session.clone()))
    }

    async fn wait_for_calls(source: &FakeSource, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while source.calls.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("request was never issued");
    }

    // ── Replace / append ────────────────────────────────────

    #[tokio::test]
    async fn first_page_replaces_list_each_time() {
        let source = Arc::new(FakeSource::new(3));
        let session = session().await;
        let loader = loader(&source, &session);

        loader.load_page(1).await;
        let outcome = loader.load_page(1).await;

        let state = loader.state();
        assert_eq!(outcome, LoadOutcome::Loaded { page: 1, count: 10 });
        assert_eq!(state.items.len(), 10);
        assert!(state.items.iter().all(|i| i.contains("/c2/")), "latest response only");
        assert_eq!(state.current_page, 1);
        assert!(!state.is_loading_initial);
    }

    #[tokio::test]
    async fn later_pages_append_without_dedup() {
        let source = Arc::new(FakeSource::new(3));
        let session = session().await;
        let loader = loader(&source, &session);

        loader.load_page(1).await;
        let first = loader.state().items;
        loader.load_page(2).await;

        let state = loader.state();
        assert_eq!(state.items.len(), 20);
        assert_eq!(state.items[..10], first[..]);
        assert_eq!(state.current_page, 2);
        assert_eq!(state.total_pages, 3);
        assert!(state.has_more());
    }

    #[tokio::test]
    async fn load_after_switch_is_scoped_to_new_profile() {
        let source = Arc::new(FakeSource::new(1));
        let session = session().await;
        let loader = loader(&source, &session);

        loader.load_page(1).await;
        session.set_active_profile(Some(&profile(2))).unwrap();
        loader.load_page(1).await;

        let calls = source.calls();
        assert_eq!(calls[0].0, ProfileId::from(1));
        assert_eq!(calls[1].0, ProfileId::from(2));
        assert!(loader.state().items.iter().all(|i| i.starts_with("2/")));
        assert_eq!(loader.bound_profile(), Some(ProfileId::from(2)));
    }

    #[tokio::test]
    async fn next_page_after_switch_restarts_at_first_page() {
        let source = Arc::new(FakeSource::new(3));
        let session = session().await;
        let loader = loader(&source, &session);
        loader.load_page(1).await;

        session.set_active_profile(Some(&profile(2))).unwrap();
        let outcome = loader.on_end_reached().await;

        assert_eq!(outcome, LoadOutcome::Loaded { page: 1, count: 10 });
        assert_eq!(source.calls()[1], (ProfileId::from(2), 1));
        assert_eq!(loader.state().items.len(), 10);
    }

    #[tokio::test]
    async fn no_active_profile_clears_without_request() {
        let source = Arc::new(FakeSource::new(1));
        let session = session().await;
        let loader = loader(&source, &session);
        loader.load_page(1).await;

        session.set_active_profile(None).unwrap();
        let outcome = loader.load_page(1).await;

        assert_eq!(outcome, LoadOutcome::NoActiveProfile);
        assert_eq!(source.calls().len(), 1);
        assert!(loader.state().items.is_empty());
        assert_eq!(loader.bound_profile(), None);
    }

    // ── Failure and guards ──────────────────────────────────

    #[tokio::test]
    async fn fetch_errors_are_swallowed() {
        let source = Arc::new(FakeSource::new(3));
        let session = session().await;
        let loader = loader(&source, &session);
        loader.load_page(1).await;
        let before = loader.state();

        source.fail.store(true, Ordering::SeqCst);
        let outcome = loader.on_end_reached().await;

        assert_eq!(outcome, LoadOutcome::Failed);
        let after = loader.state();
        assert_eq!(after, before, "list and flags unchanged");
        assert!(!after.is_loading_more);
    }

    #[tokio::test]
    async fn end_reached_stops_at_last_page() {
        let source = Arc::new(FakeSource::new(2));
        let session = session().await;
        let loader = loader(&source, &session);

        assert_eq!(loader.on_end_reached().await, LoadOutcome::Exhausted, "nothing loaded yet");
        loader.load_page(1).await;
        assert_eq!(loader.on_end_reached().await, LoadOutcome::Loaded { page: 2, count: 10 });
        assert_eq!(loader.on_end_reached().await, LoadOutcome::Exhausted);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn end_reached_is_busy_while_more_is_loading() {
        let source = Arc::new(FakeSource::new(5));
        let session = session().await;
        let loader = loader(&source, &session);
        loader.load_page(1).await;

        let release = source.hold(2);
        let pending = tokio::spawn({
            let loader = loader.clone();
            async move { loader.on_end_reached().await }
        });
        wait_for_calls(&source, 2).await;

        assert!(loader.state().is_loading_more);
        assert_eq!(loader.on_end_reached().await, LoadOutcome::Busy);

        release.notify_one();
        assert_eq!(pending.await.unwrap(), LoadOutcome::Loaded { page: 2, count: 10 });
        assert_eq!(source.calls().len(), 2);
        assert!(!loader.state().is_loading_more);
    }

    // ── Ordering ────────────────────────────────────────────

    #[tokio::test]
    async fn late_page_two_appends_after_refresh() {
        let source = Arc::new(FakeSource::new(3));
        let session = session().await;
        let loader = loader(&source, &session);
        loader.load_page(1).await;

        let release = source.hold(2);
        let more = tokio::spawn({
            let loader = loader.clone();
            async move { loader.on_end_reached().await }
        });
        wait_for_calls(&source, 2).await;

        loader.refresh().await;
        assert_eq!(loader.state().items.len(), 10);

        release.notify_one();
        assert_eq!(more.await.unwrap(), LoadOutcome::Loaded { page: 2, count: 10 });

        let state = loader.state();
        assert_eq!(state.items.len(), 20);
        assert!(state.items[0].contains("/c3/"), "refreshed page 1 first");
        assert!(state.items[10].contains("/p2/"), "stale page 2 re-appended");
    }

    #[tokio::test]
    async fn response_from_previous_profile_is_dropped() {
        let source = Arc::new(FakeSource::new(1));
        let session = session().await;
        let loader = loader(&source, &session);

        let release = source.hold(1);
        let old = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load_page(1).await }
        });
        wait_for_calls(&source, 1).await;

        session.set_active_profile(Some(&profile(2))).unwrap();
        assert_eq!(loader.load_page(1).await, LoadOutcome::Loaded { page: 1, count: 10 });

        release.notify_one();
        assert_eq!(old.await.unwrap(), LoadOutcome::Stale);
        assert!(loader.state().items.iter().all(|i| i.starts_with("2/")));
    }

    #[tokio::test]
    async fn unmount_discards_late_response() {
        let source = Arc::new(FakeSource::new(1));
        let session = session().await;
        let loader = loader(&source, &session);

        let release = source.hold(1);
        let pending = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load_page(1).await }
        });
        wait_for_calls(&source, 1).await;

        loader.unmount();
        release.notify_one();

        assert_eq!(pending.await.unwrap(), LoadOutcome::Unmounted);
        assert!(loader.state().items.is_empty());
        assert_eq!(loader.load_page(1).await, LoadOutcome::Unmounted);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn reset_empties_list_and_drops_in_flight() {
        let source = Arc::new(FakeSource::new(1));
        let session = session().await;
        let loader = loader(&source, &session);
        loader.load_page(1).await;

        let release = source.hold(1);
        let pending = tokio::spawn({
            let loader = loader.clone();
            async move { loader.refresh().await }
        });
        wait_for_calls(&source, 2).await;

        loader.reset();
        release.notify_one();

        assert_eq!(pending.await.unwrap(), LoadOutcome::Stale);
        assert_eq!(loader.state(), ListState::default());
        assert_eq!(loader.bound_profile(), Some(ProfileId::from(1)));
    }

    // ── Profile propagation ─────────────────────────────────

    #[tokio::test]
    async fn follows_active_profile_switches() {
        let source = Arc::new(FakeSource::new(1));
        let session = session().await;
        let loader = loader(&source, &session);
        let task = loader.clone().follow_active_profile();

        session.set_active_profile(Some(&profile(2))).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while loader.state().items.is_empty() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("loader never reloaded");
        assert!(loader.state().items.iter().all(|i| i.starts_with("2/")));

        session.set_active_profile(None).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while loader.bound_profile().is_some() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("loader never cleared");
        assert!(loader.state().items.is_empty());

        task.abort();
    }
}
