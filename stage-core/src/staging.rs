//! The interactive staging state machine.
//!
//! `Empty -> Staged -> Downloading -> Complete -> Staged`, with icon and name
//! edits allowed in any phase. Every change is published as a
//! [`StageSnapshot`] on a watch channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::codec::{self, DataUriCodec, TextCodec};
use crate::config::StageConfig;
use crate::domain::{PNG_CONTENT_TYPE, PackagePayload, RecordPatch, StagedFile};
use crate::error::{Result, StageError};
use crate::materialize::Materializer;
use crate::progress::{COMPLETE, ProgressGenerator};
use crate::sync::{ConfigSyncStore, SyncOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Staged,
    Downloading,
    /// Held only for the settle delay after materialization.
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    WrongExtension { expected: String },
    NotAnImage,
    NotPng,
    /// A download is running.
    Busy,
}

/// Result of offering a file to the controller. Rejection is a normal outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    Rejected(RejectReason),
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Acceptance::Accepted)
    }
}

/// Client-local staged state. Auxiliary images never leave this struct.
#[derive(Clone, Debug, Default)]
pub struct StagedSession {
    pub package: Option<StagedFile>,
    pub icon: Option<String>,
    pub app_name: String,
    pub images: Vec<StagedFile>,
    pub progress: f32,
}

/// What observers see after each change.
#[derive(Clone, Debug, PartialEq)]
pub struct StageSnapshot {
    pub phase: Phase,
    pub package_name: Option<String>,
    pub package_len: Option<u64>,
    pub icon: Option<String>,
    pub app_name: String,
    pub image_names: Vec<String>,
    pub progress: f32,
    pub name_draft: Option<String>,
}

/// Everything a driver needs to run one download cycle.
pub struct DownloadTicket {
    pub file: StagedFile,
    pub progress: ProgressGenerator,
    pub tick_interval: Duration,
    pub settle_delay: Duration,
}

pub struct StagingController {
    config: StageConfig,
    sync: ConfigSyncStore,
    session: StagedSession,
    phase: Phase,
    name_draft: Option<String>,
    state_tx: watch::Sender<StageSnapshot>,
}

impl StagingController {
    pub fn new(config: StageConfig, sync: ConfigSyncStore) -> Self {
        let session = StagedSession {
            app_name: config.default_app_name.clone(),
            ..Default::default()
        };
        let ctl = Self {
            config,
            sync,
            session,
            phase: Phase::Empty,
            name_draft: None,
            state_tx: watch::channel(StageSnapshot {
                phase: Phase::Empty,
                package_name: None,
                package_len: None,
                icon: None,
                app_name: String::new(),
                image_names: Vec::new(),
                progress: 0.0,
                name_draft: None,
            })
            .0,
        };
        ctl.publish();
        ctl
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &StagedSession {
        &self.session
    }

    pub fn images(&self) -> &[StagedFile] {
        &self.session.images
    }

    pub fn sync(&self) -> &ConfigSyncStore {
        &self.sync
    }

    pub fn subscribe(&self) -> watch::Receiver<StageSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            phase: self.phase,
            package_name: self.session.package.as_ref().map(|p| p.name.clone()),
            package_len: self.session.package.as_ref().map(StagedFile::len),
            icon: self.session.icon.clone(),
            app_name: self.session.app_name.clone(),
            image_names: self.session.images.iter().map(|f| f.name.clone()).collect(),
            progress: self.session.progress,
            name_draft: self.name_draft.clone(),
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }

    /// Start-up path: republish whatever the store holds. Returns whether a record was found.
    pub async fn restore(&mut self) -> bool {
        let Some(loaded) = self.sync.load().await else {
            return false;
        };
        self.session.icon = loaded.app_icon;
        self.session.app_name = loaded
            .app_name
            .unwrap_or_else(|| self.config.default_app_name.clone());
        if let Some(pkg) = loaded.package {
            self.session.package = Some(pkg);
            if self.phase == Phase::Empty {
                self.phase = Phase::Staged;
            }
        }
        self.publish();
        true
    }

    fn has_package_extension(&self, name: &str) -> bool {
        name.to_ascii_lowercase()
            .ends_with(&self.config.package_extension.to_ascii_lowercase())
    }

    /// Offer a package file. Accepted packages are staged then saved.
    pub async fn select_package(&mut self, file: StagedFile) -> Acceptance {
        if !self.has_package_extension(&file.name) {
            tracing::debug!(file = %file.name, "not a package file, ignored");
            return Acceptance::Rejected(RejectReason::WrongExtension {
                expected: self.config.package_extension.clone(),
            });
        }
        if matches!(self.phase, Phase::Downloading | Phase::Complete) {
            return Acceptance::Rejected(RejectReason::Busy);
        }

        tracing::info!(package = %file.name, bytes = file.len(), "package staged");
        let name = file.name.clone();
        let bytes = file.bytes.clone();
        self.session.package = Some(file);
        self.phase = Phase::Staged;
        self.publish();

        match codec::encode_async(bytes).await {
            Ok(data) => {
                if data.len() as u64 > self.config.max_payload_bytes {
                    tracing::warn!(
                        package = %name,
                        encoded = data.len(),
                        limit = self.config.max_payload_bytes,
                        "encoded package exceeds the usual store payload limit"
                    );
                }
                self.sync
                    .save(RecordPatch::package(PackagePayload { name, data }))
                    .await;
            }
            Err(e) => tracing::warn!(package = %name, error = %e, "package encode failed, not saved"),
        }
        Acceptance::Accepted
    }

    /// Offer an icon. Any `image/*` content type is accepted.
    pub async fn select_icon(&mut self, file: StagedFile) -> Acceptance {
        if !file.content_type.to_ascii_lowercase().starts_with("image/") {
            tracing::debug!(file = %file.name, content_type = %file.content_type, "not an image, ignored");
            return Acceptance::Rejected(RejectReason::NotAnImage);
        }
        let codec = DataUriCodec::new(file.content_type.clone());
        let uri = codec.encode(&file.bytes);
        tracing::debug!(icon = %file.name, codec = ?codec.id(), encoded = uri.len(), "icon encoded");
        self.session.icon = Some(uri.clone());
        self.publish();
        self.sync.save(RecordPatch::icon(uri)).await;
        Acceptance::Accepted
    }

    /// Append PNG images to the local list; one verdict per input, in order.
    pub fn add_images(&mut self, files: Vec<StagedFile>) -> Vec<Acceptance> {
        let verdicts = files
            .into_iter()
            .map(|f| {
                if f.content_type == PNG_CONTENT_TYPE {
                    self.session.images.push(f);
                    Acceptance::Accepted
                } else {
                    Acceptance::Rejected(RejectReason::NotPng)
                }
            })
            .collect();
        self.publish();
        verdicts
    }

    pub fn remove_image(&mut self, index: usize) -> Option<StagedFile> {
        if index >= self.session.images.len() {
            return None;
        }
        let removed = self.session.images.remove(index);
        self.publish();
        Some(removed)
    }

    pub fn download_image(
        &self,
        index: usize,
        materializer: &dyn Materializer,
    ) -> Result<Option<PathBuf>> {
        match self.session.images.get(index) {
            Some(img) => Ok(Some(materializer.materialize(img)?)),
            None => Ok(None),
        }
    }

    /// Open the name editor pre-filled with the current name.
    pub fn open_name_editor(&mut self) -> &str {
        let draft = self.session.app_name.clone();
        self.name_draft = Some(draft);
        self.publish();
        self.name_draft.as_deref().unwrap_or_default()
    }

    /// Replace the draft text. False when no editor is open.
    pub fn set_name_draft(&mut self, text: impl Into<String>) -> bool {
        if self.name_draft.is_none() {
            return false;
        }
        self.name_draft = Some(text.into());
        self.publish();
        true
    }

    pub fn name_draft(&self) -> Option<&str> {
        self.name_draft.as_deref()
    }

    /// Commit the draft. A blank draft closes the editor without changes.
    pub async fn confirm_name(&mut self) -> Option<SyncOutcome> {
        let draft = self.name_draft.take()?;
        let name = draft.trim().to_string();
        if name.is_empty() {
            self.publish();
            return None;
        }
        self.session.app_name = name.clone();
        self.publish();
        Some(self.sync.save(RecordPatch::name(name)).await)
    }

    pub fn cancel_name_edit(&mut self) {
        if self.name_draft.take().is_some() {
            self.publish();
        }
    }

    /// Enter `Downloading`. `None` unless a package is staged and idle.
    pub fn begin_download(&mut self) -> Option<DownloadTicket> {
        if self.phase != Phase::Staged {
            return None;
        }
        let file = self.session.package.clone()?;
        self.phase = Phase::Downloading;
        self.session.progress = 0.0;
        self.publish();
        tracing::info!(package = %file.name, "download started");
        Some(DownloadTicket {
            file,
            progress: ProgressGenerator::new(self.config.min_increment, self.config.max_increment),
            tick_interval: self.config.tick_interval(),
            settle_delay: self.config.settle_delay(),
        })
    }

    pub fn report_progress(&mut self, value: f32) {
        if self.phase != Phase::Downloading {
            return;
        }
        self.session.progress = value.clamp(0.0, COMPLETE);
        tracing::trace!(progress = self.session.progress, "download tick");
        self.publish();
    }

    pub fn complete_download(&mut self) {
        if self.phase != Phase::Downloading {
            return;
        }
        self.phase = Phase::Complete;
        self.session.progress = COMPLETE;
        self.publish();
    }

    /// Leave `Complete`: back to `Staged` with progress zeroed.
    pub fn settle(&mut self) {
        if self.phase != Phase::Complete {
            return;
        }
        self.phase = if self.session.package.is_some() {
            Phase::Staged
        } else {
            Phase::Empty
        };
        self.session.progress = 0.0;
        self.publish();
    }

    /// Run a whole download cycle: animate, materialize, settle.
    /// `Ok(None)` when the trigger is disabled.
    ///
    /// The cycle holds the controller until it settles. To abandon it, drop the
    /// future and call [`reset`](Self::reset); later transitions are then no-ops.
    pub async fn download(
        &mut self,
        materializer: Arc<dyn Materializer>,
    ) -> Result<Option<PathBuf>> {
        let Some(mut ticket) = self.begin_download() else {
            return Ok(None);
        };

        let mut interval = tokio::time::interval(ticket.tick_interval);
        interval.tick().await;
        while let Some(value) = ticket.progress.next() {
            interval.tick().await;
            self.report_progress(value);
        }

        self.complete_download();
        let name = ticket.file.name.clone();
        let file = ticket.file;
        let saved = tokio::task::spawn_blocking(move || materializer.materialize(&file))
            .await
            .map_err(|e| StageError::Io(std::io::Error::other(format!("materialize task: {e}"))))
            .and_then(|res| res);
        if let Err(e) = &saved {
            tracing::warn!(package = %name, error = %e, "materialization failed");
        }
        tokio::time::sleep(ticket.settle_delay).await;
        self.settle();
        saved.map(Some)
    }

    /// Drop everything staged, locally and remotely.
    pub async fn reset(&mut self) -> SyncOutcome {
        self.session = StagedSession {
            app_name: self.config.default_app_name.clone(),
            ..Default::default()
        };
        self.phase = Phase::Empty;
        self.name_draft = None;
        self.publish();
        tracing::info!(record_id = %self.sync.record_id(), "staging reset");
        self.sync.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PACKAGE_CONTENT_TYPE;
    use crate::error::StageError;
    use crate::testing::{FlakyStore, RecordingNotifier, init_test_tracing};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Shelf {
        saved: Mutex<Vec<StagedFile>>,
    }

    impl Materializer for Shelf {
        fn materialize(&self, file: &StagedFile) -> Result<PathBuf> {
            self.saved.lock().unwrap().push(file.clone());
            Ok(PathBuf::from(&file.name))
        }
    }

    struct FullDisk;

    impl Materializer for FullDisk {
        fn materialize(&self, _file: &StagedFile) -> Result<PathBuf> {
            Err(StageError::Io(std::io::Error::other("no space left")))
        }
    }

    fn controller() -> (StagingController, Arc<FlakyStore>, Arc<RecordingNotifier>) {
        let store = FlakyStore::new();
        let notes = RecordingNotifier::new();
        let sync = ConfigSyncStore::new(store.clone(), "cfg", notes.clone());
        (StagingController::new(StageConfig::default(), sync), store, notes)
    }

    fn apk(name: &str) -> StagedFile {
        StagedFile::new(name, PACKAGE_CONTENT_TYPE, vec![0x50, 0x4b, 0x03, 0x04])
    }

    fn png(name: &str) -> StagedFile {
        StagedFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    #[tokio::test]
    async fn wrong_extension_is_ignored() {
        init_test_tracing();
        let (mut ctl, store, notes) = controller();
        let verdict = ctl.select_package(apk("app.txt")).await;
        assert_eq!(
            verdict,
            Acceptance::Rejected(RejectReason::WrongExtension {
                expected: ".apk".into()
            })
        );
        assert_eq!(ctl.phase(), Phase::Empty);
        assert!(ctl.session().package.is_none());
        assert_eq!(store.calls(), 0);
        assert!(notes.notices().is_empty());
    }

    #[tokio::test]
    async fn package_moves_empty_to_staged_and_saves() {
        let (mut ctl, _, notes) = controller();
        assert!(ctl.select_package(apk("app.apk")).await.is_accepted());
        assert_eq!(ctl.phase(), Phase::Staged);

        let rec = ctl.sync().fetch().await.unwrap().unwrap();
        assert_eq!(rec.package().unwrap().name, "app.apk");
        assert_eq!(notes.failures(), 0);
    }

    #[tokio::test]
    async fn extension_match_ignores_ascii_case() {
        let (mut ctl, _, _) = controller();
        assert!(ctl.select_package(apk("APP.APK")).await.is_accepted());
    }

    #[tokio::test]
    async fn save_failure_keeps_local_state() {
        let (mut ctl, store, notes) = controller();
        store.set_offline(true);
        assert!(ctl.select_package(apk("app.apk")).await.is_accepted());
        assert_eq!(ctl.phase(), Phase::Staged);
        assert_eq!(ctl.session().package.as_ref().unwrap().name, "app.apk");
        assert_eq!(notes.failures(), 1);
    }

    #[tokio::test]
    async fn icon_requires_image_content_type() {
        let (mut ctl, _, _) = controller();
        let doc = StagedFile::new("icon.pdf", "application/pdf", vec![1]);
        assert_eq!(
            ctl.select_icon(doc).await,
            Acceptance::Rejected(RejectReason::NotAnImage)
        );
        assert!(ctl.session().icon.is_none());

        let jpeg = StagedFile::new("icon.jpg", "image/jpeg", vec![0xff, 0xd8]);
        assert!(ctl.select_icon(jpeg).await.is_accepted());
        let icon = ctl.session().icon.clone().unwrap();
        assert!(icon.starts_with("data:image/jpeg;base64,"));
        let rec = ctl.sync().fetch().await.unwrap().unwrap();
        assert_eq!(rec.app_icon, Some(icon));
        assert_eq!(ctl.phase(), Phase::Empty);
    }

    #[tokio::test]
    async fn only_png_joins_the_image_list() {
        let (mut ctl, store, _) = controller();
        let verdicts = ctl.add_images(vec![
            png("a.png"),
            StagedFile::new("b.jpg", "image/jpeg", vec![1]),
            png("c.png"),
        ]);
        assert_eq!(
            verdicts,
            vec![
                Acceptance::Accepted,
                Acceptance::Rejected(RejectReason::NotPng),
                Acceptance::Accepted
            ]
        );
        let names: Vec<_> = ctl.images().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.png", "c.png"]);
        assert_eq!(store.calls(), 0);

        assert_eq!(ctl.remove_image(0).unwrap().name, "a.png");
        assert!(ctl.remove_image(5).is_none());
        assert_eq!(ctl.images().len(), 1);

        let shelf = Shelf::default();
        assert_eq!(
            ctl.download_image(0, &shelf).unwrap(),
            Some(PathBuf::from("c.png"))
        );
        assert_eq!(ctl.download_image(1, &shelf).unwrap(), None);
    }

    #[tokio::test]
    async fn name_edit_is_two_phase() {
        let (mut ctl, _, _) = controller();
        assert_eq!(ctl.open_name_editor(), "My App");
        assert!(ctl.set_name_draft("Scratch"));
        ctl.cancel_name_edit();
        assert_eq!(ctl.session().app_name, "My App");
        assert!(!ctl.set_name_draft("no editor"));
        assert_eq!(ctl.confirm_name().await, None);

        ctl.open_name_editor();
        ctl.set_name_draft("  Real Name ");
        assert_eq!(ctl.confirm_name().await, Some(SyncOutcome::Done));
        assert_eq!(ctl.session().app_name, "Real Name");
        assert_eq!(ctl.name_draft(), None);
        let rec = ctl.sync().fetch().await.unwrap().unwrap();
        assert_eq!(rec.app_name.as_deref(), Some("Real Name"));

        ctl.open_name_editor();
        ctl.set_name_draft("   ");
        assert_eq!(ctl.confirm_name().await, None);
        assert_eq!(ctl.session().app_name, "Real Name");
    }

    #[tokio::test]
    async fn download_disabled_without_package() {
        let (mut ctl, _, _) = controller();
        assert!(ctl.begin_download().is_none());
        let shelf = Arc::new(Shelf::default());
        assert_eq!(ctl.download(shelf.clone()).await.unwrap(), None);
        assert!(shelf.saved.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn download_cycle_materializes_once_and_settles() {
        let (mut ctl, _, _) = controller();
        ctl.select_package(apk("app.apk")).await;
        let mut rx = ctl.subscribe();
        let shelf = Arc::new(Shelf::default());

        let path = ctl.download(shelf.clone()).await.unwrap();
        assert_eq!(path, Some(PathBuf::from("app.apk")));
        assert_eq!(shelf.saved.lock().unwrap().len(), 1);
        assert_eq!(shelf.saved.lock().unwrap()[0].bytes, apk("app.apk").bytes);
        assert_eq!(ctl.phase(), Phase::Staged);
        assert_eq!(ctl.session().progress, 0.0);

        let last = rx.borrow_and_update().clone();
        assert_eq!(last.phase, Phase::Staged);
        assert_eq!(last.progress, 0.0);
    }

    #[test]
    fn second_trigger_is_ignored_while_downloading() {
        let (mut ctl, _, _) = controller();
        ctl.session.package = Some(apk("app.apk"));
        ctl.phase = Phase::Staged;
        let ticket = ctl.begin_download().unwrap();
        assert_eq!(ticket.file.name, "app.apk");
        assert!(ctl.begin_download().is_none());

        ctl.report_progress(140.0);
        assert_eq!(ctl.session().progress, COMPLETE);
        ctl.complete_download();
        assert_eq!(ctl.phase(), Phase::Complete);
        assert!(ctl.begin_download().is_none());
        ctl.settle();
        assert_eq!(ctl.phase(), Phase::Staged);
        assert_eq!(ctl.session().progress, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn materialization_error_still_settles() {
        let (mut ctl, _, _) = controller();
        ctl.select_package(apk("app.apk")).await;
        assert!(ctl.download(Arc::new(FullDisk)).await.is_err());
        assert_eq!(ctl.phase(), Phase::Staged);
        assert_eq!(ctl.session().progress, 0.0);
    }

    #[tokio::test]
    async fn busy_while_downloading() {
        let (mut ctl, _, _) = controller();
        ctl.select_package(apk("app.apk")).await;
        let _ticket = ctl.begin_download().unwrap();
        assert_eq!(
            ctl.select_package(apk("other.apk")).await,
            Acceptance::Rejected(RejectReason::Busy)
        );
        // icon edits are still allowed
        assert!(ctl.select_icon(png("i.png")).await.is_accepted());
        assert_eq!(ctl.phase(), Phase::Downloading);
    }

    #[tokio::test]
    async fn reset_mid_download_abandons_the_cycle() {
        let (mut ctl, _, _) = controller();
        ctl.select_package(apk("app.apk")).await;
        let ticket = ctl.begin_download().unwrap();
        ctl.report_progress(42.0);
        assert_eq!(ctl.phase(), Phase::Downloading);

        assert_eq!(ctl.reset().await, SyncOutcome::Done);
        assert_eq!(ctl.phase(), Phase::Empty);

        // late transitions from the abandoned driver change nothing
        ctl.report_progress(80.0);
        ctl.complete_download();
        ctl.settle();
        assert_eq!(ctl.phase(), Phase::Empty);
        assert_eq!(ctl.session().progress, 0.0);
        assert!(ctl.session().package.is_none());
        assert!(ctl.begin_download().is_none());
        drop(ticket);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_download_can_be_reset() {
        let (mut ctl, _, _) = controller();
        ctl.select_package(apk("app.apk")).await;
        let shelf = Arc::new(Shelf::default());
        let res = tokio::time::timeout(
            std::time::Duration::from_millis(250),
            ctl.download(shelf.clone()),
        )
        .await;
        assert!(res.is_err());
        assert_eq!(ctl.phase(), Phase::Downloading);

        ctl.reset().await;
        assert_eq!(ctl.phase(), Phase::Empty);
        assert_eq!(ctl.session().progress, 0.0);
        assert!(shelf.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (mut ctl, _, _) = controller();
        ctl.select_package(apk("app.apk")).await;
        ctl.select_icon(png("icon.png")).await;
        ctl.open_name_editor();
        ctl.set_name_draft("Named");
        ctl.confirm_name().await;
        ctl.add_images(vec![png("shot.png")]);
        ctl.open_name_editor();

        assert_eq!(ctl.reset().await, SyncOutcome::Done);
        assert_eq!(ctl.phase(), Phase::Empty);
        let s = ctl.session();
        assert!(s.package.is_none());
        assert!(s.icon.is_none());
        assert_eq!(s.app_name, "My App");
        assert!(s.images.is_empty());
        assert_eq!(ctl.name_draft(), None);
        assert!(ctl.sync().load().await.is_none());
    }

    #[tokio::test]
    async fn restore_republishes_stored_state() {
        let (mut ctl, store, notes) = controller();
        ctl.select_package(apk("app.apk")).await;
        ctl.select_icon(png("icon.png")).await;

        let sync = ConfigSyncStore::new(store, "cfg", notes);
        let mut fresh = StagingController::new(StageConfig::default(), sync);
        assert_eq!(fresh.phase(), Phase::Empty);
        assert!(fresh.restore().await);
        assert_eq!(fresh.phase(), Phase::Staged);
        assert_eq!(fresh.session().package, Some(apk("app.apk")));
        assert_eq!(fresh.session().icon, ctl.session().icon);
        assert_eq!(fresh.session().app_name, "My App");
        assert_eq!(fresh.subscribe().borrow().package_name.as_deref(), Some("app.apk"));
    }
}
