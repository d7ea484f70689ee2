pub mod handlers;

use std::sync::Arc;

use crate::presentation::cli::{BackendArg, Cli, Commands, GlobalArgs};
use clap::Parser;
use stage_core::error::{Result, StageError};
use stage_core::notify::{ChannelNotifier, Notice};
use stage_core::repo_factory::{Backend, open_store};
use stage_core::session::FileLocalStore;
use stage_core::{ConfigSyncStore, DirMaterializer, SessionIdentity, StageConfig, StagingController};
use tokio::sync::mpsc;

/// Everything one invocation works with.
pub struct Context {
    pub config: StageConfig,
    pub identity: SessionIdentity,
    pub controller: StagingController,
    pub materializer: Arc<DirMaterializer>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

impl Context {
    pub fn build(args: &GlobalArgs) -> Result<Self> {
        let mut config = match &args.config_dir {
            Some(dir) => StageConfig::load_from_dir(dir.clone()),
            None => StageConfig::load(),
        };
        if let Some(dir) = &args.store_dir {
            config.store_dir = dir.clone();
        }
        if let Some(dir) = &args.downloads_dir {
            config.downloads_dir = dir.clone();
        }
        config.validate()?;

        let local_dir = args.local_dir.clone().unwrap_or_else(StageConfig::local_dir);
        let identity = SessionIdentity::new(Arc::new(FileLocalStore::new(&local_dir)));
        let record_id = config.record_id_for(&identity.get_or_create_session_id());

        let backend = match args.backend {
            BackendArg::Fs => Backend::Fs(config.store_dir.clone()),
            BackendArg::Mem => Backend::Mem,
        };
        let store = open_store(backend)?;
        let (notifier, notices) = ChannelNotifier::new();
        let sync = ConfigSyncStore::new(store, record_id, Arc::new(notifier));
        let controller = StagingController::new(config.clone(), sync);
        let materializer = Arc::new(DirMaterializer::new(config.downloads_dir.clone()));
        tracing::debug!(
            record_id = %controller.sync().record_id(),
            backend = ?args.backend,
            downloads = %config.downloads_dir.display(),
            "context ready"
        );

        Ok(Self {
            config,
            identity,
            controller,
            materializer,
            notices,
        })
    }

    /// Print whatever the store reported since the last call.
    pub fn flush_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            match notice {
                Notice::Success(m) => eprintln!("ok: {m}"),
                Notice::Failure(m) => eprintln!("error: {m}"),
            }
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    // one interaction loop, as in the browser client
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StageError::Io)?;
    rt.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut ctx = Context::build(&cli.global)?;
    let res = match cli.command {
        Commands::Session => handlers::handle_session(&ctx),
        Commands::Show => handlers::handle_show(&mut ctx).await,
        Commands::Package { path } => handlers::handle_package(&mut ctx, path).await,
        Commands::Icon { path } => handlers::handle_icon(&mut ctx, path).await,
        Commands::Name { name } => handlers::handle_name(&mut ctx, name).await,
        Commands::Download => handlers::handle_download(&mut ctx).await,
        Commands::Reset => handlers::handle_reset(&mut ctx).await,
        Commands::Shell => handlers::handle_shell(&mut ctx).await,
    };
    ctx.flush_notices();
    res
}
