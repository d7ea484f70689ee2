use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "stagedev: stage a package and simulate its download", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// directory holding stage.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// device-local storage (session id); defaults to the platform data dir
    #[arg(long, global = true)]
    pub local_dir: Option<PathBuf>,

    /// record store directory, overrides `store_dir` from stage.toml
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// where downloads are saved, overrides `downloads_dir` from stage.toml
    #[arg(long, global = true)]
    pub downloads_dir: Option<PathBuf>,

    /// record store backend
    #[arg(long, value_enum, default_value_t = BackendArg::Fs, global = true)]
    pub backend: BackendArg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// one JSON document per record on disk
    Fs,
    /// process memory only (useful with `shell`)
    Mem,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print this device's session id
    Session,

    /// Show the stored configuration
    Show,

    /// Stage a package file (must carry the package extension, `.apk` by default)
    Package { path: PathBuf },

    /// Set the icon from an image file
    Icon { path: PathBuf },

    /// Set the display name
    Name { name: String },

    /// Run the simulated download and save the package into the downloads dir
    Download,

    /// Clear the stored configuration and everything staged
    Reset,

    /// Interactive session exposing every staging action
    Shell,
}
