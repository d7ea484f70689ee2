use std::path::{Path, PathBuf};

use stage_core::codec::DataUriCodec;
use stage_core::domain::{OCTET_STREAM, PACKAGE_CONTENT_TYPE, PNG_CONTENT_TYPE};
use stage_core::error::{Result, StageError};
use stage_core::staging::StageSnapshot;
use stage_core::{Acceptance, Phase, RejectReason, StagedFile};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use super::Context;
use crate::presentation::shell::{HELP, ShellCommand, parse_line};

/// Content type from the file extension, the way a browser file picker reports it.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "apk" => PACKAGE_CONTENT_TYPE,
        "png" => PNG_CONTENT_TYPE,
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => OCTET_STREAM,
    }
}

pub fn read_input(path: &Path) -> Result<StagedFile> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StageError::Format(format!("not a file name: {}", path.display())))?;
    Ok(StagedFile::new(name, content_type_for(path), bytes))
}

fn describe(verdict: &Acceptance) -> String {
    match verdict {
        Acceptance::Accepted => "accepted".into(),
        Acceptance::Rejected(RejectReason::WrongExtension { expected }) => {
            format!("ignored: not a `{expected}` file")
        }
        Acceptance::Rejected(RejectReason::NotAnImage) => "ignored: not an image".into(),
        Acceptance::Rejected(RejectReason::NotPng) => "ignored: not a PNG".into(),
        Acceptance::Rejected(RejectReason::Busy) => "ignored: a download is running".into(),
    }
}

fn icon_summary(icon: &str) -> String {
    match DataUriCodec::mime_of(icon) {
        Some(mime) => format!("{mime}, {} chars", icon.len()),
        None => format!("{} chars", icon.len()),
    }
}

fn print_snapshot(snap: &StageSnapshot) {
    println!("phase:    {:?}", snap.phase);
    println!("name:     {}", snap.app_name);
    match &snap.icon {
        Some(icon) => println!("icon:     {}", icon_summary(icon)),
        None => println!("icon:     -"),
    }
    match (&snap.package_name, snap.package_len) {
        (Some(name), Some(len)) => println!("package:  {name} ({len} bytes)"),
        _ => println!("package:  -"),
    }
    for (i, name) in snap.image_names.iter().enumerate() {
        println!("image[{i}]: {name}");
    }
    if let Some(draft) = &snap.name_draft {
        println!("editing:  {draft}");
    }
}

async fn render_progress(mut rx: watch::Receiver<StageSnapshot>) {
    while rx.changed().await.is_ok() {
        let snap = rx.borrow_and_update().clone();
        match snap.phase {
            Phase::Downloading => eprint!("\rDownloading... {:>3}%", snap.progress.round() as u32),
            Phase::Complete => eprintln!("\rDownloading... 100%"),
            _ => {}
        }
    }
}

pub fn handle_session(ctx: &Context) -> Result<()> {
    println!("{}", ctx.identity.get_or_create_session_id());
    Ok(())
}

pub async fn handle_show(ctx: &mut Context) -> Result<()> {
    let sync = ctx.controller.sync();
    println!("record:   {}", sync.record_id());
    let Some(cfg) = sync.load().await else {
        println!("(no stored configuration)");
        return Ok(());
    };
    println!(
        "name:     {}",
        cfg.app_name
            .as_deref()
            .unwrap_or(ctx.config.default_app_name.as_str())
    );
    match &cfg.app_icon {
        Some(icon) => println!("icon:     {}", icon_summary(icon)),
        None => println!("icon:     -"),
    }
    match &cfg.package {
        Some(p) => println!(
            "package:  {} ({} bytes, blake3 {})",
            p.name,
            p.len(),
            p.digest()
        ),
        None => println!("package:  -"),
    }
    if let Some(ts) = &cfg.updated_at {
        println!("updated:  {ts}");
    }
    Ok(())
}

pub async fn handle_package(ctx: &mut Context, path: PathBuf) -> Result<()> {
    let file = read_input(&path)?;
    let verdict = ctx.controller.select_package(file).await;
    eprintln!("package: {}", describe(&verdict));
    Ok(())
}

pub async fn handle_icon(ctx: &mut Context, path: PathBuf) -> Result<()> {
    let file = read_input(&path)?;
    let verdict = ctx.controller.select_icon(file).await;
    eprintln!("icon: {}", describe(&verdict));
    Ok(())
}

pub async fn handle_name(ctx: &mut Context, name: String) -> Result<()> {
    ctx.controller.restore().await;
    ctx.controller.open_name_editor();
    ctx.controller.set_name_draft(name);
    if ctx.controller.confirm_name().await.is_none() {
        eprintln!("name: unchanged (blank)");
    }
    Ok(())
}

pub async fn handle_download(ctx: &mut Context) -> Result<()> {
    ctx.controller.restore().await;
    run_download(ctx).await
}

async fn run_download(ctx: &mut Context) -> Result<()> {
    let rx = ctx.controller.subscribe();
    let outcome = tokio::select! {
        res = ctx.controller.download(ctx.materializer.clone()) => res,
        _ = render_progress(rx) => Ok(None),
    };
    match outcome? {
        Some(path) => println!("saved {}", path.display()),
        None => eprintln!("download: nothing staged"),
    }
    Ok(())
}

pub async fn handle_reset(ctx: &mut Context) -> Result<()> {
    ctx.controller.reset().await;
    Ok(())
}

pub async fn handle_shell(ctx: &mut Context) -> Result<()> {
    ctx.controller.restore().await;
    eprintln!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        ctx.flush_notices();
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let cmd = match parse_line(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };
        if cmd == ShellCommand::Quit {
            break;
        }
        // a failing action reports and keeps the shell alive
        if let Err(e) = run_shell_command(ctx, cmd).await {
            eprintln!("error: {e}");
        }
    }
    ctx.flush_notices();
    Ok(())
}

async fn run_shell_command(ctx: &mut Context, cmd: ShellCommand) -> Result<()> {
    match cmd {
        ShellCommand::Help => eprintln!("{HELP}"),
        ShellCommand::Show => print_snapshot(&ctx.controller.snapshot()),
        ShellCommand::Package(path) => handle_package(ctx, path).await?,
        ShellCommand::Icon(path) => handle_icon(ctx, path).await?,
        ShellCommand::Images(paths) => {
            let files = paths
                .iter()
                .map(|p| read_input(p))
                .collect::<Result<Vec<_>>>()?;
            let verdicts = ctx.controller.add_images(files);
            for (path, verdict) in paths.iter().zip(&verdicts) {
                eprintln!("{}: {}", path.display(), describe(verdict));
            }
        }
        ShellCommand::RemoveImage(i) => match ctx.controller.remove_image(i) {
            Some(f) => eprintln!("removed {}", f.name),
            None => eprintln!("no image at {i}"),
        },
        ShellCommand::GetImage(i) => match ctx.controller.download_image(i, ctx.materializer.as_ref())? {
            Some(path) => println!("saved {}", path.display()),
            None => eprintln!("no image at {i}"),
        },
        ShellCommand::Edit => {
            let draft = ctx.controller.open_name_editor();
            eprintln!("editing name: {draft}");
        }
        ShellCommand::Draft(text) => {
            if !ctx.controller.set_name_draft(text) {
                eprintln!("no name editor open, use `edit` first");
            }
        }
        ShellCommand::Confirm => {
            if ctx.controller.confirm_name().await.is_none() {
                eprintln!("name unchanged");
            }
        }
        ShellCommand::Cancel => ctx.controller.cancel_name_edit(),
        ShellCommand::Download => run_download(ctx).await?,
        ShellCommand::Reset => {
            ctx.controller.reset().await;
        }
        ShellCommand::Session => handle_session(ctx)?,
        ShellCommand::Quit => {}
    }
    Ok(())
}
