use std::path::PathBuf;

pub const HELP: &str = "\
commands:
  show                     current staged state
  package <path>           select package file
  icon <path>              select icon image
  images <path>...         add auxiliary PNG images
  rm-image <index>         remove auxiliary image
  get-image <index>        save auxiliary image to the downloads dir
  edit                     open the name editor
  draft <text>             replace the name draft
  confirm | cancel         commit or discard the name draft
  download                 run the simulated download
  reset                    clear everything
  session                  print the session id
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Show,
    Package(PathBuf),
    Icon(PathBuf),
    Images(Vec<PathBuf>),
    RemoveImage(usize),
    GetImage(usize),
    Edit,
    Draft(String),
    Confirm,
    Cancel,
    Download,
    Reset,
    Session,
    Quit,
}

fn index_arg(rest: &str) -> Result<usize, String> {
    rest.parse::<usize>()
        .map_err(|_| format!("expected an image index, got `{rest}`"))
}

fn path_arg(cmd: &str, rest: &str) -> Result<PathBuf, String> {
    if rest.is_empty() {
        return Err(format!("{cmd}: missing path"));
    }
    Ok(PathBuf::from(rest))
}

/// Parse one input line; `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };
    let parsed = match cmd {
        "help" | "?" => ShellCommand::Help,
        "show" => ShellCommand::Show,
        "package" => ShellCommand::Package(path_arg(cmd, rest)?),
        "icon" => ShellCommand::Icon(path_arg(cmd, rest)?),
        "images" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err("images: missing path".into());
            }
            ShellCommand::Images(paths)
        }
        "rm-image" => ShellCommand::RemoveImage(index_arg(rest)?),
        "get-image" => ShellCommand::GetImage(index_arg(rest)?),
        "edit" => ShellCommand::Edit,
        "draft" => ShellCommand::Draft(rest.to_string()),
        "confirm" => ShellCommand::Confirm,
        "cancel" => ShellCommand::Cancel,
        "download" | "install" => ShellCommand::Download,
        "reset" => ShellCommand::Reset,
        "session" => ShellCommand::Session,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command `{other}`, try `help`")),
    };
    Ok(Some(parsed))
}
