/// Reduce a user-supplied file name to a single safe path component.
///
/// Directory parts are dropped and separators or control characters replaced,
/// so a stored name can never escape the directory it is written into.
pub fn file_name_component(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_control() || c == ':' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "download".to_string(),
        _ => cleaned,
    }
}
