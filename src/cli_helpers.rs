use std::borrow::Cow;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

fn sanitize_component(value: &str) -> Cow<'_, str> {
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Cow::Borrowed(value);
    }
    let replaced: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    Cow::Owned(replaced)
}

/// `twboard_followers_<window>_<timestamp>_<tz>.png` in `base_dir` or the
/// current directory.
pub fn default_image_path(
    window_label: &str,
    base_dir: Option<&Path>,
    now: Option<DateTime<Local>>,
) -> PathBuf {
    let current = now.unwrap_or_else(Local::now);
    let tz_label = current.format("%Z").to_string();
    let tz_name = sanitize_component(&tz_label);
    let window = sanitize_component(window_label);
    let timestamp = current.format("%Y-%m-%d_%H-%M-%S");
    let filename = format!("twboard_followers_{}_{}_{}.png", window, timestamp, tz_name);
    base_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join(filename)
}
