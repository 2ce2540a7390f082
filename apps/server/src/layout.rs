//! On-disk layout of a map folder.
//!
//! ```text
//! <maps>/<folder>/config.json
//! <maps>/<folder>/map/*.pgm|yaml|yml|pcd   (and anything unrecognised)
//! <maps>/<folder>/queue/*.json
//! ```

use std::path::Path;

pub const CONFIG_FILE: &str = "config.json";

/// Path of `file_name` relative to its map folder, by extension.
pub fn map_target_path(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("pgm" | "yaml" | "yml" | "pcd") => format!("map/{file_name}"),
        _ if file_name == CONFIG_FILE => file_name.to_string(),
        Some("json") => format!("queue/{file_name}"),
        _ => format!("map/{file_name}"),
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Strips the `/maps/` URL prefix browsers send for stored files.
pub fn strip_maps_prefix(path: &str) -> &str {
    path.strip_prefix("/maps/").unwrap_or(path)
}

/// Final component of a browser-supplied file name.
pub fn base_name(file_name: &str) -> Option<&str> {
    let name = file_name.rsplit(['/', '\\']).next()?;
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}
