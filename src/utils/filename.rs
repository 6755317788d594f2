//! Safe filename generation utilities

use regex::Regex;

/// Convert a title to a safe filename by replacing invalid characters.
pub fn to_safe_filename(title: &str, suffix: &str, extension: &str) -> String {
    let invalid_chars = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
    let mut safe_title = invalid_chars.replace_all(title, "_").to_string();

    // Leading/trailing dots and spaces confuse several filesystems.
    safe_title = safe_title
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string();

    // Stay well under the common 255-char limit.
    if safe_title.len() > 200 {
        let mut cut = 200;
        while !safe_title.is_char_boundary(cut) {
            cut -= 1;
        }
        safe_title.truncate(cut);
        safe_title = safe_title.trim_end().to_string();
    }

    if safe_title.is_empty() {
        safe_title = "video".to_string();
    }

    format!("{safe_title}{suffix}.{extension}")
}
