//! Version extraction from WordPress file headers.
//!
//! Plugin entry files and theme stylesheets declare their version in a
//! comment header:
//!
//! ```text
//! /*
//!  * Plugin Name: Shop Tools
//!  * Version: 1.4.2
//!  */
//! ```
//!
//! Repositories in the wild also use PHP arrays and `define()` calls, so
//! [`extract_version`] tries several patterns in order and only accepts a
//! purely numeric token. [`read_header_field`] parses a single named header
//! field the way WordPress does and is used for installed versions and
//! repository validation.
//!
//! - [`comparison`] - dotted comparison and tag ordering

pub mod comparison;

pub use comparison::{compare_versions, is_newer, normalize_tag, sort_tags_descending};

use regex::Regex;
use std::sync::OnceLock;

/// Version reported when the installed version cannot be read.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Bytes of a file inspected when reading header fields.
const HEADER_SCAN_BYTES: usize = 8 * 1024;

const VERSION_PATTERNS: [&str; 5] = [
    r"(?i)Version:\s*([^\s*/]+)",
    r#"(?i)'Version'\s*=>\s*['"]([^'"]+)['"]"#,
    r#"(?i)"Version"\s*=>\s*['"]([^'"]+)['"]"#,
    r#"(?i)define\s*\(\s*['"]VERSION['"]\s*,\s*['"]([^'"]+)['"]"#,
    r"(?i)\*\s*Version:\s*([^\s*/]+)",
];

fn version_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| VERSION_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect())
}

fn is_numeric_version(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}

/// Extract a version from file contents. Empty when none can be determined.
///
/// A captured token is accepted only when it consists of digits, dots and
/// dashes, so `1.0.0-1` is accepted and `1.0.0-rc1` is not.
#[must_use]
pub fn extract_version(contents: &str) -> String {
    for pattern in version_patterns() {
        if let Some(token) = pattern.captures(contents).and_then(|c| c.get(1)) {
            let token = token.as_str().trim();
            if is_numeric_version(token) {
                return token.to_string();
            }
        }
    }
    String::new()
}

/// True when the contents carry a `Version:` header, numeric or not.
#[must_use]
pub fn has_version_header(contents: &str) -> bool {
    version_patterns().first().is_some_and(|pattern| pattern.is_match(contents))
}

/// Read a WordPress header field such as `Plugin Name` or `Version`.
///
/// Only the first 8 KiB are inspected. Leading comment characters are
/// ignored and a trailing `*/` is dropped. Returns `None` for missing or
/// blank fields.
#[must_use]
pub fn read_header_field(contents: &str, field: &str) -> Option<String> {
    let mut end = contents.len().min(HEADER_SCAN_BYTES);
    while !contents.is_char_boundary(end) {
        end -= 1;
    }
    let head = &contents[..end];

    let pattern = format!(r"(?mi)^[ \t/*#@]*{}:(.*)$", regex::escape(field));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(head)?.get(1)?.as_str();

    let value = value.trim_end_matches('\r').trim();
    let value = value.strip_suffix("*/").unwrap_or(value).trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_header() {
        let contents = "<?php\n/*\n * Plugin Name: Shop\n * Version: 1.4.2\n */";
        assert_eq!(extract_version(contents), "1.4.2");
    }

    #[test]
    fn test_extract_array_forms() {
        assert_eq!(extract_version("$info = array( 'Version' => '2.1.0' );"), "2.1.0");
        assert_eq!(extract_version(r#"$info = [ "Version" => "3.0" ];"#), "3.0");
    }

    #[test]
    fn test_extract_define() {
        assert_eq!(extract_version("define( 'VERSION', '4.5.6' );"), "4.5.6");
        assert_eq!(extract_version(r#"define("version","1.0.0-1");"#), "1.0.0-1");
    }

    #[test]
    fn test_extract_rejects_letters() {
        assert_eq!(extract_version("Version: 1.0.0-rc1"), "");
        assert_eq!(extract_version("Version: dev-main"), "");
    }

    #[test]
    fn test_extract_falls_through_to_later_pattern() {
        let contents = "Version: beta\ndefine('VERSION', '0.9.1');";
        assert_eq!(extract_version(contents), "0.9.1");
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_version(""), "");
        assert_eq!(extract_version("<?php echo 'hello';"), "");
    }

    #[test]
    fn test_extract_stops_at_comment_close() {
        assert_eq!(extract_version("/* Version: 1.2.3*/"), "1.2.3");
    }

    #[test]
    fn test_has_version_header() {
        assert!(has_version_header("version: next"));
        assert!(!has_version_header("<?php"));
    }

    #[test]
    fn test_read_header_field() {
        let contents = "/*\nTheme Name: Clean\n * Version: 2.0.1 */\nAuthor: me";
        assert_eq!(read_header_field(contents, "Theme Name").as_deref(), Some("Clean"));
        assert_eq!(read_header_field(contents, "version").as_deref(), Some("2.0.1"));
        assert_eq!(read_header_field(contents, "Plugin Name"), None);
    }

    #[test]
    fn test_read_header_field_blank_and_crlf() {
        let contents = "<?php\r\n/**\r\n * Plugin Name: Shop\r\n * Version:\r\n */";
        assert_eq!(read_header_field(contents, "Plugin Name").as_deref(), Some("Shop"));
        assert_eq!(read_header_field(contents, "Version"), None);
    }

    #[test]
    fn test_read_header_field_only_scans_head() {
        let mut contents = "x".repeat(HEADER_SCAN_BYTES + 10);
        contents.push_str("\nVersion: 9.9.9");
        assert_eq!(read_header_field(&contents, "Version"), None);
    }
}
