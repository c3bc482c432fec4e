use reqwest::Url;

/// Parse "true"/"false"/"1"/"0" (and yes/no, on/off).
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    match parsed.host_str() {
        Some(host) => {
            let normalized = host
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_ascii_lowercase();
            normalized == "localhost"
                || normalized == "::1"
                || normalized == "0.0.0.0"
                || normalized.starts_with("127.")
        }
        None => false,
    }
}

/// True when `document_id` names a file with the managed extension
/// (compared case-insensitively, leading dot optional in `extension`).
pub fn has_managed_extension(document_id: &str, extension: &str) -> bool {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        return false;
    }
    let file_name = document_id.rsplit('/').next().unwrap_or(document_id);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(extension),
        None => false,
    }
}

/// Split text into lines the way the editor counts them: a trailing newline
/// does not start an extra line, and empty text has no lines.
pub fn split_lines(text: &str) -> (Vec<&str>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    let trailing_newline = text.ends_with('\n');
    let body = if trailing_newline {
        &text[..text.len() - 1]
    } else {
        text
    };
    (body.split('\n').collect(), trailing_newline)
}

pub fn join_lines<S: AsRef<str>>(lines: &[S], trailing_newline: bool) -> String {
    let mut out = lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    if trailing_newline && !lines.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_helpers() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_str(" YES "), Some(true));
        assert_eq!(parse_bool_str("off"), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn test_is_local_endpoint_url_normalizes_case_and_space() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:8000/api "));
        assert!(is_local_endpoint_url("https://127.0.0.1/api"));
        assert!(is_local_endpoint_url("http://[::1]:8000/api"));
        assert!(!is_local_endpoint_url("https://evil-localhost.com/api"));
        assert!(!is_local_endpoint_url("https://editor.example.com/api"));
    }

    #[test]
    fn test_has_managed_extension() {
        assert!(has_managed_extension("notes/a.md", ".md"));
        assert!(has_managed_extension("A.MD", "md"));
        assert!(!has_managed_extension("notes/a.mdx", ".md"));
        assert!(!has_managed_extension("notes.md/readme", ".md"));
        assert!(!has_managed_extension(".md", ".md"));
        assert!(!has_managed_extension("a.md", ""));
    }

    #[test]
    fn test_split_and_join_lines_preserve_trailing_newline() {
        let (lines, trailing) = split_lines("a\nb\n");
        assert_eq!(lines, vec!["a", "b"]);
        assert!(trailing);
        assert_eq!(join_lines(&lines, trailing), "a\nb\n");

        let (lines, trailing) = split_lines("");
        assert!(lines.is_empty());
        assert_eq!(join_lines(&lines, trailing), "");

        let (lines, trailing) = split_lines("\n");
        assert_eq!(lines, vec![""]);
        assert_eq!(join_lines(&lines, trailing), "\n");
    }
}
