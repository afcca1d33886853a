//! Paste addressing: stored locations, key validation and filename handling.

use super::namespace::Namespace;

const MAX_KEY_LEN: usize = 512;
const MAX_EXTENSION_LEN: usize = 16;

/// Where a freshly written paste can be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPaste {
    pub namespace: Namespace,
    pub key: String,
}

impl StoredPaste {
    /// Path component of the paste's public URL.
    pub fn url_path(&self) -> String {
        self.namespace.url_path(&self.key)
    }
}

/// Whether a single path segment is safe to use as a file name or a
/// subprocess argument.
///
/// Rejects empty segments, `.`/`..`, separators, control characters and a
/// leading `-`.
pub fn is_safe_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.len() > MAX_KEY_LEN {
        return false;
    }
    if segment == "." || segment == ".." || segment.starts_with('-') {
        return false;
    }
    !segment
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\')
}

/// Whether a disk key can be resolved inside its namespace directory.
pub fn is_safe_key(key: &str) -> bool {
    is_safe_segment(key) && !key.starts_with(".tmp-")
}

/// Whether an IPFS key (`hash` or `hash/filename`) is safe to hand to the
/// client binary.
pub fn is_safe_ipfs_key(key: &str) -> bool {
    let (hash, filename) = match key.split_once('/') {
        Some((hash, filename)) => (hash, Some(filename)),
        None => (key, None),
    };
    if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return false;
    }
    filename.is_none_or(is_safe_segment)
}

/// Extension suffix of an uploaded filename, including the leading dot.
///
/// Returns the last `.` followed by a run of ASCII alphanumerics, so
/// `report.final.csv` yields `.csv` and `notes` yields an empty string.
pub fn extension_of(filename: &str) -> String {
    let mut found = "";
    for (idx, _) in filename.match_indices('.') {
        let rest = &filename[idx + 1..];
        let run = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric())
            .count();
        if run > 0 {
            found = &rest[..run.min(MAX_EXTENSION_LEN)];
        }
    }
    if found.is_empty() {
        String::new()
    } else {
        format!(".{}", found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_uses_last_dotted_suffix() {
        assert_eq!(extension_of("report.final.csv"), ".csv");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("main.rs"), ".rs");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of("odd.c++"), ".c");
        assert_eq!(extension_of("photo.JPG?x"), ".JPG");
    }

    #[test]
    fn extension_is_capped() {
        let name = format!("file.{}", "x".repeat(40));
        assert_eq!(extension_of(&name).len(), MAX_EXTENSION_LEN + 1);
    }

    #[test]
    fn segment_safety() {
        assert!(is_safe_segment("Ab3x.txt"));
        assert!(!is_safe_segment(""));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment("-rf"));
        assert!(!is_safe_segment("bad\nname"));
        assert!(!is_safe_key(".tmp-1234"));
    }

    #[test]
    fn ipfs_key_safety() {
        assert!(is_safe_ipfs_key("QmbsN8cyhk4wpv29RKCf3ZrRZj7TWK3careKmv2btezbBu"));
        assert!(is_safe_ipfs_key("QmHash/notes.md"));
        assert!(!is_safe_ipfs_key("--api=evil"));
        assert!(!is_safe_ipfs_key("QmHash/../etc"));
        assert!(!is_safe_ipfs_key("QmHash/a/b"));
        assert!(!is_safe_ipfs_key("/QmHash"));
    }

    #[test]
    fn stored_paste_url_path() {
        let paste = StoredPaste {
            namespace: Namespace::named("md").unwrap(),
            key: "Qx7a.md".into(),
        };
        assert_eq!(paste.url_path(), "md/Qx7a.md");
    }
}
