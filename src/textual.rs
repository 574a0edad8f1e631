//! # Textual
//!
//! The type selector for `TransferType::Auto`: a transfer is textual iff
//! the file name has an extension and the (lowercased) extension is
//! recognized by the configured recognizer.

use std::collections::HashSet;

use crate::types::TransferType;

/// Decides whether a file extension denotes textual contents.
pub trait TextualExtensionRecognizer: Send {
    /// `ext` is already lowercased and does not include the dot.
    fn is_textual(&self, ext: &str) -> bool;
}

/// Extensions commonly carrying textual contents.
const TEXTUAL_EXTS: &[&str] = &[
    "asp", "bat", "c", "cfm", "cgi", "conf", "cpp", "css", "csv", "dhtml", "diff", "h", "hpp",
    "htm", "html", "ini", "java", "js", "json", "jsp", "log", "m4", "md", "patch", "php", "pl",
    "properties", "py", "rb", "rs", "sgml", "sh", "shtml", "sql", "svg", "tcl", "tex", "toml",
    "tsv", "txt", "uue", "vbs", "xhtml", "xml", "yaml", "yml",
];

/// The default recognizer, backed by a table of well-known textual
/// extensions.
pub struct DefaultTextualExtensionRecognizer {
    exts: HashSet<&'static str>,
}

impl Default for DefaultTextualExtensionRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultTextualExtensionRecognizer {
    pub fn new() -> Self {
        Self {
            exts: TEXTUAL_EXTS.iter().copied().collect(),
        }
    }
}

impl TextualExtensionRecognizer for DefaultTextualExtensionRecognizer {
    fn is_textual(&self, ext: &str) -> bool {
        self.exts.contains(ext)
    }
}

/// A recognizer built from a caller-supplied extension set.
pub struct ParametricTextualExtensionRecognizer {
    exts: HashSet<String>,
}

impl ParametricTextualExtensionRecognizer {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exts: exts
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn add_extension(&mut self, ext: &str) {
        self.exts.insert(ext.to_lowercase());
    }
}

impl TextualExtensionRecognizer for ParametricTextualExtensionRecognizer {
    fn is_textual(&self, ext: &str) -> bool {
        self.exts.contains(ext)
    }
}

/// Resolve the effective type of a transfer from the file name: textual
/// iff the name has a non-empty extension that is not the whole name and
/// the recognizer accepts it.
pub(crate) fn detect_type(
    file_name: &str,
    recognizer: &dyn TextualExtensionRecognizer,
) -> TransferType {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            if recognizer.is_textual(&ext.to_lowercase()) {
                TransferType::Textual
            } else {
                TransferType::Binary
            }
        }
        _ => TransferType::Binary,
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_detect_textual_extensions() {
        let rec = DefaultTextualExtensionRecognizer::new();
        assert_eq!(detect_type("notes.txt", &rec), TransferType::Textual);
        assert_eq!(detect_type("README.MD", &rec), TransferType::Textual);
        assert_eq!(detect_type("archive.tar.gz", &rec), TransferType::Binary);
        assert_eq!(detect_type("image.png", &rec), TransferType::Binary);
    }

    #[test]
    fn should_fall_back_to_binary_without_extension() {
        let rec = DefaultTextualExtensionRecognizer::new();
        assert_eq!(detect_type("Makefile", &rec), TransferType::Binary);
        // trailing dot: empty extension
        assert_eq!(detect_type("weird.", &rec), TransferType::Binary);
        // the whole name is the "extension"
        assert_eq!(detect_type(".bashrc", &rec), TransferType::Binary);
    }

    #[test]
    fn parametric_recognizer() {
        let mut rec = ParametricTextualExtensionRecognizer::new(["foo", "BAR"]);
        assert!(rec.is_textual("foo"));
        assert!(rec.is_textual("bar"));
        assert!(!rec.is_textual("baz"));
        rec.add_extension("BAZ");
        assert!(rec.is_textual("baz"));
        assert_eq!(detect_type("a.FOO", &rec), TransferType::Textual);
    }
}
