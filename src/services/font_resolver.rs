//! Local font index with exact and fuzzy name lookup.
//!
//! The fonts directory is scanned once at startup. Lookups normalize the
//! requested family name (lowercase, whitespace removed), try an exact hit,
//! then fall back to the first index entry that contains the query or is
//! contained by it. Matched fonts are returned as `data:` URIs for inline
//! `@font-face` declarations.

use base64::Engine as _;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Font file extensions picked up by the directory scan
const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "woff", "woff2"];

/// A font file ready to be embedded into a document
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFont {
    /// Index key that satisfied the lookup
    pub matched: String,
    pub mime: &'static str,
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
}

/// Immutable mapping from normalized font name to font file
#[derive(Debug, Default, Clone)]
pub struct FontIndex {
    fonts: HashMap<String, PathBuf>,
}

/// Lowercase and strip all whitespace
pub fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("otf") => "font/otf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "font/ttf",
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| FONT_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
        .unwrap_or(false)
}

impl FontIndex {
    /// Scan `dir` for font files. A missing or unreadable directory yields an empty index.
    pub fn scan(dir: &Path) -> Self {
        let mut fonts = HashMap::new();

        match std::fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_file() || !is_font_file(&path) {
                        continue;
                    }
                    let Some(key) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(normalize_font_name)
                    else {
                        continue;
                    };
                    let path = std::fs::canonicalize(&path).unwrap_or(path);
                    tracing::debug!(font = %key, path = %path.display(), "Indexed local font");
                    fonts.insert(key, path);
                }
            }
            Err(e) => {
                tracing::debug!(%e, dir = %dir.display(), "Fonts directory not readable");
            }
        }

        tracing::info!(
            font_count = fonts.len(),
            dir = %dir.display(),
            "Local font index built"
        );

        Self { fonts }
    }

    /// Build an index from explicit `(name, path)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PathBuf)>,
        S: AsRef<str>,
    {
        let fonts = entries
            .into_iter()
            .map(|(name, path)| (normalize_font_name(name.as_ref()), path))
            .collect();
        Self { fonts }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Indexed names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fonts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve `font_name` to embeddable font data.
    ///
    /// Returns `None` when nothing matches or every candidate fails to read;
    /// callers fall back to the declared family name.
    pub fn embed(&self, font_name: &str) -> Option<EmbeddedFont> {
        let query = normalize_font_name(font_name);
        if query.is_empty() {
            return None;
        }

        if let Some(path) = self.fonts.get(&query) {
            if let Some(font) = Self::read(&query, path) {
                tracing::debug!(font = %font_name, bytes = font.data_uri.len(), "Font matched exactly");
                return Some(font);
            }
        }

        // First hit wins; HashMap iteration order is unspecified.
        for (name, path) in &self.fonts {
            if *name == query {
                continue;
            }
            if name.contains(&query) || query.contains(name.as_str()) {
                if let Some(font) = Self::read(name, path) {
                    tracing::debug!(font = %font_name, matched = %name, "Font fuzzy matched");
                    return Some(font);
                }
            }
        }

        tracing::warn!(font = %font_name, "Local font not found, using fallback family");
        None
    }

    fn read(name: &str, path: &Path) -> Option<EmbeddedFont> {
        match std::fs::read(path) {
            Ok(bytes) => {
                let mime = mime_for(path);
                let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Some(EmbeddedFont {
                    matched: name.to_string(),
                    mime,
                    data_uri: format!("data:{mime};base64,{payload}"),
                })
            }
            Err(e) => {
                tracing::error!(%e, path = %path.display(), "Failed to read font file");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fonts_dir(files: &[(&str, &[u8])]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, data) in files {
            std::fs::write(dir.path().join(name), data).unwrap();
        }
        dir
    }

    #[test]
    fn test_normalize_font_name() {
        assert_eq!(normalize_font_name("Noto Sans SC"), "notosanssc");
        assert_eq!(normalize_font_name("  Source\tHan  "), "sourcehan");
        assert_eq!(normalize_font_name(""), "");
    }

    #[test]
    fn test_scan_picks_up_font_extensions_only() {
        let dir = fonts_dir(&[
            ("Regular.ttf", b"ttf"),
            ("Display.OTF", b"otf"),
            ("Icons.woff2", b"woff2"),
            ("readme.txt", b"text"),
        ]);

        let index = FontIndex::scan(dir.path());
        assert_eq!(index.len(), 3);
        assert_eq!(index.names(), vec!["display", "icons", "regular"]);
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let index = FontIndex::scan(Path::new("/nonexistent/fonts"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_exact_match_after_normalization() {
        let dir = fonts_dir(&[("NotoSerif.ttf", b"serif-bytes")]);
        let index = FontIndex::scan(dir.path());

        let font = index.embed("Noto SERIF").expect("exact match");
        assert_eq!(font.matched, "notoserif");
        assert_eq!(font.mime, "font/ttf");
        assert_eq!(font.data_uri, "data:font/ttf;base64,c2VyaWYtYnl0ZXM=");
    }

    #[test]
    fn test_fuzzy_match_query_inside_indexed_name() {
        let dir = fonts_dir(&[("HarmonyOS_Sans_SC_Bold.otf", b"x")]);
        let index = FontIndex::scan(dir.path());

        let font = index.embed("sans_sc").expect("fuzzy match");
        assert_eq!(font.matched, "harmonyos_sans_sc_bold");
        assert!(font.data_uri.starts_with("data:font/otf;base64,"));
    }

    #[test]
    fn test_fuzzy_match_indexed_name_inside_query() {
        let dir = fonts_dir(&[("kaiti.woff", b"x")]);
        let index = FontIndex::scan(dir.path());

        let font = index.embed("STKaiti Regular").expect("fuzzy match");
        assert_eq!(font.matched, "kaiti");
        assert_eq!(font.mime, "font/woff");
    }

    #[test]
    fn test_unrelated_name_is_absent() {
        let dir = fonts_dir(&[("kaiti.woff", b"x")]);
        let index = FontIndex::scan(dir.path());

        assert_eq!(index.embed("Helvetica"), None);
        assert_eq!(index.embed("   "), None);
    }

    #[test]
    fn test_unreadable_font_is_treated_as_miss() {
        let index = FontIndex::from_entries([("ghost", PathBuf::from("/nonexistent/ghost.ttf"))]);
        assert_eq!(index.embed("ghost"), None);
    }

    #[test]
    fn test_unreadable_exact_match_falls_through_to_fuzzy() {
        let dir = fonts_dir(&[("ghostbold.woff2", b"bold")]);
        let index = FontIndex::from_entries([
            ("ghost", PathBuf::from("/nonexistent/ghost.ttf")),
            ("ghostbold", dir.path().join("ghostbold.woff2")),
        ]);

        let font = index.embed("ghost").expect("fuzzy fallback");
        assert_eq!(font.matched, "ghostbold");
        assert_eq!(font.mime, "font/woff2");
    }
}
