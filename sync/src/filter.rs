//! Filename-based exclusion for mirrored changes

use std::path::Path;

/// Names that are never mirrored regardless of user configuration
const BASE_EXCLUDES: &[&str] = &[".DS_Store"];

/// Decides whether a changed path is excluded from mirroring.
///
/// Patterns are matched against the lowercased file name only. A pattern
/// matches when the name equals it or ends with it, so `.tmp` excludes every
/// `*.tmp` file and `thumbs.db` excludes that exact file.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}

impl PathFilter {
    /// Build a filter from user-supplied exclusion patterns
    pub fn new<S: AsRef<str>>(exclude: &[S]) -> Self {
        let mut patterns: Vec<String> = Vec::with_capacity(exclude.len() + BASE_EXCLUDES.len());

        let candidates = exclude
            .iter()
            .map(|p| p.as_ref())
            .chain(BASE_EXCLUDES.iter().copied());

        for pattern in candidates {
            let clean = pattern.trim().to_lowercase();
            if clean.is_empty() || patterns.contains(&clean) {
                continue;
            }
            patterns.push(clean);
        }

        Self { patterns }
    }

    /// Check if a path should be left alone by the engine
    pub fn should_ignore(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();

        let ignored = self
            .patterns
            .iter()
            .any(|pattern| name == *pattern || name.ends_with(pattern.as_str()));

        if ignored {
            tracing::debug!("Ignoring file: {}", path.display());
        }
        ignored
    }

    /// The effective, normalized exclusion set
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_base_exclude_always_present() {
        let filter = PathFilter::default();

        assert_eq!(filter.patterns(), &[".ds_store".to_string()]);
        assert!(filter.should_ignore(&PathBuf::from("/a/.DS_Store")));
        assert!(!filter.should_ignore(&PathBuf::from("/a/notes.txt")));
    }

    #[test]
    fn test_suffix_exclusion() {
        let filter = PathFilter::new(&[".tmp"]);

        assert!(filter.should_ignore(&PathBuf::from("/a/x.tmp")));
        assert!(filter.should_ignore(&PathBuf::from("/a/dir/X.TMP")));
        assert!(!filter.should_ignore(&PathBuf::from("/a/x.tmp.txt")));
    }

    #[test]
    fn test_patterns_are_trimmed_and_lowercased() {
        let filter = PathFilter::new(&["  Thumbs.DB ", "", "   "]);

        assert_eq!(filter.patterns(), &["thumbs.db".to_string(), ".ds_store".to_string()]);
        assert!(filter.should_ignore(&PathBuf::from("/pics/thumbs.db")));
    }

    #[test]
    fn test_default_matches_empty_exclude_list() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(PathFilter::default().patterns(), PathFilter::new(&empty).patterns());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ignored_paths_stay_below_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        let filter = PathFilter::new(&[".tmp"]);
        tracing::subscriber::with_default(subscriber, || {
            assert!(filter.should_ignore(&PathBuf::from("/a/scratch.tmp")));
        });

        assert!(captured.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_only_file_name_is_matched() {
        let filter = PathFilter::new(&["build"]);

        assert!(!filter.should_ignore(&PathBuf::from("/a/build/main.o")));
        assert!(filter.should_ignore(&PathBuf::from("/a/build")));
    }
}
