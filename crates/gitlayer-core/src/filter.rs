//! Path filters resolved against repository-relative paths.
//!
//! An artifact is scoped by a working directory prefix (`cwd`) plus include
//! and exclude lists given relative to it. Resolution joins each entry with
//! the prefix and trims surrounding slashes, so matching never depends on
//! OS path semantics:
//!
//! ```text
//! cwd = "a", include = ["x/y/", "z"]  ->  include = ["a/x/y", "a/z"]
//! cwd = "a", include = []             ->  include = ["a"]
//! cwd = "",  include = []             ->  no restriction
//! ```

/// Canonicalizes a working directory: no leading or trailing slash, `.` and
/// `..` components folded. Empty and `/` both yield the empty prefix.
pub fn normalize_workdir(cwd: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in cwd.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Joins each path with `workdir` (when non-empty) and trims surrounding
/// slashes.
pub fn base_paths(paths: &[String], workdir: &str) -> Vec<String> {
    paths
        .iter()
        .map(|path| {
            let path = path.trim_matches('/');
            if workdir.is_empty() {
                path.to_owned()
            } else if path.is_empty() {
                workdir.to_owned()
            } else {
                format!("{workdir}/{path}")
            }
        })
        .collect()
}

/// A resolved include/exclude filter over repository-relative paths.
///
/// An empty include list means "everything". Entries match a path when they
/// are equal to it or name one of its parent directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PathFilter {
    /// Builds a filter from already resolved paths.
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Resolves an artifact's filter.
    ///
    /// The effective include set is `include` under `workdir` when non-empty,
    /// else `[workdir]` when `workdir` is set, else unrestricted. The effective
    /// exclude set is `base_excludes` (taken as is) followed by `exclude`
    /// under `workdir`.
    pub fn resolve(
        workdir: &str,
        include: &[String],
        exclude: &[String],
        base_excludes: &[String],
    ) -> Self {
        let include = if !include.is_empty() {
            base_paths(include, workdir)
        } else if !workdir.is_empty() {
            vec![workdir.to_owned()]
        } else {
            Vec::new()
        };
        Self {
            include,
            exclude: Self::excludes(workdir, exclude, base_excludes),
        }
    }

    /// Resolves a filter selecting exactly `paths` under `workdir`, keeping the
    /// artifact's excludes. Used for stage dependency fingerprints.
    pub fn for_paths(
        workdir: &str,
        paths: &[String],
        exclude: &[String],
        base_excludes: &[String],
    ) -> Self {
        Self {
            include: base_paths(paths, workdir),
            exclude: Self::excludes(workdir, exclude, base_excludes),
        }
    }

    fn excludes(workdir: &str, exclude: &[String], base_excludes: &[String]) -> Vec<String> {
        let mut all: Vec<String> = base_excludes
            .iter()
            .map(|p| p.trim_matches('/').to_owned())
            .collect();
        all.extend(base_paths(exclude, workdir));
        all
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Whether a repository-relative path passes the filter.
    pub fn matches(&self, path: &str) -> bool {
        if self.exclude.iter().any(|p| covers(p, path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| covers(p, path))
    }
}

fn covers(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
