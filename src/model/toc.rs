use std::collections::HashSet;

/// A node of the table of contents.
///
/// Grouping nodes have no `href`; they exist only to hold children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TocEntry {
    pub title: String,
    /// Href of the target resource (no fragment).
    pub href: Option<String>,
    pub fragment_id: Option<String>,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    /// Entry pointing at `href`, which may carry a `#fragment`.
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        let href = href.into();
        let (path, fragment) = crate::path::split_fragment(&href);
        Self {
            title: title.into(),
            href: Some(path.to_string()),
            fragment_id: fragment.filter(|f| !f.is_empty()).map(str::to_string),
            children: Vec::new(),
        }
    }

    /// Entry without a target.
    pub fn group(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }

    /// `href#fragment`, or `None` for grouping nodes.
    pub fn complete_href(&self) -> Option<String> {
        let href = self.href.as_ref()?;
        Some(match &self.fragment_id {
            Some(fragment) => format!("{href}#{fragment}"),
            None => href.clone(),
        })
    }
}

/// Hierarchical navigation index. Independent of spine order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    pub entries: Vec<TocEntry>,
}

impl TableOfContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: TocEntry) {
        self.entries.push(entry);
    }

    /// Walk (creating as needed) the nodes named by `title_path` and attach
    /// `href` to the last one. Existing siblings with a matching title are
    /// reused. Returns `None` for an empty path.
    pub fn add_section(&mut self, href: Option<&str>, title_path: &[&str]) -> Option<&mut TocEntry> {
        let (last, parents) = title_path.split_last()?;

        let mut level = &mut self.entries;
        for title in parents {
            level = &mut find_or_insert(level, title).children;
        }
        let entry = find_or_insert(level, last);
        if let Some(href) = href {
            let (path, fragment) = crate::path::split_fragment(href);
            entry.href = Some(path.to_string());
            entry.fragment_id = fragment.filter(|f| !f.is_empty()).map(str::to_string);
        }
        Some(entry)
    }

    /// Hrefs reachable from the tree in pre-order, each listed once at its
    /// first appearance.
    pub fn all_unique_resources(&self) -> Vec<&str> {
        fn walk<'a>(entries: &'a [TocEntry], seen: &mut HashSet<&'a str>, out: &mut Vec<&'a str>) {
            for entry in entries {
                if let Some(href) = entry.href.as_deref()
                    && seen.insert(href)
                {
                    out.push(href);
                }
                walk(&entry.children, seen, out);
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        walk(&self.entries, &mut seen, &mut out);
        out
    }

    /// Number of levels: 0 for an empty tree, 1 when all entries are at the
    /// top level, 3 for top -> child -> grandchild.
    pub fn depth(&self) -> usize {
        fn depth_of(entries: &[TocEntry]) -> usize {
            entries
                .iter()
                .map(|e| 1 + depth_of(&e.children))
                .max()
                .unwrap_or(0)
        }
        depth_of(&self.entries)
    }

    /// Total number of entries at every level.
    pub fn total_size(&self) -> usize {
        fn count(entries: &[TocEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.entries)
    }

    /// Pre-order iterator over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &TocEntry> {
        let mut stack: Vec<&TocEntry> = self.entries.iter().rev().collect();
        std::iter::from_fn(move || {
            let entry = stack.pop()?;
            stack.extend(entry.children.iter().rev());
            Some(entry)
        })
    }

    /// Apply `f` to every entry, depth first.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut TocEntry),
    {
        fn walk<F: FnMut(&mut TocEntry)>(entries: &mut [TocEntry], f: &mut F) {
            for entry in entries {
                f(entry);
                walk(&mut entry.children, f);
            }
        }
        walk(&mut self.entries, &mut f);
    }

    pub(crate) fn rename(&mut self, old_href: &str, new_href: &str) {
        self.for_each_mut(|entry| {
            if entry.href.as_deref() == Some(old_href) {
                entry.href = Some(new_href.to_string());
            }
        });
    }

    /// Unlink entries pointing at `href`. Entries left without a target and
    /// without children are dropped.
    pub(crate) fn remove_resource(&mut self, href: &str) {
        fn prune(entries: &mut Vec<TocEntry>, href: &str) {
            for entry in entries.iter_mut() {
                if entry.href.as_deref() == Some(href) {
                    entry.href = None;
                    entry.fragment_id = None;
                }
                prune(&mut entry.children, href);
            }
            entries.retain(|e| e.href.is_some() || !e.children.is_empty());
        }
        prune(&mut self.entries, href);
    }
}

fn find_or_insert<'a>(level: &'a mut Vec<TocEntry>, title: &str) -> &'a mut TocEntry {
    match level.iter().position(|e| e.title == title) {
        Some(i) => &mut level[i],
        None => {
            level.push(TocEntry::group(title));
            let last = level.len() - 1;
            &mut level[last]
        }
    }
}
