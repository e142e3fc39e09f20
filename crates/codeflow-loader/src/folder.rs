//! Folder scanning into a flat tree index.
//!
//! The tree widget wants every item keyed by its path, with folders
//! listing their children's keys. The synthetic `root` item holds the top
//! level. Paths are relative to the scanned root and always use `/`.

use crate::error::Result;
use codeflow_core::Config;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const ROOT_KEY: &str = "root";

/// One entry of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    pub index: String,
    /// Keys of direct children, folders first then files, by name.
    pub children: Vec<String>,
    pub data: String,
    pub is_folder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTree {
    pub items: BTreeMap<String, TreeItem>,
}

impl FolderTree {
    /// Walks `root`, honouring `.gitignore` and the configured ignore list,
    /// and keeps files with a configured extension.
    pub fn scan(root: &Path, config: &Config) -> Result<Self> {
        let mut items = BTreeMap::new();
        items.insert(
            ROOT_KEY.to_string(),
            TreeItem {
                index: ROOT_KEY.to_string(),
                children: Vec::new(),
                data: "Root item".to_string(),
                is_folder: true,
            },
        );

        let filter = config.clone();
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(true, |name| !filter.is_ignored(name))
            });

        for result in builder.build() {
            let entry = result?;
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path();
            let is_folder = entry.file_type().is_some_and(|kind| kind.is_dir());
            if !is_folder && !config.matches_extension(path) {
                continue;
            }
            let Some(key) = relative_key(root, path) else {
                continue;
            };
            let parent = match key.rsplit_once('/') {
                Some((parent, _)) => parent.to_string(),
                None => ROOT_KEY.to_string(),
            };
            let name = entry.file_name().to_string_lossy().into_owned();

            if let Some(parent) = items.get_mut(&parent) {
                parent.children.push(key.clone());
            }
            items.insert(
                key.clone(),
                TreeItem {
                    index: key,
                    children: Vec::new(),
                    data: name,
                    is_folder,
                },
            );
        }

        let mut tree = Self { items };
        tree.order_children();
        debug!(root = %root.display(), items = tree.items.len(), "scanned folder");
        Ok(tree)
    }

    /// Folders before files, each by name.
    fn order_children(&mut self) {
        let folders: std::collections::HashSet<String> = self
            .items
            .values()
            .filter(|item| item.is_folder)
            .map(|item| item.index.clone())
            .collect();
        for item in self.items.values_mut() {
            item.children
                .sort_by(|a, b| folders.contains(b).cmp(&folders.contains(a)).then(a.cmp(b)));
        }
    }

    pub fn root(&self) -> Option<&TreeItem> {
        self.items.get(ROOT_KEY)
    }

    pub fn get(&self, key: &str) -> Option<&TreeItem> {
        self.items.get(key)
    }

    /// File keys in tree order.
    pub fn files(&self) -> Vec<&str> {
        let mut files = Vec::new();
        let mut stack = vec![ROOT_KEY];
        while let Some(key) = stack.pop() {
            let Some(item) = self.items.get(key) else {
                continue;
            };
            if !item.is_folder {
                files.push(item.index.as_str());
            }
            stack.extend(item.children.iter().rev().map(String::as_str));
        }
        files
    }
}

/// `path` relative to `root` as a forward-slash string.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let key = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    (!key.is_empty()).then_some(key)
}
