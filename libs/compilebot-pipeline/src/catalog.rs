// Compiler catalog
// Maps language names and compiler ids to backend compilers and the option
// tokens each accepts. Built once at startup and shared read-only.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CatalogError;

/// Language aliases applied when the catalog comes from the backend's list
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("cpp", "c++"),
    ("cs", "c#"),
    ("csharp", "c#"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("sh", "bash script"),
    ("bash", "bash script"),
];

/// A backend compiler and the option tokens it accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCandidate {
    pub compiler_id: String,
    pub language: String,
    pub accepted_options: BTreeSet<String>,
}

impl CompilerCandidate {
    pub fn accepts(&self, token: &str) -> bool {
        self.accepted_options.contains(token)
    }
}

/// Alternative compiler/options pair tried after a recoverable failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCandidate {
    pub compiler: String,
    #[serde(default)]
    pub options: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    compilers: Vec<CompilerEntry>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CompilerEntry {
    id: String,
    language: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    fixes: Vec<FixCandidate>,
}

/// One entry of the backend's compiler list
#[derive(Debug, Deserialize)]
struct ListedCompiler {
    name: String,
    language: String,
    #[serde(default)]
    switches: Vec<ListedSwitch>,
}

#[derive(Debug, Deserialize)]
struct ListedSwitch {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    options: Vec<ListedSwitchOption>,
}

#[derive(Debug, Deserialize)]
struct ListedSwitchOption {
    name: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerCatalog {
    /// Keyed by lowercased compiler id
    compilers: HashMap<String, CompilerCandidate>,
    /// Lowercased language name to compiler ids, preferred compiler first
    languages: BTreeMap<String, Vec<String>>,
    aliases: HashMap<String, String>,
    fixes: HashMap<String, Vec<FixCandidate>>,
}

impl CompilerCatalog {
    /// Load the catalog file (`config/compilers.json` by default)
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;

        let mut catalog = Self::default();
        for entry in file.compilers {
            catalog.insert(CompilerCandidate {
                compiler_id: entry.id.clone(),
                language: entry.language,
                accepted_options: entry.options.into_iter().collect(),
            });
            if !entry.fixes.is_empty() {
                catalog.fixes.insert(entry.id.to_lowercase(), entry.fixes);
            }
        }
        for (alias, language) in file.aliases {
            catalog.add_alias(&alias, &language);
        }

        catalog.finish()
    }

    /// Build from the backend's compiler list document
    pub fn from_compiler_list(content: &str) -> Result<Self, CatalogError> {
        let listed: Vec<ListedCompiler> = serde_json::from_str(content)?;

        let mut catalog = Self::default();
        for compiler in listed {
            let accepted_options = compiler
                .switches
                .into_iter()
                .flat_map(|switch| {
                    switch
                        .name
                        .into_iter()
                        .chain(switch.options.into_iter().map(|o| o.name))
                })
                .collect();
            catalog.insert(CompilerCandidate {
                compiler_id: compiler.name,
                language: compiler.language,
                accepted_options,
            });
        }
        for (alias, language) in DEFAULT_ALIASES {
            catalog.add_alias(alias, language);
        }

        catalog.finish()
    }

    /// Download and build from the backend's compiler list
    pub async fn fetch_compiler_list(
        http: &reqwest::Client,
        url: &str,
    ) -> Result<Self, CatalogError> {
        info!(url = %url, "Downloading compiler list");
        let body = http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Self::from_compiler_list(&body)
    }

    /// Catalog file when it exists, otherwise the backend's compiler list
    pub async fn load_or_fetch(
        path: &Path,
        http: &reqwest::Client,
        list_url: &str,
    ) -> Result<Self, CatalogError> {
        if path.exists() {
            info!(path = %path.display(), "Loading compiler catalog");
            return Self::load(path);
        }
        warn!(path = %path.display(), "Catalog file not found, using the backend compiler list");
        Self::fetch_compiler_list(http, list_url).await
    }

    fn insert(&mut self, candidate: CompilerCandidate) {
        let id = candidate.compiler_id.to_lowercase();
        self.languages
            .entry(candidate.language.to_lowercase())
            .or_default()
            .push(id.clone());
        self.compilers.insert(id, candidate);
    }

    /// Aliases only count when they point at a listed language
    fn add_alias(&mut self, alias: &str, language: &str) {
        let language = language.to_lowercase();
        if self.languages.contains_key(&language) {
            self.aliases.insert(alias.to_lowercase(), language);
        }
    }

    fn finish(self) -> Result<Self, CatalogError> {
        if self.compilers.is_empty() {
            return Err(CatalogError::Empty);
        }
        debug!(
            compilers = self.compilers.len(),
            languages = self.languages.len(),
            "Compiler catalog built"
        );
        Ok(self)
    }

    fn language_key(&self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        if self.languages.contains_key(&name) {
            return Some(name);
        }
        self.aliases.get(&name).cloned()
    }

    pub fn is_valid_language(&self, name: &str) -> bool {
        self.language_key(name).is_some()
    }

    pub fn is_valid_compiler(&self, id: &str) -> bool {
        self.compilers.contains_key(&id.to_lowercase())
    }

    /// Resolve a compiler id, or a language to its preferred compiler
    pub fn resolve(&self, name_or_id: &str) -> Option<&CompilerCandidate> {
        if let Some(candidate) = self.compilers.get(&name_or_id.to_lowercase()) {
            return Some(candidate);
        }
        let language = self.language_key(name_or_id)?;
        self.languages
            .get(&language)?
            .first()
            .and_then(|id| self.compilers.get(id))
    }

    /// Other compilers for the same language, in listed order
    pub fn siblings(&self, compiler_id: &str) -> Vec<&CompilerCandidate> {
        let id = compiler_id.to_lowercase();
        let Some(candidate) = self.compilers.get(&id) else {
            return Vec::new();
        };
        self.languages
            .get(&candidate.language.to_lowercase())
            .map(|ids| {
                ids.iter()
                    .filter(|other| **other != id)
                    .filter_map(|other| self.compilers.get(other))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Configured fallbacks for a compiler
    pub fn fix_candidates(&self, compiler_id: &str) -> &[FixCandidate] {
        self.fixes
            .get(&compiler_id.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Language names with their compiler ids
    pub fn languages(&self) -> Vec<(String, Vec<String>)> {
        self.languages
            .iter()
            .map(|(language, ids)| {
                let ids = ids
                    .iter()
                    .filter_map(|id| self.compilers.get(id))
                    .map(|c| c.compiler_id.clone())
                    .collect();
                (language.clone(), ids)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.compilers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compilers.is_empty()
    }
}
