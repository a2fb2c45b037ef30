// asset-gateway/src/policy.rs
//! Immutable path policy, compiled once from [`PolicyConfig`] at startup.

use common::{PolicyConfig, ProtectedRule, Role};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy path '{0}' must start with '/'")]
    RelativePath(String),
    #[error("unknown role '{role}' in rule for '{path}'")]
    UnknownRole { path: String, role: String },
    #[error("rule for '{0}' allows no roles")]
    NoRoles(String),
    #[error("unknown area '{area}' in rule for '{path}'")]
    UnknownArea { path: String, area: String },
    #[error("mailbox home '{0}' refuses mailbox sessions and would redirect to itself")]
    MailboxHomeLoops(String),
}

/// Which landing area a protected path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaKind {
    AdminArea,
    MailboxArea,
}

impl AreaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaKind::AdminArea => "admin-area",
            AreaKind::MailboxArea => "mailbox-area",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPolicy {
    pub allowed_roles: HashSet<Role>,
    pub area: AreaKind,
}

impl ProtectedPolicy {
    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestOnlyPolicy {
    pub redirect_to: String,
}

/// Pre-SPA documents, each with its own authorization predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyPage {
    AdminDocument,
    SingleMailbox,
    AllMailboxes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExactRule {
    Api,
    Legacy(LegacyPage),
    GuestOnly(GuestOnlyPolicy),
    Protected(ProtectedPolicy),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PrefixRule {
    Api,
    Protected(ProtectedPolicy),
}

#[derive(Debug, Clone)]
pub struct PolicyTable {
    pub(crate) exact: HashMap<String, ExactRule>,
    // lowercase prefixes, longest first
    pub(crate) prefixes: Vec<(String, PrefixRule)>,
    pub(crate) spa_routes: HashSet<String>,
    legacy_documents: HashMap<LegacyPage, String>,
    legacy_aliases: Vec<(String, LegacyPage)>,
    entry_document: String,
    entry_aliases: HashSet<String>,
    loading_page: String,
    mailbox_home: String,
    bootstrap_username: Option<String>,
}

fn absolute(path: &str) -> Result<String, PolicyError> {
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Err(PolicyError::RelativePath(path.to_string()))
    }
}

fn compile_protected(rule: &ProtectedRule) -> Result<ProtectedPolicy, PolicyError> {
    let mut allowed_roles = HashSet::new();
    for role in &rule.roles {
        let parsed = role.parse::<Role>().map_err(|_| PolicyError::UnknownRole {
            path: rule.path.clone(),
            role: role.clone(),
        })?;
        allowed_roles.insert(parsed);
    }
    if allowed_roles.is_empty() {
        return Err(PolicyError::NoRoles(rule.path.clone()));
    }

    let area = match rule.area.as_str() {
        "admin-area" => AreaKind::AdminArea,
        "mailbox-area" => AreaKind::MailboxArea,
        other => {
            return Err(PolicyError::UnknownArea {
                path: rule.path.clone(),
                area: other.to_string(),
            })
        }
    };

    Ok(ProtectedPolicy { allowed_roles, area })
}

impl PolicyTable {
    /// Compile the plain configuration into lookup tables.
    ///
    /// Exact entries are inserted in precedence order (API, legacy pages,
    /// guest-only, protected), so a path listed twice keeps the stronger rule.
    pub fn compile(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let mut exact = HashMap::new();

        for path in &config.api_paths {
            exact.entry(absolute(path)?).or_insert(ExactRule::Api);
        }

        let legacy = [
            (LegacyPage::AdminDocument, &config.legacy_pages.admin),
            (LegacyPage::SingleMailbox, &config.legacy_pages.mailbox),
            (LegacyPage::AllMailboxes, &config.legacy_pages.all_mailboxes),
        ];
        let mut legacy_documents = HashMap::new();
        let mut legacy_aliases = Vec::new();
        for (page, page_config) in legacy {
            legacy_documents.insert(page, absolute(&page_config.document)?);
            for alias in &page_config.aliases {
                let alias = absolute(alias)?;
                legacy_aliases.push((alias.clone(), page));
                exact.entry(alias).or_insert(ExactRule::Legacy(page));
            }
        }

        for rule in &config.guest_only {
            exact.entry(absolute(&rule.path)?).or_insert(ExactRule::GuestOnly(GuestOnlyPolicy {
                redirect_to: absolute(&rule.redirect_to)?,
            }));
        }

        for rule in &config.protected_exact {
            let policy = compile_protected(rule)?;
            exact.entry(absolute(&rule.path)?).or_insert(ExactRule::Protected(policy));
        }

        let mut prefixes = Vec::new();
        for prefix in &config.api_prefixes {
            prefixes.push((absolute(prefix)?.to_ascii_lowercase(), PrefixRule::Api));
        }
        for rule in &config.protected_prefixes {
            let policy = compile_protected(rule)?;
            prefixes.push((
                absolute(&rule.path)?.to_ascii_lowercase(),
                PrefixRule::Protected(policy),
            ));
        }
        // stable sort keeps API ahead of a protected prefix of equal length
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let spa_routes = config
            .spa_routes
            .iter()
            .map(|route| absolute(route))
            .collect::<Result<HashSet<_>, _>>()?;

        let entry_aliases = config
            .entry_aliases
            .iter()
            .map(|alias| absolute(alias))
            .collect::<Result<HashSet<_>, _>>()?;

        let table = Self {
            exact,
            prefixes,
            spa_routes,
            legacy_documents,
            legacy_aliases,
            entry_document: absolute(&config.entry_document)?,
            entry_aliases,
            loading_page: absolute(&config.loading_page)?,
            mailbox_home: absolute(&config.mailbox_home)?,
            bootstrap_username: config.bootstrap_username.clone().filter(|u| !u.is_empty()),
        };

        if !table.mailbox_home_admits_mailbox() {
            return Err(PolicyError::MailboxHomeLoops(table.mailbox_home));
        }
        Ok(table)
    }

    /// First prefix rule matching `path`, ignoring ASCII case
    pub(crate) fn prefix_rule(&self, path: &str) -> Option<&PrefixRule> {
        let lowered = path.to_ascii_lowercase();
        self.prefixes
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix.as_str()))
            .map(|(_, rule)| rule)
    }

    // A mailbox session denied at its own home is sent home again
    fn mailbox_home_admits_mailbox(&self) -> bool {
        let home = self.mailbox_home.as_str();
        if self.entry_aliases.contains(home) {
            return false;
        }
        match self.exact.get(home) {
            Some(ExactRule::Protected(policy)) => policy.allows(Role::Mailbox),
            Some(ExactRule::Legacy(LegacyPage::AllMailboxes)) => false,
            Some(_) => true,
            None => match self.prefix_rule(home) {
                Some(PrefixRule::Protected(policy)) => policy.allows(Role::Mailbox),
                _ => true,
            },
        }
    }

    /// Physical document served for a legacy page
    pub fn legacy_document(&self, page: LegacyPage) -> &str {
        // compile() inserts all three pages
        self.legacy_documents
            .get(&page)
            .map(String::as_str)
            .unwrap_or(self.entry_document.as_str())
    }

    pub fn legacy_aliases(&self) -> impl Iterator<Item = (&str, LegacyPage)> {
        self.legacy_aliases.iter().map(|(alias, page)| (alias.as_str(), *page))
    }

    pub fn spa_routes(&self) -> impl Iterator<Item = &str> {
        self.spa_routes.iter().map(String::as_str)
    }

    pub fn entry_document(&self) -> &str {
        &self.entry_document
    }

    pub fn is_entry_alias(&self, path: &str) -> bool {
        self.entry_aliases.contains(path)
    }

    pub fn entry_aliases(&self) -> impl Iterator<Item = &str> {
        self.entry_aliases.iter().map(String::as_str)
    }

    pub fn loading_page(&self) -> &str {
        &self.loading_page
    }

    pub fn mailbox_home(&self) -> &str {
        &self.mailbox_home
    }

    pub fn bootstrap_username(&self) -> Option<&str> {
        self.bootstrap_username.as_deref()
    }
}
