// asset-gateway/src/rewriter.rs
use std::collections::HashMap;

use crate::classifier::is_static_asset;
use crate::policy::PolicyTable;

/// Logical path -> physical asset path. Only consulted after the access decision.
#[derive(Debug, Clone)]
pub struct PathRewriter {
    table: HashMap<String, String>,
    entry_document: String,
}

impl PathRewriter {
    pub fn from_policy(policy: &PolicyTable) -> Self {
        let entry_document = policy.entry_document().to_string();
        let mut table = HashMap::new();

        for route in policy.spa_routes() {
            table.insert(route.to_string(), entry_document.clone());
        }
        for alias in policy.entry_aliases() {
            table.insert(alias.to_string(), entry_document.clone());
        }
        // legacy aliases override SPA routes sharing the same path
        for (alias, page) in policy.legacy_aliases() {
            table.insert(alias.to_string(), policy.legacy_document(page).to_string());
        }

        Self { table, entry_document }
    }

    pub fn rewrite<'a>(&'a self, logical: &'a str) -> &'a str {
        self.table.get(logical).map(String::as_str).unwrap_or(logical)
    }

    /// Physical path for a pass-through decision.
    ///
    /// Unmapped extensionless paths are client-side routes and get the entry document.
    pub fn resolve_pass_through<'a>(&'a self, logical: &'a str) -> &'a str {
        let physical = self.rewrite(logical);
        let is_document = logical.to_ascii_lowercase().ends_with(".html");
        if physical == logical && !is_static_asset(logical) && !is_document {
            &self.entry_document
        } else {
            physical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PolicyConfig;

    fn rewriter() -> PathRewriter {
        PathRewriter::from_policy(&PolicyTable::compile(&PolicyConfig::default()).unwrap())
    }

    #[test]
    fn spa_routes_map_to_entry_document() {
        let rewriter = rewriter();
        for route in ["/dashboard", "/compose", "/sent", "/settings", "/login", "/"] {
            assert_eq!(rewriter.rewrite(route), "/index.html", "{route}");
        }
    }

    #[test]
    fn legacy_aliases_map_to_their_documents() {
        let rewriter = rewriter();
        assert_eq!(rewriter.rewrite("/admin"), "/html/admin.html");
        assert_eq!(rewriter.rewrite("/admin.html"), "/html/admin.html");
        assert_eq!(rewriter.rewrite("/mailbox"), "/html/mailbox.html");
        assert_eq!(rewriter.rewrite("/mailbox.html"), "/html/mailbox.html");
        assert_eq!(rewriter.rewrite("/mailboxes"), "/html/mailboxes.html");
        assert_eq!(rewriter.rewrite("/mailboxes.html"), "/html/mailboxes.html");
    }

    #[test]
    fn unmapped_paths_are_unchanged() {
        let rewriter = rewriter();
        assert_eq!(rewriter.rewrite("/style.css"), "/style.css");
        assert_eq!(rewriter.rewrite("/mailbox/inbox"), "/mailbox/inbox");
        assert_eq!(rewriter.rewrite("/html/admin.html"), "/html/admin.html");
    }

    #[test]
    fn pass_through_falls_back_to_entry_document() {
        let rewriter = rewriter();
        assert_eq!(rewriter.resolve_pass_through("/mailbox/inbox"), "/index.html");
        assert_eq!(rewriter.resolve_pass_through("/login"), "/index.html");
        assert_eq!(rewriter.resolve_pass_through("/mailbox/app.js"), "/mailbox/app.js");
        assert_eq!(rewriter.resolve_pass_through("/admin/report.html"), "/admin/report.html");
        assert_eq!(rewriter.resolve_pass_through("/login.html"), "/login.html");
    }
}
