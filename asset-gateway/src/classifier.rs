// asset-gateway/src/classifier.rs
use std::sync::Arc;

use crate::policy::{
    ExactRule, GuestOnlyPolicy, LegacyPage, PolicyTable, PrefixRule, ProtectedPolicy,
};

/// Policy class of a request path. Depends only on the path and the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass<'a> {
    Api,
    ProtectedExact(&'a ProtectedPolicy),
    ProtectedPrefix(&'a ProtectedPolicy),
    GuestOnly(&'a GuestOnlyPolicy),
    LegacyPage(LegacyPage),
    SpaRoute,
    StaticAsset,
    Unclassified,
}

impl PathClass<'_> {
    /// Whether the decision for this class looks at the session at all
    pub fn needs_session(&self) -> bool {
        !matches!(self, PathClass::Api | PathClass::StaticAsset)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PathClass::Api => "api",
            PathClass::ProtectedExact(_) => "protected-exact",
            PathClass::ProtectedPrefix(_) => "protected-prefix",
            PathClass::GuestOnly(_) => "guest-only",
            PathClass::LegacyPage(_) => "legacy-page",
            PathClass::SpaRoute => "spa-route",
            PathClass::StaticAsset => "static-asset",
            PathClass::Unclassified => "unclassified",
        }
    }
}

/// True when the final segment has an extension other than `.html`
pub fn is_static_asset(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.contains('.') && !last.to_ascii_lowercase().ends_with(".html")
}

#[derive(Debug, Clone)]
pub struct PathClassifier {
    policy: Arc<PolicyTable>,
}

impl PathClassifier {
    pub fn new(policy: Arc<PolicyTable>) -> Self {
        Self { policy }
    }

    // exact > prefix > static asset > SPA route > unclassified
    pub fn classify(&self, path: &str) -> PathClass<'_> {
        if let Some(rule) = self.policy.exact.get(path) {
            return match rule {
                ExactRule::Api => PathClass::Api,
                ExactRule::Legacy(page) => PathClass::LegacyPage(*page),
                ExactRule::GuestOnly(policy) => PathClass::GuestOnly(policy),
                ExactRule::Protected(policy) => PathClass::ProtectedExact(policy),
            };
        }

        if let Some(rule) = self.policy.prefix_rule(path) {
            return match rule {
                PrefixRule::Api => PathClass::Api,
                PrefixRule::Protected(policy) => PathClass::ProtectedPrefix(policy),
            };
        }

        if is_static_asset(path) {
            return PathClass::StaticAsset;
        }

        if self.policy.spa_routes.contains(path) {
            return PathClass::SpaRoute;
        }

        PathClass::Unclassified
    }
}
