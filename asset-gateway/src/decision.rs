// asset-gateway/src/decision.rs
//! Turns a path class and an optional session into exactly one decision.

use common::{Role, SessionPayload};
use std::sync::Arc;

use crate::classifier::PathClass;
use crate::policy::{LegacyPage, PolicyTable, ProtectedPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Serve the requested path (after rewriting)
    PassThrough,
    RedirectTo(String),
    /// Serve this logical path instead of the requested one
    ServeAsset(String),
    NotFound,
}

/// The path as classified, plus the request target as the client sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedUrl {
    /// Percent-decoded path
    pub path: String,
    /// Raw path and query string, exactly as received
    pub original: String,
}

impl RequestedUrl {
    pub fn new(raw_path: &str, query: Option<&str>) -> Self {
        let path = match urlencoding::decode(raw_path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw_path.to_string(),
        };
        let original = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", raw_path, q),
            _ => raw_path.to_string(),
        };
        Self { path, original }
    }
}

#[derive(Debug, Clone)]
pub struct AccessDecisionEngine {
    policy: Arc<PolicyTable>,
}

impl AccessDecisionEngine {
    pub fn new(policy: Arc<PolicyTable>) -> Self {
        Self { policy }
    }

    pub fn decide(
        &self,
        class: PathClass<'_>,
        payload: Option<&SessionPayload>,
        requested: &RequestedUrl,
    ) -> AccessDecision {
        match class {
            PathClass::Api => AccessDecision::NotFound,
            PathClass::ProtectedExact(policy) | PathClass::ProtectedPrefix(policy) => {
                self.decide_protected(policy, payload, requested)
            }
            PathClass::GuestOnly(policy) => match payload {
                Some(_) => AccessDecision::RedirectTo(policy.redirect_to.clone()),
                None => AccessDecision::PassThrough,
            },
            PathClass::LegacyPage(page) => self.decide_legacy(page, payload, requested),
            PathClass::SpaRoute | PathClass::Unclassified => {
                self.decide_entry_document(payload, requested)
            }
            PathClass::StaticAsset => AccessDecision::ServeAsset(requested.path.clone()),
        }
    }

    /// Landing page for a signed-in user who may not see what they asked for
    pub fn home_for_role(&self, role: Role) -> &str {
        match role {
            Role::Mailbox => self.policy.mailbox_home(),
            _ => "/",
        }
    }

    /// Transitional page that retries `requested` once the client has a session
    pub fn loading_redirect(&self, requested: &RequestedUrl) -> AccessDecision {
        AccessDecision::RedirectTo(format!(
            "{}?redirect={}",
            self.policy.loading_page(),
            urlencoding::encode(&requested.original)
        ))
    }

    fn decide_protected(
        &self,
        policy: &ProtectedPolicy,
        payload: Option<&SessionPayload>,
        requested: &RequestedUrl,
    ) -> AccessDecision {
        let Some(payload) = payload else {
            return self.loading_redirect(requested);
        };

        if policy.allows(payload.role) {
            AccessDecision::PassThrough
        } else {
            tracing::debug!(
                role = %payload.role,
                area = policy.area.as_str(),
                "Role not allowed in protected area"
            );
            AccessDecision::RedirectTo(self.home_for_role(payload.role).to_string())
        }
    }

    fn decide_legacy(
        &self,
        page: LegacyPage,
        payload: Option<&SessionPayload>,
        requested: &RequestedUrl,
    ) -> AccessDecision {
        let Some(payload) = payload else {
            return self.loading_redirect(requested);
        };

        if page.admits(payload, self.policy.bootstrap_username()) {
            AccessDecision::ServeAsset(self.policy.legacy_document(page).to_string())
        } else {
            tracing::debug!(role = %payload.role, page = page.name(), "Legacy page denied");
            AccessDecision::RedirectTo("/".to_string())
        }
    }

    fn decide_entry_document(
        &self,
        payload: Option<&SessionPayload>,
        requested: &RequestedUrl,
    ) -> AccessDecision {
        let is_mailbox = payload.map(|p| p.role == Role::Mailbox).unwrap_or(false);
        if is_mailbox && self.policy.is_entry_alias(&requested.path) {
            return AccessDecision::RedirectTo(self.policy.mailbox_home().to_string());
        }
        AccessDecision::ServeAsset(self.policy.entry_document().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PathClassifier;
    use chrono::{Duration, Utc};
    use common::{PolicyConfig, ProtectedRule};

    struct Harness {
        classifier: PathClassifier,
        engine: AccessDecisionEngine,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(PolicyConfig::default())
        }

        // Deployment that gates individual client routes by role
        fn gated() -> Self {
            let mut config = PolicyConfig::default();
            config.protected_exact = vec![
                rule("/dashboard", &["admin", "user", "guest"], "admin-area"),
                rule("/compose", &["admin", "user", "mailbox"], "mailbox-area"),
                rule("/sent", &["admin", "user", "mailbox"], "mailbox-area"),
                rule("/settings", &["admin", "user"], "admin-area"),
            ];
            Self::with_config(config)
        }

        fn with_config(config: PolicyConfig) -> Self {
            let policy = Arc::new(PolicyTable::compile(&config).unwrap());
            Self {
                classifier: PathClassifier::new(policy.clone()),
                engine: AccessDecisionEngine::new(policy),
            }
        }

        fn decide(&self, target: &str, payload: Option<&SessionPayload>) -> AccessDecision {
            let (path, query) = match target.split_once('?') {
                Some((p, q)) => (p, Some(q)),
                None => (target, None),
            };
            let requested = RequestedUrl::new(path, query);
            let class = self.classifier.classify(&requested.path);
            self.engine.decide(class, payload, &requested)
        }
    }

    fn rule(path: &str, roles: &[&str], area: &str) -> ProtectedRule {
        ProtectedRule {
            path: path.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            area: area.to_string(),
        }
    }

    fn session(role: Role) -> SessionPayload {
        SessionPayload {
            role,
            username: format!("{role}-user"),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn redirect(to: &str) -> AccessDecision {
        AccessDecision::RedirectTo(to.to_string())
    }

    fn serve(path: &str) -> AccessDecision {
        AccessDecision::ServeAsset(path.to_string())
    }

    #[test]
    fn test_protected_prefix_without_session_goes_to_loading_page() {
        let h = Harness::new();
        assert_eq!(
            h.decide("/mailbox/anything", None),
            redirect("/templates/loading.html?redirect=%2Fmailbox%2Fanything")
        );
    }

    #[test]
    fn test_loading_redirect_round_trips_original_target() {
        let h = Harness::gated();
        let targets = [
            "/dashboard",
            "/settings?tab=profile&x=1",
            "/compose?to=a%40b.c",
            "/mailbox",
        ];
        for target in targets {
            let AccessDecision::RedirectTo(location) = h.decide(target, None) else {
                panic!("expected redirect for {target}");
            };
            let (page, query) = location.split_once('?').unwrap();
            assert_eq!(page, "/templates/loading.html");
            let (key, value) = query.split_once('=').unwrap();
            assert_eq!(key, "redirect");
            assert!(!value.contains('&'));
            assert_eq!(urlencoding::decode(value).unwrap(), target);
        }
    }

    #[test]
    fn test_wrong_role_goes_home_not_to_login() {
        let h = Harness::gated();
        assert_eq!(h.decide("/mailbox/inbox", Some(&session(Role::Admin))), redirect("/"));
        assert_eq!(h.decide("/settings", Some(&session(Role::Guest))), redirect("/"));
        assert_eq!(
            h.decide("/dashboard", Some(&session(Role::Mailbox))),
            redirect("/mailbox")
        );
    }

    #[test]
    fn test_allowed_role_passes_through() {
        let h = Harness::gated();
        assert_eq!(
            h.decide("/mailbox/inbox", Some(&session(Role::Mailbox))),
            AccessDecision::PassThrough
        );
        assert_eq!(
            h.decide("/admin/users", Some(&session(Role::Guest))),
            AccessDecision::PassThrough
        );
        assert_eq!(
            h.decide("/compose", Some(&session(Role::User))),
            AccessDecision::PassThrough
        );
    }

    #[test]
    fn test_api_is_always_not_found() {
        let h = Harness::new();
        let sessions = [None, Some(session(Role::Admin)), Some(session(Role::Mailbox))];
        for payload in &sessions {
            for path in ["/api/whatever", "/api", "/receive"] {
                assert_eq!(h.decide(path, payload.as_ref()), AccessDecision::NotFound);
            }
        }
    }

    #[test]
    fn test_guest_only_pages() {
        let h = Harness::new();
        assert_eq!(h.decide("/login", None), AccessDecision::PassThrough);
        for role in Role::ALL {
            assert_eq!(h.decide("/login", Some(&session(role))), redirect("/"));
            assert_eq!(h.decide("/login.html", Some(&session(role))), redirect("/"));
        }
    }

    #[test]
    fn test_static_assets_skip_authorization() {
        let h = Harness::new();
        assert_eq!(h.decide("/style.css", None), serve("/style.css"));
        assert_eq!(
            h.decide("/assets/app.js", Some(&session(Role::User))),
            serve("/assets/app.js")
        );
    }

    #[test]
    fn test_root_override_for_mailbox_sessions() {
        let h = Harness::new();
        assert_eq!(h.decide("/", Some(&session(Role::Mailbox))), redirect("/mailbox"));
        assert_eq!(
            h.decide("/index.html", Some(&session(Role::Mailbox))),
            redirect("/mailbox")
        );
        assert_eq!(h.decide("/", Some(&session(Role::Admin))), serve("/index.html"));
        assert_eq!(h.decide("/", None), serve("/index.html"));
        // only the entry aliases are overridden
        assert_eq!(
            h.decide("/some/client/route", Some(&session(Role::Mailbox))),
            serve("/index.html")
        );
    }

    #[test]
    fn test_spa_routes_serve_entry_document() {
        let h = Harness::new();
        for route in ["/dashboard", "/compose", "/sent", "/settings", "/login"] {
            let expected = if route == "/login" {
                AccessDecision::PassThrough
            } else {
                serve("/index.html")
            };
            assert_eq!(h.decide(route, None), expected, "{route}");
        }
        for role in Role::ALL {
            assert_eq!(h.decide("/dashboard", Some(&session(role))), serve("/index.html"));
            assert_eq!(h.decide("/settings", Some(&session(role))), serve("/index.html"));
        }
    }

    #[test]
    fn test_gated_spa_route_outranks_entry_document() {
        let h = Harness::gated();
        assert_eq!(
            h.decide("/dashboard", None),
            redirect("/templates/loading.html?redirect=%2Fdashboard")
        );
        assert_eq!(
            h.decide("/sent", Some(&session(Role::User))),
            AccessDecision::PassThrough
        );
    }

    #[test]
    fn test_single_mailbox_legacy_document() {
        let h = Harness::new();
        for role in Role::ALL {
            let expected = if role == Role::Mailbox {
                serve("/html/mailbox.html")
            } else {
                redirect("/")
            };
            for alias in ["/mailbox", "/mailbox.html", "/html/mailbox.html"] {
                assert_eq!(h.decide(alias, Some(&session(role))), expected, "{alias} {role}");
            }
        }
    }

    #[test]
    fn test_legacy_pages_without_session_keep_their_own_path() {
        let h = Harness::new();
        assert_eq!(
            h.decide("/admin.html", None),
            redirect("/templates/loading.html?redirect=%2Fadmin.html")
        );
        assert_eq!(
            h.decide("/html/mailboxes.html", None),
            redirect("/templates/loading.html?redirect=%2Fhtml%2Fmailboxes.html")
        );
    }

    #[test]
    fn test_admin_and_all_mailboxes_documents() {
        let h = Harness::new();
        assert_eq!(h.decide("/admin", Some(&session(Role::Mailbox))), serve("/html/admin.html"));
        assert_eq!(h.decide("/admin", Some(&session(Role::User))), redirect("/"));
        assert_eq!(
            h.decide("/mailboxes.html", Some(&session(Role::Admin))),
            serve("/html/mailboxes.html")
        );

        let unnamed = SessionPayload {
            username: String::new(),
            ..session(Role::Admin)
        };
        assert_eq!(h.decide("/mailboxes.html", Some(&unnamed)), redirect("/"));
    }

    #[test]
    fn test_encoded_paths_cannot_escape_namespaces() {
        let h = Harness::new();
        assert_eq!(
            h.decide("/%61dmin/secret.js", None),
            redirect("/templates/loading.html?redirect=%2F%2561dmin%2Fsecret.js")
        );
    }

    #[test]
    fn test_login_scenario_with_admin_session() {
        let h = Harness::new();
        assert_eq!(h.decide("/login", Some(&session(Role::Admin))), redirect("/"));
    }
}
