// asset-gateway/src/gateway.rs
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use common::Config;
use std::sync::Arc;

use crate::asset_store::{AssetStore, DirectoryAssetStore};
use crate::classifier::PathClassifier;
use crate::decision::{AccessDecision, AccessDecisionEngine, RequestedUrl};
use crate::error::GatewayError;
use crate::policy::{PolicyError, PolicyTable};
use crate::rewriter::PathRewriter;
use crate::session::SessionTokenVerifier;

/// Entry point: classify, verify, decide, rewrite, then fetch or redirect.
pub struct AssetGateway {
    classifier: PathClassifier,
    verifier: SessionTokenVerifier,
    engine: AccessDecisionEngine,
    rewriter: PathRewriter,
    store: Option<Arc<dyn AssetStore>>,
}

impl AssetGateway {
    pub fn new(
        policy: Arc<PolicyTable>,
        verifier: SessionTokenVerifier,
        store: Option<Arc<dyn AssetStore>>,
    ) -> Self {
        Self {
            classifier: PathClassifier::new(policy.clone()),
            engine: AccessDecisionEngine::new(policy.clone()),
            rewriter: PathRewriter::from_policy(&policy),
            verifier,
            store,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, PolicyError> {
        let policy = Arc::new(PolicyTable::compile(&config.policy)?);
        let verifier = SessionTokenVerifier::from_config(&config.session);

        let store: Option<Arc<dyn AssetStore>> =
            match DirectoryAssetStore::from_config(&config.static_files) {
                Some(store) => {
                    tracing::info!("Serving assets from {}", store.root().display());
                    Some(Arc::new(store))
                },
                None => {
                    tracing::warn!(
                        "Static asset directory {} not found; asset requests will fail",
                        config.static_files.path
                    );
                    None
                }
            };

        Ok(Self::new(policy, verifier, store))
    }

    pub async fn handle(&self, req: &HttpRequest) -> Result<HttpResponse, GatewayError> {
        let requested = RequestedUrl::new(req.uri().path(), req.uri().query());
        let class = self.classifier.classify(&requested.path);

        let payload = if class.needs_session() {
            self.verifier.verify(req).await
        } else {
            None
        };

        let decision = self.engine.decide(class, payload.as_ref(), &requested);
        tracing::debug!(
            path = %requested.path,
            class = class.name(),
            authenticated = payload.is_some(),
            ?decision,
            "Access decision"
        );

        match decision {
            AccessDecision::NotFound => Ok(HttpResponse::NotFound()
                .content_type("text/plain; charset=utf-8")
                .body("API Not Found")),
            AccessDecision::RedirectTo(location) => Ok(HttpResponse::Found()
                .insert_header((header::LOCATION, location))
                .finish()),
            AccessDecision::PassThrough => {
                let physical = self.rewriter.resolve_pass_through(&requested.path);
                self.fetch(req, physical).await
            },
            AccessDecision::ServeAsset(logical) => {
                let physical = self.rewriter.rewrite(&logical);
                self.fetch(req, physical).await
            }
        }
    }

    async fn fetch(&self, req: &HttpRequest, path: &str) -> Result<HttpResponse, GatewayError> {
        let store = self.store.as_ref().ok_or_else(|| {
            tracing::error!("No asset store bound; cannot serve {}", path);
            GatewayError::StoreUnavailable
        })?;

        store.fetch(req, path).await.map_err(|e| {
            tracing::error!("Asset store failed for {}: {}", path, e);
            GatewayError::from(e)
        })
    }
}

// Default service handler: every path nobody else claimed lands here
async fn gateway_entry(
    req: HttpRequest,
    gateway: web::Data<AssetGateway>,
) -> Result<HttpResponse, GatewayError> {
    gateway.handle(&req).await
}

/// Register the gateway as the application's fallback service
pub fn configure(cfg: &mut web::ServiceConfig, gateway: web::Data<AssetGateway>) {
    cfg.app_data(gateway)
        .default_service(web::route().to(gateway_entry));
}
