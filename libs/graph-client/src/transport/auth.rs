use std::sync::Arc;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use super::Transport;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::request::Request;
use crate::response::Response;

const ACCESS_TOKEN_PARAM: &str = "access_token";
const APP_SECRET_PROOF_PARAM: &str = "appsecret_proof";

/// Signs every request with an access token and its app secret proof.
pub struct AuthTransport {
    access_token: String,
    app_secret: String,
    next: Arc<dyn Transport>,
}

impl AuthTransport {
    pub fn new(
        access_token: impl Into<String>,
        app_secret: impl Into<String>,
        next: Arc<dyn Transport>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            app_secret: app_secret.into(),
            next,
        }
    }
}

#[async_trait]
impl Transport for AuthTransport {
    async fn round_trip(
        &self,
        ctx: &CallContext,
        mut request: Request,
    ) -> Result<Response, GraphError> {
        let token = ctx.access_token().unwrap_or(self.access_token.as_str());
        let proof = app_secret_proof(&self.app_secret, token)?;

        let url = request.url_mut();
        set_query_param(url, ACCESS_TOKEN_PARAM, token);
        set_query_param(url, APP_SECRET_PROOF_PARAM, &proof);

        self.next.round_trip(ctx, request).await
    }
}

/// Hex encoded HMAC-SHA256 of `access_token`, keyed with `app_secret`.
///
/// # Errors
/// Returns [`GraphError::Config`] if the key is rejected by the MAC.
pub fn app_secret_proof(app_secret: &str, access_token: &str) -> Result<String, GraphError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
        .map_err(|e| GraphError::Config(format!("invalid app secret: {e}")))?;
    mac.update(access_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Replace every occurrence of `key` in the query with a single `key=value`.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
}
