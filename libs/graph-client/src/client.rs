use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use crate::backoff;
use crate::body::{Body, MultipartBody};
use crate::config::GraphClientConfig;
use crate::context::CallContext;
use crate::error::{GraphError, RemoteError};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::transport::{self, ReqwestTransport, Transport};
use crate::types::ErrorContainer;

/// Graph API client.
///
/// Every call goes through the transport chain and the envelope decoder:
/// a malformed body is a decode error, a body carrying `error` is a
/// [`GraphError::Remote`], any other non-200 status is a
/// [`GraphError::UnexpectedStatus`], and only then is the payload decoded.
pub struct GraphClient {
    transport: Arc<dyn Transport>,
    config: GraphClientConfig,
}

impl GraphClient {
    /// Create client from configuration
    ///
    /// # Errors
    /// Returns [`GraphError::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: GraphClientConfig) -> Result<Self, GraphError> {
        let base = Arc::new(ReqwestTransport::new(config.timeout)?);
        Ok(Self::with_base_transport(config, base))
    }

    /// Build the standard chain around a custom innermost transport.
    #[must_use]
    pub fn with_base_transport(config: GraphClientConfig, base: Arc<dyn Transport>) -> Self {
        let transport = transport::chain(
            config.access_token.clone(),
            config.app_secret.clone(),
            config.retry_policy,
            base,
        );
        Self { transport, config }
    }

    /// Use `transport` as the complete chain.
    #[must_use]
    pub fn with_transport(config: GraphClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    #[must_use]
    pub fn config(&self) -> &GraphClientConfig {
        &self.config
    }

    /// Start a route against the configured host.
    pub fn route(&self, version: &str, path: impl Into<String>) -> Route {
        Route::new(version, path).with_base_url(self.config.base_url.clone())
    }

    pub(crate) async fn send(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<Response, GraphError> {
        self.transport.round_trip(ctx, request).await
    }

    /// Send `request` and run the reply through the envelope decoder.
    async fn exchange<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<T, GraphError> {
        let request_body = request.body().as_bytes().map(Bytes::copy_from_slice);
        let response = self.send(ctx, request).await?;
        self.handle_response(&response, request_body.as_deref())
    }

    pub(crate) fn handle_response<T: DeserializeOwned>(
        &self,
        response: &Response,
        request_body: Option<&[u8]>,
    ) -> Result<T, GraphError> {
        let body = response.body();
        let container: ErrorContainer = serde_json::from_slice(body)?;
        if let Some(err) = container.error {
            self.log_failure(response, Some(&err), request_body);
            return Err(err.into());
        }
        if response.status() != StatusCode::OK {
            self.log_failure(response, None, request_body);
            return Err(unexpected_status(response));
        }
        Ok(serde_json::from_slice(body)?)
    }

    fn log_failure(
        &self,
        response: &Response,
        remote: Option<&RemoteError>,
        request_body: Option<&[u8]>,
    ) {
        let url = response.redacted_url();
        let body = request_body
            .map(|b| truncate(b, self.config.log_body_limit))
            .unwrap_or_default();
        match remote {
            Some(err) => warn!(
                %url,
                method = %response.method(),
                status = response.status().as_u16(),
                message = %err.message,
                error_type = %err.kind,
                code = err.code,
                error_subcode = err.error_subcode,
                fbtrace_id = %err.fbtrace_id,
                is_transient = err.is_transient,
                error_user_title = %err.error_user_title,
                error_user_msg = %err.error_user_msg,
                error_data = ?err.error_data,
                request_body = %body,
                "graph api returned an error"
            ),
            None => warn!(
                %url,
                method = %response.method(),
                status = response.status().as_u16(),
                request_body = %body,
                "graph api returned an unexpected status"
            ),
        }
    }

    /// GET `url` and decode the reply.
    ///
    /// # Errors
    /// Transport, decode, remote and unexpected-status errors.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<T, GraphError> {
        let request = Request::builder().url(url).build()?;
        self.exchange(ctx, request).await
    }

    /// POST `body` as JSON and decode the reply.
    ///
    /// # Errors
    /// Same as [`GraphClient::get_json`], plus body serialization errors.
    pub async fn post_json<T, B>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: &B,
    ) -> Result<T, GraphError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = Request::builder()
            .method(Method::POST)
            .url(url)
            .json_body(Body::from_json(body)?)
            .build()?;
        self.exchange(ctx, request).await
    }

    /// POST without a body and decode the reply.
    ///
    /// # Errors
    /// Same as [`GraphClient::get_json`].
    pub async fn post<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<T, GraphError> {
        let request = Request::builder().method(Method::POST).url(url).build()?;
        self.exchange(ctx, request).await
    }

    /// DELETE with a JSON body and decode the reply.
    ///
    /// # Errors
    /// Same as [`GraphClient::post_json`].
    pub async fn delete_json<T, B>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: &B,
    ) -> Result<T, GraphError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = Request::builder()
            .method(Method::DELETE)
            .url(url)
            .json_body(Body::from_json(body)?)
            .build()?;
        self.exchange(ctx, request).await
    }

    /// POST an urlencoded form and decode the reply.
    ///
    /// # Errors
    /// Same as [`GraphClient::get_json`].
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, GraphError> {
        let request = Request::builder()
            .method(Method::POST)
            .url(url)
            .form_body(Body::from_form(form)?)
            .build()?;
        self.exchange(ctx, request).await
    }

    /// POST an urlencoded form, only checking the reply for an `error`.
    /// Nothing is sent for an empty form.
    ///
    /// # Errors
    /// Transport, decode and remote errors.
    pub async fn post_values(
        &self,
        ctx: &CallContext,
        url: &str,
        values: &[(&str, &str)],
    ) -> Result<(), GraphError> {
        if values.is_empty() {
            return Ok(());
        }
        let request = Request::builder()
            .method(Method::POST)
            .url(url)
            .form_body(Body::from_form(values)?)
            .build()?;
        let response = self.send(ctx, request).await?;
        let container: ErrorContainer = serde_json::from_slice(response.body())?;
        match container.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Bare DELETE; any status but 200 is an error.
    ///
    /// # Errors
    /// Transport and unexpected-status errors.
    pub async fn delete(&self, ctx: &CallContext, url: &str) -> Result<(), GraphError> {
        let request = Request::builder().method(Method::DELETE).url(url).build()?;
        let response = self.send(ctx, request).await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected_status(&response));
        }
        Ok(())
    }

    /// Upload the contents of `reader` as a multipart form, retrying the
    /// whole exchange with the upload policy.
    ///
    /// `extra_fields` become text parts; the file goes under
    /// [`UPLOAD_FILE_FIELD`](crate::body::UPLOAD_FILE_FIELD).
    ///
    /// # Errors
    /// I/O errors reading `reader`, and the last error of the final attempt.
    pub async fn upload_file<T, R>(
        &self,
        ctx: &CallContext,
        url: &str,
        file_name: &str,
        mut reader: R,
        extra_fields: &[(&str, &str)],
    ) -> Result<T, GraphError>
    where
        T: DeserializeOwned,
        R: AsyncRead + Unpin + Send,
    {
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await?;
        let form = MultipartBody {
            fields: extra_fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            file_name: file_name.to_owned(),
            contents: Bytes::from(contents),
        };
        let request = Request::builder()
            .method(Method::POST)
            .url(url)
            .body(form)
            .build()?;

        backoff::retry(ctx, self.config.upload_retry_policy, |_| true, |_| {
            let request = request.clone();
            async move {
                let response = self.send(ctx, request).await?;
                self.handle_response(&response, None)
            }
        })
        .await
    }
}

fn unexpected_status(response: &Response) -> GraphError {
    GraphError::UnexpectedStatus {
        status: response.status(),
        method: response.method().clone(),
        url: response.redacted_url(),
    }
}

/// Lossy UTF-8 view of `body`, cut at `limit` bytes on a char boundary.
/// A limit of 0 disables truncation.
pub(crate) fn truncate(body: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if limit == 0 || text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated_after_{limit}_bytes]", &text[..end])
}
