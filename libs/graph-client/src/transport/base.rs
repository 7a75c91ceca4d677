use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::Transport;
use crate::body::{Body, MultipartBody, UPLOAD_FILE_FIELD};
use crate::context::CallContext;
use crate::error::GraphError;
use crate::request::Request;
use crate::response::Response;

/// Innermost transport: performs the exchange with `reqwest` and buffers
/// the whole response body.
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a per-request timeout.
    ///
    /// # Errors
    /// Returns [`GraphError::Config`] if the underlying client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, GraphError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphError::Config(e.to_string()))?;
        Ok(Self { http_client })
    }

    /// Wrap an already configured client.
    #[must_use]
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<Response, GraphError> {
        let (method, url, headers, body) = request.into_parts();

        let mut req_builder = self
            .http_client
            .request(method.clone(), url.clone())
            .headers(headers);
        req_builder = match body {
            Body::Empty => req_builder,
            Body::Bytes(bytes) => req_builder.body(bytes),
            Body::Multipart(multipart) => req_builder.multipart(into_form(multipart)),
        };

        let exchange = async move {
            let resp = req_builder.send().await.map_err(map_reqwest_error)?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes().await.map_err(map_reqwest_error)?;
            Ok::<_, GraphError>(Response::new(status, headers, body, method, url))
        };

        tokio::select! {
            result = exchange => result,
            () = ctx.cancellation().cancelled() => Err(GraphError::Cancelled),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GraphError {
    if e.is_timeout() {
        GraphError::Timeout(e.to_string())
    } else if e.is_connect() {
        GraphError::Connection(e.to_string())
    } else {
        GraphError::Reqwest(e)
    }
}

/// Multipart forms are single-use, so one is rebuilt for every attempt.
fn into_form(body: MultipartBody) -> Form {
    let MultipartBody {
        fields,
        file_name,
        contents,
    } = body;
    let form = fields
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value));
    form.part(
        UPLOAD_FILE_FIELD,
        Part::bytes(contents.to_vec()).file_name(file_name),
    )
}
