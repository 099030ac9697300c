use crate::domain::model::{ChunkRange, RemoteItem};
use crate::domain::ports::{ByteStream, ConfigProvider, RemoteStore, UploadRequest};
use crate::store::chunked::upload_in_chunks;
use crate::utils::cancel::cancellable;
use crate::utils::error::{DriveError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Message the drive returns when downloading an item that has no bytes.
pub const NO_CONTENT_MARKER: &str = "The specified item does not have content";

#[derive(Debug, Deserialize)]
struct ItemPage {
    #[serde(default)]
    value: Vec<RemoteItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSession {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for a Graph-style drive API.
///
/// The caller supplies the bearer token; acquiring or refreshing it is not
/// handled here.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl GraphClient {
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base, access_token)
    }

    pub fn with_client(
        client: Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            access_token: access_token.into(),
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self::with_client(
            client,
            config.api_base(),
            config.access_token(),
        ))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)?;
        url.path_segments_mut()
            .map_err(|_| DriveError::ConfigError {
                message: format!("API base '{}' cannot carry a path", self.api_base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn item_endpoint(&self, item: &RemoteItem, suffix: &[&str]) -> Result<Url> {
        let mut segments = vec!["me", "drive", "items", item.id.as_str()];
        segments.extend_from_slice(suffix);
        self.endpoint(&segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    /// 送出請求；非 2xx 回應轉成 DriveError
    async fn execute(&self, request: RequestBuilder, ct: &CancellationToken) -> Result<Response> {
        let response = cancellable(ct, async { Ok::<_, DriveError>(request.send().await?) }).await?;
        tracing::debug!("📡 {} {}", response.status(), response.url());

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn fetch_item(&self, request: RequestBuilder, ct: &CancellationToken) -> Result<RemoteItem> {
        let response = self.execute(request, ct).await?;
        cancellable(ct, async { Ok::<_, DriveError>(response.json::<RemoteItem>().await?) }).await
    }

    async fn put_chunk(
        client: Client,
        upload_url: String,
        range: ChunkRange,
        data: Bytes,
    ) -> Result<Option<RemoteItem>> {
        // 上傳 URL 已預先授權，不帶 bearer token
        let response = client
            .put(&upload_url)
            .header(CONTENT_RANGE, range.content_range())
            .body(data)
            .send()
            .await?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<RemoteItem>().await?)),
            _ => Err(error_from_response(response).await),
        }
    }
}

/// Decode a Graph error body. Falls back to the status text when the body is
/// not the usual `{"error": {...}}` envelope.
async fn error_from_response(response: Response) -> DriveError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => (parsed.error.code, parsed.error.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("unknown").to_string(),
            body,
        ),
    };

    DriveError::Remote {
        status: status.as_u16(),
        code,
        message,
    }
}

/// Download-only: the drive reports a content-less item through its error
/// message, which becomes the typed variant here.
fn typed_no_content(error: DriveError) -> DriveError {
    match error {
        DriveError::Remote { ref message, .. } if message.contains(NO_CONTENT_MARKER) => {
            DriveError::ContentNotAvailable
        }
        other => other,
    }
}

#[async_trait]
impl RemoteStore for GraphClient {
    async fn get_item(&self, path: &str, ct: &CancellationToken) -> Result<Option<RemoteItem>> {
        let trimmed = path.trim_matches('/');
        let url = if trimmed.is_empty() {
            self.endpoint(&["me", "drive", "root"])?
        } else {
            let mut segments = vec!["me", "drive", "root:"];
            segments.extend(trimmed.split('/').filter(|s| !s.is_empty()));
            self.endpoint(&segments)?
        };

        tracing::debug!("📡 Looking up '{}'", path);
        match self.fetch_item(self.authorized(self.client.get(url)), ct).await {
            Ok(item) => Ok(Some(item)),
            Err(DriveError::Remote { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_children(
        &self,
        item: &RemoteItem,
        ct: &CancellationToken,
    ) -> Result<Vec<RemoteItem>> {
        let mut next = Some(self.item_endpoint(item, &["children"])?.to_string());
        let mut children = Vec::new();

        while let Some(url) = next.take() {
            let response = self.execute(self.authorized(self.client.get(&url)), ct).await?;
            let page: ItemPage =
                cancellable(ct, async { Ok::<_, DriveError>(response.json::<ItemPage>().await?) }).await?;
            children.extend(page.value);
            next = page.next_link;
        }

        tracing::debug!("📡 Listed {} children of '{}'", children.len(), item.name);
        Ok(children)
    }

    async fn delete(&self, item: &RemoteItem, ct: &CancellationToken) -> Result<()> {
        let url = self.item_endpoint(item, &[])?;
        self.execute(self.authorized(self.client.delete(url)), ct)
            .await?;
        tracing::debug!("📡 Deleted '{}'", item.name);
        Ok(())
    }

    async fn download(&self, item: &RemoteItem, ct: &CancellationToken) -> Result<ByteStream> {
        let url = self.item_endpoint(item, &["content"])?;
        let response = self
            .execute(self.authorized(self.client.get(url)), ct)
            .await
            .map_err(typed_no_content)?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)) as ByteStream)
    }

    async fn upload_file(
        &self,
        parent: &RemoteItem,
        request: UploadRequest<'_>,
        ct: &CancellationToken,
    ) -> Result<RemoteItem> {
        let target = format!("{}:", parent.id);
        let name = format!("{}:", request.name);

        if request.length == 0 {
            let url = self.endpoint(&["me", "drive", "items", &target, &name, "content"])?;
            let put = self.authorized(self.client.put(url)).body(Vec::new());
            return self.fetch_item(put, ct).await;
        }

        let url = self.endpoint(&[
            "me",
            "drive",
            "items",
            &target,
            &name,
            "createUploadSession",
        ])?;
        let body = serde_json::json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace" }
        });
        let response = self
            .execute(self.authorized(self.client.post(url)).json(&body), ct)
            .await?;
        let session: UploadSession =
            cancellable(ct, async { Ok::<_, DriveError>(response.json::<UploadSession>().await?) }).await?;

        tracing::debug!(
            "📡 Upload session opened for '{}' ({} bytes, {} byte chunks)",
            request.name,
            request.length,
            request.chunk_size
        );

        upload_in_chunks(request, ct, |range, data| {
            Self::put_chunk(self.client.clone(), session.upload_url.clone(), range, data)
        })
        .await
    }

    async fn create_folder(
        &self,
        parent: &RemoteItem,
        name: &str,
        ct: &CancellationToken,
    ) -> Result<RemoteItem> {
        let url = self.item_endpoint(parent, &["children"])?;
        let body = serde_json::json!({ "name": name, "folder": {} });
        self.fetch_item(self.authorized(self.client.post(url)).json(&body), ct)
            .await
    }
}
