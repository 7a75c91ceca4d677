//! Cursor pagination over `paging.next` links.
//!
//! Pages are fetched strictly one after another; each page's element count
//! is reported into the stat attached to the call context, if any.

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use tokio::sync::mpsc;

use crate::accumulate::Accumulate;
use crate::client::GraphClient;
use crate::context::CallContext;
use crate::error::GraphError;
use crate::types::Envelope;

/// Capacity of the channel between the page reader and the element decoder.
const STREAM_BUFFER: usize = 1;

/// Hooks into a list read, for callers that derive progress from page
/// contents rather than element counts.
pub(crate) trait ListObserver: Sync {
    /// Called once per page with its undecoded `summary`, before its elements are sent.
    fn page(&self, _summary: Option<&RawValue>) {}

    /// Called for every element after it decoded successfully.
    fn element(&self, _raw: &RawValue) {}
}

impl ListObserver for () {}

impl GraphClient {
    /// Fetch every page starting at `url` and append all elements to `dest`.
    ///
    /// Pages without `data` contribute nothing. Whatever was appended before
    /// a failure stays in `dest`.
    ///
    /// # Errors
    /// The first error of any page fetch or accumulation.
    pub async fn get_list<C>(
        &self,
        ctx: &CallContext,
        url: &str,
        dest: &mut C,
    ) -> Result<(), GraphError>
    where
        C: Accumulate + ?Sized,
    {
        let mut next = Some(url.to_owned());
        while let Some(url) = next.take() {
            let page: Envelope<Box<RawValue>> = self.get_json(ctx, &url).await?;
            let added = match &page.data {
                Some(data) => dest.accumulate(data.get().as_bytes())?,
                None => 0,
            };
            report(ctx, added);
            next = page.paging.next_page().map(str::to_owned);
        }
        Ok(())
    }

    /// Fetch every page starting at `url` and send each raw element to `out`.
    ///
    /// `out` is not closed by this call.
    ///
    /// # Errors
    /// [`GraphError::ChannelClosed`] if the receiver went away,
    /// [`GraphError::Cancelled`] if `ctx` was cancelled while blocked on a
    /// send, or the first page fetch error.
    pub async fn read_list(
        &self,
        ctx: &CallContext,
        url: &str,
        out: &mpsc::Sender<Box<RawValue>>,
    ) -> Result<(), GraphError> {
        self.read_pages(ctx, url, out, &()).await
    }

    async fn read_pages(
        &self,
        ctx: &CallContext,
        url: &str,
        out: &mpsc::Sender<Box<RawValue>>,
        observer: &impl ListObserver,
    ) -> Result<(), GraphError> {
        let mut next = Some(url.to_owned());
        while let Some(url) = next.take() {
            let page: Envelope<Vec<Box<RawValue>>> = self.get_json(ctx, &url).await?;
            observer.page(page.summary.as_deref());
            let elements = page.data.unwrap_or_default();
            let count = elements.len();
            for element in elements {
                tokio::select! {
                    sent = out.send(element) => sent.map_err(|_| GraphError::ChannelClosed)?,
                    () = ctx.cancellation().cancelled() => return Err(GraphError::Cancelled),
                }
            }
            report(ctx, count);
            next = page.paging.next_page().map(str::to_owned);
        }
        Ok(())
    }

    /// Stream every element of the list at `url` into `out`, decoded as `T`.
    ///
    /// Runs a page reader and an element decoder side by side over a small
    /// internal channel. The first failure of either aborts the other.
    /// `out` is dropped on return, which closes it for the receiver.
    ///
    /// Returns the number of elements delivered.
    ///
    /// # Errors
    /// The first error of either side; a malformed element is a
    /// [`GraphError::Decode`].
    pub async fn stream_list<T>(
        &self,
        ctx: &CallContext,
        url: &str,
        out: mpsc::Sender<T>,
    ) -> Result<u64, GraphError>
    where
        T: DeserializeOwned + Send,
    {
        self.stream_list_observed(ctx, url, out, &()).await
    }

    pub(crate) async fn stream_list_observed<T>(
        &self,
        ctx: &CallContext,
        url: &str,
        out: mpsc::Sender<T>,
        observer: &impl ListObserver,
    ) -> Result<u64, GraphError>
    where
        T: DeserializeOwned + Send,
    {
        let cancel = ctx.cancellation().child_token();
        let _abort_on_exit = cancel.clone().drop_guard();
        let stream_ctx = ctx.clone().with_cancellation(cancel);
        let (raw_tx, mut raw_rx) = mpsc::channel::<Box<RawValue>>(STREAM_BUFFER);

        let producer = async {
            let result = self.read_pages(&stream_ctx, url, &raw_tx, observer).await;
            drop(raw_tx);
            result
        };

        let consumer = async {
            let mut delivered = 0_u64;
            while let Some(raw) = raw_rx.recv().await {
                let item: T = serde_json::from_str(raw.get())?;
                observer.element(&raw);
                tokio::select! {
                    sent = out.send(item) => sent.map_err(|_| GraphError::ChannelClosed)?,
                    () = stream_ctx.cancellation().cancelled() => return Err(GraphError::Cancelled),
                }
                delivered += 1;
            }
            Ok::<_, GraphError>(delivered)
        };

        let ((), delivered) = tokio::try_join!(producer, consumer)?;
        Ok(delivered)
    }
}

fn report(ctx: &CallContext, count: usize) {
    if let Some(stat) = ctx.stat() {
        stat.add(u64::try_from(count).unwrap_or(u64::MAX));
    }
}
