use futures::future::BoxFuture;
use futures::stream::{self, Stream, TryStreamExt};

use crate::broker::client::Page;
use crate::core::error::TransportError;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Folds a page-token API into a lazy stream of items.
///
/// Nothing is fetched until the stream is polled. The stream ends after the
/// first page without a continuation token, and yields the transport error
/// (then ends) if a fetch fails.
pub fn paginate<'a, T, F>(fetch: F) -> impl Stream<Item = Result<T, TransportError>> + 'a
where
    T: 'a,
    F: FnMut(Option<String>) -> BoxFuture<'a, Result<Page<T>, TransportError>> + 'a,
{
    stream::try_unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::Done => return Ok::<_, TransportError>(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = fetch(token).await?;
        let next = match page.next_page_token {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        };

        let items = stream::iter(page.items.into_iter().map(Ok::<T, TransportError>));
        Ok(Some((items, (fetch, next))))
    })
    .try_flatten()
}
