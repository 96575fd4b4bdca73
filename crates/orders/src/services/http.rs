use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::TransportError;

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, TransportError> {
    Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(format!("{base_url}: {e}")))
}

/// Builds `{base}/{collection}/{id}`, escaping `id` as a single path segment.
pub(crate) fn resource_url(base: &Url, collection: &str, id: &str) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .push(collection)
        .push(id);
    Ok(url)
}

/// GETs a JSON resource. `404` means the resource does not exist.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
) -> Result<Option<T>, TransportError> {
    let response = client.get(url).send().await?;

    match response.status() {
        StatusCode::NOT_FOUND => Ok(None),
        status if status.is_success() => Ok(Some(response.json::<T>().await?)),
        status => Err(TransportError::Status(status.as_u16())),
    }
}
