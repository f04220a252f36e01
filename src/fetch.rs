//! Payload downloading. The extraction pipeline depends only on the
//! [`Fetch`] trait; the HTTP client lives behind it, and tests substitute
//! an in-memory implementation.

use std::io::{self, Read};

/// Downloads payloads by URL.
pub trait Fetch {
    /// Fetches the entire payload at `url`.
    fn fetch(&self, url: &str) -> io::Result<Vec<u8>>;
}

/// [`Fetch`] over plain blocking HTTP. Non-2xx responses are errors.
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> io::Result<Vec<u8>> {
        let response = ureq::get(url)
            .call()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut data = Vec::new();
        response.into_reader().read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Fetches and decodes a JSON document.
pub fn fetch_json<T: serde::de::DeserializeOwned>(
    fetcher: &dyn Fetch,
    url: &str,
) -> io::Result<T> {
    let data = fetcher.fetch(url)?;
    serde_json::from_slice(&data)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
