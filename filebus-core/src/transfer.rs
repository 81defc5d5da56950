//! Data-plane conduits: plain HTTP against a presigned URL. No protocol
//! logic lives here; the grant's headers are copied onto the request
//! verbatim and the body is streamed.

use crate::error::FilebusError;
use crate::store::SignedRequest;
use crate::Result;
use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::RequestBuilder;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// GET the granted URL and stream the body into `writer`. Returns the byte
/// count written.
pub async fn download<W>(signed: &SignedRequest, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let request = apply_headers(
        reqwest::Client::new().get(signed.url.as_str()),
        signed,
    );
    let response = request
        .send()
        .await
        .map_err(|error| FilebusError::Http(error.to_string()))?;

    if !response.status().is_success() {
        return Err(rejection(response).await);
    }

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|error| FilebusError::Http(error.to_string()))?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    Ok(written)
}

/// PUT the file at `path` to the granted URL, streaming from disk. Returns
/// the byte count sent.
pub async fn upload(signed: &SignedRequest, path: &Path) -> Result<u64> {
    let file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await?.len();

    let request = apply_headers(
        reqwest::Client::new().put(signed.url.as_str()),
        signed,
    )
    .header(CONTENT_LENGTH, size)
    .body(reqwest::Body::from(file));

    let response = request
        .send()
        .await
        .map_err(|error| FilebusError::Http(error.to_string()))?;

    if !response.status().is_success() {
        return Err(rejection(response).await);
    }

    Ok(size)
}

fn apply_headers(mut request: RequestBuilder, signed: &SignedRequest) -> RequestBuilder {
    for (name, values) in &signed.headers {
        for value in values {
            request = request.header(name, value);
        }
    }
    request
}

async fn rejection(response: reqwest::Response) -> FilebusError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    FilebusError::TransferFailed { status, body }
}
