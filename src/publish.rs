//! Optional upload of run outputs to S3.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Key prefix for processed table CSVs.
pub const PROCESSED_PREFIX: &str = "processed";
/// Key prefix for quality reports.
pub const REPORTS_PREFIX: &str = "reports";

/// Object key for a local output file; `.gz` is appended when compressed.
pub fn object_key(path: &Path, gzip: bool) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = if file_name.ends_with(".json") {
        REPORTS_PREFIX
    } else {
        PROCESSED_PREFIX
    };
    if gzip {
        format!("{prefix}/{file_name}.gz")
    } else {
        format!("{prefix}/{file_name}")
    }
}

pub fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn content_type(path: &Path, gzip: bool) -> &'static str {
    if gzip {
        "application/gzip"
    } else if path.extension().is_some_and(|e| e == "json") {
        "application/json"
    } else {
        "text/csv"
    }
}

/// Uploads one local file, optionally gzip-compressed. Returns its key.
#[tracing::instrument(skip(client))]
pub async fn upload_file(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    path: &Path,
    gzip: bool,
) -> Result<String> {
    let contents = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let body = if gzip { gzip_bytes(&contents)? } else { contents };
    let key = object_key(path, gzip);

    client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(body))
        .content_type(content_type(path, gzip))
        .send()
        .await
        .with_context(|| format!("uploading s3://{bucket}/{key}"))?;

    Ok(key)
}

/// Uploads every written output of a run.
#[tracing::instrument(skip(client, paths), fields(files = paths.len()))]
pub async fn upload_outputs(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    paths: &[PathBuf],
    gzip: bool,
) -> Result<()> {
    for path in paths {
        let key = upload_file(client, bucket, path, gzip).await?;
        info!(bucket, key = %key, "Uploaded");
    }
    info!(upload_count = paths.len(), "S3 upload complete");
    Ok(())
}
