use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::Response;
use bytes::Bytes;
use futures::SinkExt;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};

use crate::archive::Member;
use crate::archive::extract::extract_member;
use crate::archive::reader::read_members;
use crate::archive::writer::ZipAssembler;
use crate::cache::DirectoryCache;
use crate::remote::{RemoteClient, RemoteFile};

use super::AppState;
use super::error::{ApiError, ApiResult};

pub const DOWNLOAD_FILENAME: &str = "selected_files.zip";

/// How many assembled chunks may sit between the extraction task and the
/// response body before extraction pauses
const CHUNK_BUFFER: usize = 8;

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(default)]
    pub use_ua: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(default)]
    pub use_ua: Option<bool>,
    #[serde(default)]
    pub files: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    pub files: Vec<FileEntry>,
}

/// One archive member as surfaced to the caller
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub compress_type: u16,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    pub gp_flag: u16,
    pub encrypted: bool,
}

impl From<&Member> for FileEntry {
    fn from(member: &Member) -> Self {
        FileEntry {
            filename: member.filename.clone(),
            compress_type: member.method,
            compressed_size: member.compressed_size,
            uncompressed_size: member.uncompressed_size,
            local_header_offset: member.local_header_offset,
            gp_flag: member.gp_flag,
            encrypted: member.is_encrypted(),
        }
    }
}

pub async fn index() -> &'static str {
    "Server is working!"
}

/// Enumerate the members of a remote archive without downloading it
pub async fn list_files(
    State(state): State<AppState>,
    Json(req): Json<ListRequest>,
) -> ApiResult<Json<ListResponse>> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("Missing URL"));
    }
    let use_ua = req.use_ua.unwrap_or(true);

    let key = DirectoryCache::key(url, req.cookies.as_deref(), use_ua);
    let members = match state.cache.get(&key) {
        Some(members) => members,
        None => {
            let client = Arc::new(RemoteClient::new(req.cookies.clone(), use_ua)?);
            let file = RemoteFile::open(client, url.to_string()).await?;
            let members = Arc::new(read_members(&file).await?);
            state.cache.put(key, Arc::clone(&members));
            members
        }
    };

    tracing::info!(url, count = members.len(), "listed archive members");

    Ok(Json(ListResponse {
        status: "ok",
        files: members.iter().map(FileEntry::from).collect(),
    }))
}

/// Re-package a selection of members into a fresh archive, streamed to the
/// caller as it is assembled
pub async fn download_files(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> ApiResult<Response> {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::bad_request("Missing URL"));
    }
    if req.files.is_empty() {
        return Err(ApiError::bad_request("No files selected"));
    }
    let use_ua = req.use_ua.unwrap_or(true);

    let client = Arc::new(RemoteClient::new(req.cookies.clone(), use_ua)?);
    let file = RemoteFile::open(Arc::clone(&client), url.clone()).await?;

    let key = DirectoryCache::key(&url, req.cookies.as_deref(), use_ua);
    let members = match state.cache.get(&key) {
        Some(members) => members,
        None => {
            let members = Arc::new(read_members(&file).await?);
            state.cache.put(key, Arc::clone(&members));
            members
        }
    };

    if let Some(&bad) = req.files.iter().find(|&&i| i >= members.len()) {
        return Err(ApiError::bad_request(format!(
            "file index {bad} out of range (archive has {} members)",
            members.len()
        )));
    }

    tracing::info!(url = %url, selected = req.files.len(), "starting extraction");

    let (mut tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(CHUNK_BUFFER);
    let selection = req.files;
    tokio::spawn(async move {
        let mut assembler = ZipAssembler::new();
        for index in selection {
            let member = &members[index];
            let result = match extract_member(&file, member).await {
                Ok(data) => assembler.add_member(member, data),
                Err(err) if err.is_member_scoped() => {
                    tracing::warn!(member = %member.filename, %err, "skipping member");
                    continue;
                }
                Err(err) => {
                    // The upstream itself failed; stop fetching and close
                    // out the archive with whatever made it through
                    tracing::error!(member = %member.filename, %err, "aborting extraction");
                    break;
                }
            };
            let chunk = match result {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(member = %member.filename, %err, "skipping member");
                    continue;
                }
            };
            if tx.send(Ok(chunk)).await.is_err() {
                // Client went away; drop the job
                return;
            }
        }
        tracing::info!(members = assembler.member_count(), "archive assembled");
        let _ = tx.send(Ok(assembler.finish())).await;
    });

    Response::builder()
        .header(CONTENT_TYPE, "application/zip")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
        )
        .body(Body::from_stream(rx))
        .map_err(|err| ApiError::internal(err.to_string()))
}
