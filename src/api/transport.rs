//! Transport port for progress writes
//!
//! Two delivery paths: the async one used while the page is alive, and a
//! blocking one for teardown, when an async round trip may never finish.

use std::future::Future;

use super::client::ApiClient;
use super::error::ApiError;
use super::models::{DocumentProgressUpdate, WatchUpdate};
use crate::watch::FlushPayload;

/// Sends progress updates to the backend
pub trait ProgressTransport {
    fn send_watch(
        &self,
        video_id: &str,
        update: &WatchUpdate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn send_document(
        &self,
        document_id: &str,
        update: &DocumentProgressUpdate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Deliver a payload, blocking the caller until the backend answers
    fn send_blocking(&self, payload: &FlushPayload) -> Result<(), ApiError>;

    /// Deliver a payload over the async path
    fn send(&self, payload: &FlushPayload) -> impl Future<Output = Result<(), ApiError>> + Send
    where
        Self: Sync,
    {
        async move {
            match payload {
                FlushPayload::Video { video_id, update } => self.send_watch(video_id, update).await,
                FlushPayload::Document { document_id, update } => {
                    self.send_document(document_id, update).await
                }
            }
        }
    }
}

impl ProgressTransport for ApiClient {
    async fn send_watch(&self, video_id: &str, update: &WatchUpdate) -> Result<(), ApiError> {
        self.post_watch(video_id, update).await.map(|_| ())
    }

    async fn send_document(
        &self,
        document_id: &str,
        update: &DocumentProgressUpdate,
    ) -> Result<(), ApiError> {
        self.post_document_progress(document_id, update).await.map(|_| ())
    }

    fn send_blocking(&self, payload: &FlushPayload) -> Result<(), ApiError> {
        let path = payload.path();
        match payload {
            FlushPayload::Video { update, .. } => self.post_blocking(&path, update),
            FlushPayload::Document { update, .. } => self.post_blocking(&path, update),
        }
    }
}
