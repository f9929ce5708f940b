//! Side channel for the control panel: "how many fields are tracked here?"
//! and "does the text backend answer?"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::service::{TextTransformService, TransformResult};

/// Draft sent by the backend check.
pub const AI_CHECK_SAMPLE: &str = "hey john, ur presentation was pretty good";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub success: bool,
    pub text_fields: usize,
    pub url: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCheckReport {
    pub success: bool,
    pub sample: String,
    pub result: String,
    pub generated_at: DateTime<Utc>,
}

/// Runs one grammar check on a fixed draft. Backend errors go back to the
/// caller untouched.
pub async fn test_ai(service: &dyn TextTransformService) -> TransformResult<AiCheckReport> {
    match service.grammar_check(AI_CHECK_SAMPLE).await {
        Ok(result) => {
            info!(chars = result.chars().count(), "backend check answered");
            Ok(AiCheckReport {
                success: true,
                sample: AI_CHECK_SAMPLE.to_string(),
                result,
                generated_at: Utc::now(),
            })
        }
        Err(e) => {
            warn!(error = %e, "backend check failed");
            Err(e)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiagnosticError {
    #[error("content script not loaded, try refreshing the page")]
    ChannelClosed,
    #[error("the page did not answer the detection query")]
    NoResponse,
}

pub struct DetectionQuery {
    reply: oneshot::Sender<DetectionReport>,
}

/// Caller side. Cheap to clone; each query is fire-and-forget from the
/// page's point of view, with no retry.
#[derive(Clone)]
pub struct DiagnosticClient {
    tx: mpsc::UnboundedSender<DetectionQuery>,
}

/// Page side, polled by the session.
pub struct DiagnosticEndpoint {
    rx: mpsc::UnboundedReceiver<DetectionQuery>,
}

pub fn channel() -> (DiagnosticClient, DiagnosticEndpoint) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DiagnosticClient { tx }, DiagnosticEndpoint { rx })
}

impl DiagnosticClient {
    pub async fn test_detection(&self) -> Result<DetectionReport, DiagnosticError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(DetectionQuery { reply })
            .map_err(|_| DiagnosticError::ChannelClosed)?;
        answer.await.map_err(|_| DiagnosticError::NoResponse)
    }
}

impl DiagnosticEndpoint {
    /// Answers every waiting query; `count` is evaluated once, and only
    /// if somebody asked.
    pub fn serve(&mut self, url: &str, count: impl FnOnce() -> usize) -> usize {
        let mut queries = Vec::new();
        while let Ok(query) = self.rx.try_recv() {
            queries.push(query);
        }
        if queries.is_empty() {
            return 0;
        }
        let report = DetectionReport {
            success: true,
            text_fields: count(),
            url: url.to_string(),
            generated_at: Utc::now(),
        };
        let served = queries.len();
        for query in queries {
            let _ = query.reply.send(report.clone());
        }
        served
    }

    /// Stops accepting queries. Queries already queued are dropped, so
    /// their callers see `NoResponse`; later ones see `ChannelClosed`.
    pub fn close(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
