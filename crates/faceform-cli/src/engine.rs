use faceform_core::{AnalysisError, Analyzer, LandmarkDetector, Outcome};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A photo sent to the engine thread, with the channel for its result.
struct AnalyzeRequest {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<Outcome, AnalysisError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<AnalyzeRequest>,
}

impl EngineHandle {
    /// Request analysis of one encoded photo.
    pub async fn analyze(&self, image: Vec<u8>) -> Result<Outcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(AnalyzeRequest {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the analyzer (and with it the inference session) and
/// serves requests one at a time until every handle is dropped.
pub fn spawn_engine<D>(analyzer: Analyzer<D>, queue_depth: usize) -> Result<EngineHandle, EngineError>
where
    D: LandmarkDetector + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<AnalyzeRequest>(queue_depth.max(1));
    let mut analyzer = analyzer;

    std::thread::Builder::new()
        .name("faceform-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(AnalyzeRequest { image, reply }) = rx.blocking_recv() {
                let result = analyzer.analyze(&image);
                if let Err(e) = &result {
                    tracing::error!(error = %e, internal = e.is_internal(), "analysis failed");
                }
                let _ = reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}
