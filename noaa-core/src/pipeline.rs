//! Sequential probe → fetch → upload run.

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::{
    client::ObservationSource,
    error::{FetchError, UploadError},
    model::{DataQuery, StorageKey, result_count},
    store::{ObjectUploader, UploadReceipt},
};

/// Where a run currently is. `LoadingConfig` happens before a [`Pipeline`] exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadingConfig,
    Probing,
    Fetching,
    Uploading,
    Failed,
}

#[derive(Debug)]
pub enum RunOutcome {
    Uploaded { data: Value, receipt: UploadReceipt },
    /// The fetch worked but the upload didn't. Not fatal.
    UploadFailed { data: Value, key: StorageKey, error: UploadError },
    FetchFailed(FetchError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Uploaded { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            RunOutcome::Uploaded { data, .. } | RunOutcome::UploadFailed { data, .. } => Some(data),
            RunOutcome::FetchFailed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    /// Stages entered, in order.
    pub stages: Vec<Stage>,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub probe: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { probe: true }
    }
}

#[derive(Debug)]
pub struct Pipeline<'a> {
    source: &'a dyn ObservationSource,
    uploader: &'a ObjectUploader,
    options: RunOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a dyn ObservationSource,
        uploader: &'a ObjectUploader,
        options: RunOptions,
    ) -> Self {
        Self { source, uploader, options }
    }

    pub async fn run(&self, query: &DataQuery, key: &StorageKey) -> RunReport {
        let mut stages = vec![Stage::LoadingConfig];

        if self.options.probe {
            enter(&mut stages, Stage::Probing);
            // Diagnostics only; the fetch goes ahead either way.
            let _ = probe(self.source).await;
        }

        enter(&mut stages, Stage::Fetching);
        let data = match self.source.fetch(query).await {
            Ok(data) => data,
            Err(err) => {
                enter(&mut stages, Stage::Failed);
                error!("Failed to fetch data. {err}");
                return RunReport { stages, outcome: RunOutcome::FetchFailed(err) };
            }
        };

        match result_count(&data) {
            Some(n) => info!("Fetched {n} records for {}", query.location_id),
            None => info!("Fetched response for {}", query.location_id),
        }

        enter(&mut stages, Stage::Uploading);
        let outcome = match self.uploader.upload_json(&data, key).await {
            Ok(receipt) => RunOutcome::Uploaded { data, receipt },
            Err(error) => {
                error!("Failed to upload {key}: {error}");
                RunOutcome::UploadFailed { data, key: key.clone(), error }
            }
        };

        RunReport { stages, outcome }
    }
}

/// Call the probe endpoint and log what came back.
pub async fn probe(source: &dyn ObservationSource) -> Result<Value, FetchError> {
    match source.probe().await {
        Ok(body) => {
            match result_count(&body) {
                Some(n) => info!("/datasets endpoint reachable, {n} datasets available"),
                None => info!("/datasets endpoint reachable"),
            }
            debug!("/datasets endpoint response: {body}");
            Ok(body)
        }
        Err(err) => {
            warn!("/datasets probe failed: {err}");
            Err(err)
        }
    }
}

fn enter(stages: &mut Vec<Stage>, stage: Stage) {
    debug!("Pipeline stage: {stage:?}");
    stages.push(stage);
}
