//! Workflow orchestrator
//!
//! Drives one run from the first stream chunk to the assembled
//! [`WorkflowResult`]. Per chunk: parse → register → schema gate / rate →
//! image batches → projection check. After the stream ends the leftover
//! token is flushed, image batches are joined and reconciled, and a final
//! projection pass runs.
//!
//! Only stream failures end a run early. They produce a partial result in the
//! `failed` state carrying the error; everything else is logged and the run
//! continues.

use super::image_batches::{BatchCallback, ImageBatchProcessor};
use super::projection::ProjectionEngine;
use super::rater::rate_members;
use super::reconcile::reconcile_images;
use super::registry::MemberRegistry;
use super::schema_gate::SchemaGate;
use super::token_parser::TokenParser;
use super::{PipelineParams, WorkflowLogger};
use crate::models::{
    GlobalAttributeSchema, ImageBatchResult, ImageMap, RatedAttributeRecord, WorkflowResult,
    WorkflowState,
};
use crate::services::{RemoteServices, StreamChunk, StreamError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;
use vproj_common::LogBroadcaster;

/// What to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    pub domain: String,
    pub model: String,
}

impl WorkflowRequest {
    pub fn new(domain: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            model: model.into(),
        }
    }
}

/// Runs workflows against a fixed set of remote services
pub struct WorkflowOrchestrator {
    services: RemoteServices,
    params: PipelineParams,
}

impl WorkflowOrchestrator {
    pub fn new(services: RemoteServices, params: PipelineParams) -> Self {
        Self { services, params }
    }

    /// Run one workflow to completion
    ///
    /// Every log entry is published to `observer` as it happens and also kept
    /// in the result. Never fails: a stream error yields a partial result with
    /// `error` set and state [`WorkflowState::Failed`].
    pub async fn run(
        &self,
        request: &WorkflowRequest,
        observer: Arc<LogBroadcaster>,
    ) -> WorkflowResult {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, domain = %request.domain, model = %request.model, "Workflow starting");

        let mut run = WorkflowRun::new(run_id, request, &self.services, &self.params, observer);
        run.log
            .info(format!("Starting domain list generation for: \"{}\"", request.domain));

        match run.stream(request).await {
            Ok(()) => run.complete().await,
            Err(e) => run.fail(e),
        }

        let result = run.into_result();
        info!(
            run_id = %run_id,
            state = %result.state,
            members = result.domain_members.len(),
            rated = result.rated_attributes.len(),
            "Workflow finished"
        );
        result
    }
}

/// Mutable state owned by a single run
struct WorkflowRun<'a> {
    run_id: Uuid,
    domain: String,
    model: String,
    services: &'a RemoteServices,
    params: &'a PipelineParams,
    state: WorkflowState,
    log: WorkflowLogger,
    parser: TokenParser,
    registry: MemberRegistry,
    pending: Vec<String>,
    gate: SchemaGate,
    records: Vec<RatedAttributeRecord>,
    projection: ProjectionEngine,
    images: ImageBatchProcessor,
    batch_rx: mpsc::UnboundedReceiver<ImageBatchResult>,
    batches: Vec<ImageBatchResult>,
    error: Option<String>,
}

impl<'a> WorkflowRun<'a> {
    fn new(
        run_id: Uuid,
        request: &WorkflowRequest,
        services: &'a RemoteServices,
        params: &'a PipelineParams,
        observer: Arc<LogBroadcaster>,
    ) -> Self {
        let log = WorkflowLogger::new(run_id, observer);

        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let on_batch: BatchCallback = Arc::new(move |result: ImageBatchResult| {
            // Receiver only goes away with the run itself
            let _ = batch_tx.send(result);
        });
        let images = ImageBatchProcessor::new(
            Arc::clone(&services.images),
            params.image_batch_size,
            log.clone(),
            on_batch,
        );

        Self {
            run_id,
            domain: request.domain.clone(),
            model: request.model.clone(),
            services,
            params,
            state: WorkflowState::Idle,
            log,
            parser: TokenParser::new(),
            registry: MemberRegistry::new(),
            pending: Vec::new(),
            gate: SchemaGate::new(params.schema_sample_threshold),
            records: Vec::new(),
            projection: ProjectionEngine::new(params),
            images,
            batch_rx,
            batches: Vec::new(),
            error: None,
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        if self.state != next {
            debug!(run_id = %self.run_id, from = %self.state, to = %next, "Workflow state change");
            self.state = next;
        }
    }

    /// Consume the domain stream until its end sentinel
    async fn stream(&mut self, request: &WorkflowRequest) -> Result<(), StreamError> {
        self.transition(WorkflowState::Streaming);

        let mut stream = self
            .services
            .stream
            .open(&request.domain, &request.model)
            .await?;

        loop {
            match stream.next_chunk().await? {
                StreamChunk::Text(text) => self.on_chunk(&text).await,
                StreamChunk::Done => return Ok(()),
            }
        }
    }

    async fn on_chunk(&mut self, chunk: &str) {
        let tokens = self.parser.push(chunk);
        let admitted = self.admit(&tokens);
        self.route(admitted).await;

        for token in &tokens {
            self.images.process_item(token);
        }
        self.collect_batches();

        self.projection.maybe_run(&mut self.records, &self.log);
    }

    /// Register `tokens`, returning only first sightings
    fn admit(&mut self, tokens: &[String]) -> Vec<String> {
        let registry = &mut self.registry;
        tokens
            .iter()
            .filter(|token| registry.try_register(token))
            .cloned()
            .collect()
    }

    /// Rate new members now, or queue them until the schema exists
    async fn route(&mut self, members: Vec<String>) {
        if members.is_empty() {
            return;
        }

        if let Some(schema) = self.gate.schema().cloned() {
            self.rate(members, &schema).await;
            return;
        }

        self.pending.extend(members);
        self.transition(WorkflowState::SchemaPending);

        if !self.gate.should_fetch(self.pending.len()) {
            return;
        }

        let sample = self.pending.clone();
        let resolved = self
            .gate
            .resolve(
                self.services.attributes.as_ref(),
                &self.domain,
                &sample,
                &self.log,
            )
            .await;

        if let Some(schema) = resolved {
            self.transition(WorkflowState::SchemaReady);
            let queued = std::mem::take(&mut self.pending);
            self.rate(queued, &schema).await;
        }
    }

    async fn rate(&mut self, members: Vec<String>, schema: &GlobalAttributeSchema) {
        let records = rate_members(
            self.services.attributes.as_ref(),
            members,
            schema,
            self.params.max_concurrent_ratings,
            &self.log,
        )
        .await;
        self.records.extend(records);
    }

    fn collect_batches(&mut self) {
        while let Ok(batch) = self.batch_rx.try_recv() {
            self.batches.push(batch);
        }
    }

    fn reconcile(&mut self) {
        let mut image_map = ImageMap::new();
        for batch in &self.batches {
            batch.merge_into(&mut image_map);
        }
        let updated = reconcile_images(&mut self.records, &image_map);
        debug!(run_id = %self.run_id, updated, images = image_map.len(), "Reconciled images");
    }

    /// Normal end of stream
    async fn complete(&mut self) {
        if let Some(last) = self.parser.finish() {
            self.images.process_item(&last);
            if self.registry.try_register(&last) {
                self.route(vec![last]).await;
            }
        }

        self.transition(WorkflowState::Finalizing);

        self.images.finalize().await;
        self.collect_batches();
        self.reconcile();

        self.projection.finalize(&mut self.records, &self.log);

        if !self.pending.is_empty() {
            self.log.warn(format!(
                "{} members were never rated: {}",
                self.pending.len(),
                self.pending.join(", ")
            ));
        }

        self.log.success(format!(
            "Workflow completed: {} members, {} rated, {} image batches",
            self.registry.len(),
            self.records.len(),
            self.batches.len()
        ));
        self.transition(WorkflowState::Completed);
    }

    /// Fatal stream failure; keeps whatever finished before it
    fn fail(&mut self, error: StreamError) {
        self.log.error(format!("Error: {}", error));

        self.collect_batches();
        self.reconcile();

        self.error = Some(error.to_string());
        self.transition(WorkflowState::Failed);
    }

    fn into_result(self) -> WorkflowResult {
        WorkflowResult {
            run_id: self.run_id,
            domain: self.domain,
            model: self.model,
            state: self.state,
            domain_members: self.registry.into_members(),
            global_attributes: self.gate.schema().cloned(),
            rated_attributes: self.records,
            pending_members: self.pending,
            logs: self.log.entries(),
            batches: self.batches,
            error: self.error,
        }
    }
}
