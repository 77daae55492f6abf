use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{any, get};
use axum::Router;
use http_body_util::BodyExt;
use tracing::Instrument;

use crate::audit::{AuditLogger, AuditRecord, TaskId};
use crate::config::Config;
use crate::prompts::PromptRegistry;
use crate::proxy::auth::AuthValidator;
use crate::proxy::error::{ErrorResponse, ProxyError};
use crate::proxy::health::health;
use crate::proxy::pool::PoolConfig;
use crate::proxy::relay;
use crate::proxy::shutdown::{InFlightGuard, ShutdownManager};
use crate::proxy::timeout::TimeoutConfig;
use crate::proxy::upstream::UpstreamClient;
use crate::transform::BodyTransformer;

/// Per-request coordinator: authenticate, transform, forward, relay, audit.
#[derive(Clone)]
pub struct GatewayEngine {
    auth: Arc<AuthValidator>,
    transformer: BodyTransformer,
    upstream: Arc<UpstreamClient>,
    audit: AuditLogger,
    shutdown: Arc<ShutdownManager>,
}

impl GatewayEngine {
    pub fn new(
        config: &Config,
        prompts: PromptRegistry,
        shutdown: Arc<ShutdownManager>,
    ) -> Result<Self, ProxyError> {
        let upstream = UpstreamClient::new(
            &config.upstream,
            TimeoutConfig::from(&config.transport),
            PoolConfig::from(&config.transport),
        )?;

        Ok(Self {
            auth: Arc::new(AuthValidator::new(config.auth.key.clone())),
            transformer: BodyTransformer::new(prompts, config.gateway.user_id.clone()),
            upstream: Arc::new(upstream),
            audit: AuditLogger::from_config(&config.audit),
            shutdown,
        })
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Run one exchange to completion. Every path persists an audit record;
    /// for streamed responses that happens after this returns.
    pub async fn handle(&self, task_id: TaskId, req: Request<Body>) -> Response {
        let in_flight = self.shutdown.track();
        let (parts, body) = req.into_parts();
        let url = parts.uri.to_string();
        tracing::info!(method = %parts.method, url = %url, "incoming request");

        let mut record = AuditRecord::new(&task_id, parts.method.as_str(), &url, &parts.headers);

        match self
            .forward(parts.method.clone(), &parts.headers, body, &mut record)
            .await
        {
            Ok((response, true)) => self.relay_streaming(record, response, in_flight),
            Ok((response, false)) => self.relay_buffered(record, response).await,
            Err(err) => self.reject(record, err).await,
        }
    }

    /// Everything up to and including the upstream response head. Returns
    /// the response and whether the caller asked for streaming.
    async fn forward(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Body,
        record: &mut AuditRecord,
    ) -> Result<(reqwest::Response, bool), ProxyError> {
        if !self.auth.is_authorized(headers) {
            return Err(ProxyError::Unauthorized);
        }

        let raw = body
            .collect()
            .await
            .map_err(|e| ProxyError::BadRequest(e.to_string()))?
            .to_bytes();
        record.set_downstream_body(&raw);

        let streaming = relay::stream_requested(&raw);
        let transformed = self.transformer.transform(&raw)?;
        tracing::debug!(
            changes = transformed.notes.len(),
            bytes = transformed.body.len(),
            "request transformed"
        );

        record.record_upstream_request(
            method.as_str(),
            self.upstream.url(),
            self.upstream.headers(),
            &raw,
            &transformed.body,
        );

        let response = self.upstream.send(method, transformed.body).await?;
        record.record_upstream_response(response.status().as_u16(), response.headers());
        tracing::info!(
            status = response.status().as_u16(),
            streaming,
            "upstream responded"
        );

        Ok((response, streaming))
    }

    async fn relay_buffered(&self, mut record: AuditRecord, response: reqwest::Response) -> Response {
        let status = response.status();
        let headers = response.headers().clone();

        match response.bytes().await {
            Ok(body) => {
                record.complete(&body);
                tracing::info!(
                    bytes = body.len(),
                    success = record.success,
                    "buffered relay finished"
                );
                self.audit.persist(&record).await;
                relay::relay_response(status, &headers, Body::from(body))
            }
            Err(err) => self.reject(record, ProxyError::UpstreamBody(err)).await,
        }
    }

    fn relay_streaming(
        &self,
        mut record: AuditRecord,
        response: reqwest::Response,
        in_flight: InFlightGuard,
    ) -> Response {
        let status = response.status();
        let headers = response.headers().clone();
        let (mut sink, body) = relay::channel_body();
        let audit = self.audit.clone();

        tokio::spawn(
            async move {
                let _in_flight = in_flight;
                let outcome = relay::relay_stream(response.bytes_stream(), &mut sink).await;
                drop(sink);

                match outcome.upstream_error.as_deref() {
                    Some(err) => record.fail_with_body(
                        &outcome.captured,
                        format!("failed to read upstream response body: {}", err),
                    ),
                    None => record.complete(&outcome.captured),
                }
                tracing::info!(
                    bytes = outcome.bytes_relayed,
                    chunks = outcome.chunks,
                    downstream_closed = outcome.downstream_closed,
                    success = record.success,
                    "stream relay finished"
                );
                audit.persist(&record).await;
            }
            .instrument(tracing::Span::current()),
        );

        relay::relay_response(status, &headers, Body::from_stream(body))
    }

    async fn reject(&self, mut record: AuditRecord, err: ProxyError) -> Response {
        match err {
            ProxyError::Unauthorized | ProxyError::FormatAnomaly => {
                tracing::warn!(error = %err, "request rejected")
            }
            _ => tracing::error!(error = %err, error_type = err.error_type(), "request failed"),
        }
        record.fail(&err);
        self.audit.persist(&record).await;
        ErrorResponse::from_error(&err)
    }
}

pub fn build_router(engine: GatewayEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/messages", any(messages_handler))
        .with_state(engine)
        .layer(middleware::from_fn(access_log))
}

async fn messages_handler(State(engine): State<GatewayEngine>, req: Request<Body>) -> Response {
    let task_id = TaskId::generate();
    let span = tracing::info_span!("request", task_id = %task_id);

    // Detached so a caller disconnect cannot cancel the upstream call or
    // the audit write.
    let exchange = tokio::spawn(async move { engine.handle(task_id, req).await }.instrument(span));
    match exchange.await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "exchange task failed");
            ErrorResponse::from_error(&ProxyError::Internal(err.to_string()))
        }
    }
}

async fn access_log(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;
    if status >= 400 {
        tracing::warn!(%method, %path, status, duration_ms, "request completed");
    } else {
        tracing::debug!(%method, %path, status, duration_ms, "request completed");
    }
    response
}
