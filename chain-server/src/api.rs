//! The two inbound HTTP endpoints spec.md §6 names, registered in `main.rs`
//! the way the teacher registers `detox_api::*` handlers.

use actix_web::{get, post, web, HttpResponse, Responder};
use chain_core::facade::{IndexFacade, TimeWindow};
use chain_core::model::{IncidentProcessChain, IpMappingRelation, ProcessEdge, ProcessNode};
use chain_core::pipeline;
use serde::Deserialize;

use crate::config::ServerConfig;

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "service": "process-chain" }))
}

fn current_window(config: &ServerConfig) -> TimeWindow {
    let end_ms = chrono::Utc::now().timestamp_millis();
    let start_ms = end_ms - config.alarm_window_hours * 3_600_000;
    TimeWindow { start_ms, end_ms }
}

/// spec.md §7: "unrecoverable internal state" is the one `ChainError`
/// variant that fails closed; every endpoint degrades it to a logged `null`
/// body rather than a 5xx, so `anyhow::Error` (rather than `ChainError`
/// directly) is the boundary type — it's the generalized failure domain the
/// handler actually reasons about, matching the teacher's own
/// `Result<T, Box<dyn Error>>` handler style.
fn degrade(endpoint: &str, err: anyhow::Error) -> HttpResponse {
    log::error!("{endpoint}: {err}");
    HttpResponse::Ok().json(None::<IncidentProcessChain>)
}

/// `POST /api/processchain/batch-generate` (spec.md §6). Body is the raw
/// `IpMappingRelation`; empty/missing `ipAndAssociation` returns `200` with
/// a `null` body rather than any 4xx, per spec.
#[post("/api/processchain/batch-generate")]
pub async fn batch_generate(
    facade: web::Data<dyn IndexFacade>,
    config: web::Data<ServerConfig>,
    body: web::Json<IpMappingRelation>,
) -> impl Responder {
    let window = current_window(&config);
    let result: anyhow::Result<Option<IncidentProcessChain>> =
        pipeline::generate(facade.get_ref(), &body, window, &config.chain).await.map_err(anyhow::Error::from);

    match result {
        Ok(chain) => HttpResponse::Ok().json(chain),
        Err(e) => degrade("batch-generate", e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeChainRequest {
    pub network_nodes: Option<Vec<ProcessNode>>,
    pub network_edges: Option<Vec<ProcessEdge>>,
    pub ip_mapping_relation: IpMappingRelation,
    /// Comma-separated focus ips and the role they should carry (spec.md
    /// §4.10). Absent when no role-focus correction is requested.
    pub focus_ip: Option<String>,
    pub focus_object: Option<String>,
}

/// `POST /api/processchain/merge-chain` (spec.md §6).
#[post("/api/processchain/merge-chain")]
pub async fn merge_chain(
    facade: web::Data<dyn IndexFacade>,
    config: web::Data<ServerConfig>,
    body: web::Json<MergeChainRequest>,
) -> impl Responder {
    let window = current_window(&config);
    let focus = match (&body.focus_ip, &body.focus_object) {
        (Some(ip), Some(obj)) => Some((ip.as_str(), obj.as_str())),
        _ => None,
    };

    let result: anyhow::Result<Option<IncidentProcessChain>> = pipeline::merge_chain(
        facade.get_ref(),
        &body.ip_mapping_relation,
        window,
        &config.chain,
        body.network_nodes.clone(),
        body.network_edges.clone(),
        focus,
    )
    .await
    .map_err(anyhow::Error::from);

    match result {
        Ok(chain) => HttpResponse::Ok().json(chain),
        Err(e) => degrade("merge-chain", e),
    }
}
