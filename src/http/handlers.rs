//! Endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::request::ClientIp;
use super::response::{success, ApiError, Envelope};
use crate::catalog::{Mirror, MirrorView};
use crate::error::MirrorError;
use crate::lifecycle::AppContext;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MirrorlistQuery {
    pub protocol: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub catalog: &'static str,
    pub mirrors: Option<i64>,
    pub resolver: &'static str,
}

/// `GET /mirrors`: ranked projections for the caller.
pub async fn ranked_mirrors(
    State(ctx): State<AppContext>,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Envelope<Vec<MirrorView>>>, ApiError> {
    let limit = query.limit.unwrap_or(ctx.config.ranking.default_limit);
    let mirrors = ctx.router.rank_for(&client_ip).await?;
    Ok(success(mirrors.iter().take(limit).map(Mirror::view).collect()))
}

/// `GET /mirrorlist`: one endpoint per line, best mirror first.
pub async fn mirrorlist(
    State(ctx): State<AppContext>,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<MirrorlistQuery>,
) -> Result<String, ApiError> {
    let lines = ranked_endpoints(&ctx, &client_ip, query).await?;
    Ok(lines.join("\n"))
}

/// `GET /mirrorlist/{version}/{repository}`: like `/mirrorlist` with the
/// repository path appended to each endpoint.
pub async fn repository_mirrorlist(
    State(ctx): State<AppContext>,
    ClientIp(client_ip): ClientIp,
    Path((version, repository)): Path<(String, String)>,
    Query(query): Query<MirrorlistQuery>,
) -> Result<String, ApiError> {
    for segment in [&version, &repository] {
        if !is_path_segment(segment) {
            return Err(MirrorError::InvalidInput(segment.clone()).into());
        }
    }
    let lines = ranked_endpoints(&ctx, &client_ip, query).await?;
    Ok(lines
        .iter()
        .map(|endpoint| repository_url(endpoint, &version, &repository))
        .collect::<Vec<_>>()
        .join("\n"))
}

async fn ranked_endpoints(
    ctx: &AppContext,
    client_ip: &str,
    query: MirrorlistQuery,
) -> Result<Vec<String>, ApiError> {
    let protocols = match query.protocol {
        Some(protocol) => vec![protocol],
        None => ctx.config.ranking.default_protocols.clone(),
    };
    let limit = query.limit.unwrap_or(ctx.config.ranking.default_limit);

    let mirrors = ctx.router.rank_for(client_ip).await?;
    Ok(mirrorlist_lines(&mirrors, &protocols, limit)
        .into_iter()
        .map(str::to_string)
        .collect())
}

fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

/// `endpoint` joined with `version/repository`, one slash between parts.
pub fn repository_url(endpoint: &str, version: &str, repository: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), version, repository)
}

/// Endpoint of each mirror under the first protocol it offers, in
/// preference order. Mirrors offering none are skipped.
pub fn mirrorlist_lines<'a>(mirrors: &'a [Mirror], protocols: &[String], limit: usize) -> Vec<&'a str> {
    mirrors
        .iter()
        .filter_map(|mirror| protocols.iter().find_map(|p| mirror.url_for(p)))
        .take(limit)
        .collect()
}

/// `GET /mirrors/all`: the whole catalog in stored order.
pub async fn all_mirrors(
    State(ctx): State<AppContext>,
) -> Result<Json<Envelope<Vec<MirrorView>>>, ApiError> {
    let mirrors = ctx.catalog().list_mirrors().await?;
    Ok(success(mirrors.iter().map(Mirror::view).collect()))
}

/// `GET /url-types`: distinct protocol labels.
pub async fn url_types(
    State(ctx): State<AppContext>,
) -> Result<Json<Envelope<Vec<String>>>, ApiError> {
    Ok(success(ctx.catalog().url_types().await?))
}

/// `GET /status`
pub async fn get_status(State(ctx): State<AppContext>) -> Json<SystemStatus> {
    let (catalog, mirrors) = match ctx.catalog().count().await {
        Ok(count) => ("available", Some(count)),
        Err(e) => {
            tracing::warn!(error = %e, "Catalog unavailable for status check");
            ("unavailable", None)
        }
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if mirrors.is_some() { "operational" } else { "degraded" },
        catalog,
        mirrors,
        resolver: if ctx.has_maxmind() { "maxmind" } else { "static" },
    })
}
