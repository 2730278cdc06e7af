use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::constants::MAX_PAGE_SIZE;
use crate::database::{fetch_one, get_connection, queries};
use crate::error::{AppError, AppResult};
use crate::models::{
    FileKind, ImageListResponse, ImageResponse, MediaRecord, Pagination, ResolvedSourceResponse,
    UnpinResponse,
};
use crate::resolver::ResolveError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/by-tag", get(list_images_by_tag))
        .route("/images/:hash", get(get_image).delete(delete_image))
        .route("/images/:hash/source", get(resolve_image_source))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub tag: Option<String>,
}

fn clamp_paging(query: &PageQuery, default_limit: u32) -> (u32, u32) {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ImageListResponse>> {
    let (page, limit) = clamp_paging(&query, state.config.catalog.page_size);

    let listing = state.store.list_pins(page, limit).await?;

    Ok(Json(ImageListResponse {
        success: true,
        images: listing.records,
        pagination: Pagination {
            page,
            limit,
            total: listing.total,
        },
    }))
}

/// The pinning service has no tag query, so this scans up to the
/// configured ceiling, filters, and slices.
async fn list_images_by_tag(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ImageListResponse>> {
    let tag = query
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing tag parameter".to_string()))?
        .to_lowercase();

    let (page, limit) = clamp_paging(&query, state.config.catalog.page_size);

    let scan = state
        .store
        .list_pins(1, state.config.catalog.by_tag_scan_limit)
        .await?;

    let matched: Vec<MediaRecord> = scan
        .records
        .into_iter()
        .filter(|record| {
            record
                .tags
                .iter()
                .any(|candidate| candidate.to_lowercase().contains(&tag))
        })
        .collect();

    let total = matched.len() as u64;
    let offset = (page.saturating_sub(1).saturating_mul(limit)) as usize;
    let images: Vec<MediaRecord> = matched
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .collect();

    Ok(Json(ImageListResponse {
        success: true,
        images,
        pagination: Pagination { page, limit, total },
    }))
}

async fn get_image(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> AppResult<Json<ImageResponse>> {
    let mut image = state
        .store
        .find_pin(&hash)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    // Download counters live locally; attach them to the record
    let conn = get_connection(&state.pool)?;
    if let Some((total, unique)) = fetch_one(
        &conn,
        queries::downloads::COUNTS,
        &[&image.content_hash],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )? {
        image.total_downloads = total;
        image.unique_downloads = unique;
    }

    Ok(Json(ImageResponse {
        success: true,
        image,
    }))
}

async fn resolve_image_source(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> AppResult<Json<ResolvedSourceResponse>> {
    let record = state
        .store
        .find_pin(&hash)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    // Server-generated PDF thumbnails skip gateway probing entirely
    if record.file_kind == FileKind::Pdf {
        if let Some(thumbnail) = &record.thumbnail {
            return Ok(Json(ResolvedSourceResponse {
                success: true,
                url: thumbnail.url.clone(),
                gateway: None,
            }));
        }
    }

    let source = state
        .resolver
        .resolve(&record.content_hash, record.file_kind)
        .await
        .map_err(|err| match err {
            ResolveError::InvalidHash(bad) => {
                AppError::BadRequest(format!("Invalid content hash: {}", bad))
            }
            ResolveError::Exhausted { .. } => AppError::GatewaysExhausted(hash.clone()),
        })?;

    Ok(Json(ResolvedSourceResponse {
        success: true,
        url: source.url,
        gateway: Some(source.gateway_index),
    }))
}

async fn delete_image(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> AppResult<Json<UnpinResponse>> {
    state.store.unpin(&hash).await?;

    Ok(Json(UnpinResponse {
        success: true,
        message: "Image unpinned".to_string(),
        ipfs_hash: hash,
    }))
}
