use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::app::AppState;
use crate::database::{execute_query, fetch_all, fetch_one, get_connection, queries};
use crate::error::{AppError, AppResult};
use crate::models::{
    ActionCount, DownloadCounts, DownloadCountsResponse, DownloadRequest, DownloadResponse,
    LikeCountsResponse, LikeRequest, LikeResponse,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/like", post(record_like))
        .route("/download", post(record_download))
        .route("/images/:hash/likes", get(get_like_counts))
        .route("/images/:hash/downloads", get(get_download_counts))
}

fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("Missing required field: {}", field)))
}

async fn record_like(
    State(state): State<AppState>,
    Json(request): Json<LikeRequest>,
) -> AppResult<Json<LikeResponse>> {
    let image_id = required(&request.image_id, "imageId")?;
    let device_id = required(&request.device_id, "deviceId")?;
    let action = required(&request.action, "action")?;

    if !matches!(action, "like" | "dislike") {
        return Err(AppError::Validation(
            "action must be 'like' or 'dislike'".to_string(),
        ));
    }

    let conn = get_connection(&state.pool)?;
    execute_query(&conn, queries::likes::UPSERT, &[&image_id, &device_id, &action])?;

    Ok(Json(LikeResponse { success: true }))
}

async fn get_like_counts(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> AppResult<Json<LikeCountsResponse>> {
    let conn = get_connection(&state.pool)?;

    let counts = fetch_all(&conn, queries::likes::COUNTS_BY_ACTION, &[&hash], |row| {
        Ok(ActionCount {
            action: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    Ok(Json(LikeCountsResponse {
        success: true,
        counts,
    }))
}

async fn record_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> AppResult<Json<DownloadResponse>> {
    let image_id = required(&request.image_id, "imageId")?;
    let device_id = required(&request.device_id, "deviceId")?;

    let conn = get_connection(&state.pool)?;
    execute_query(&conn, queries::downloads::INSERT, &[&image_id, &device_id])?;

    Ok(Json(DownloadResponse { success: true }))
}

async fn get_download_counts(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> AppResult<Json<DownloadCountsResponse>> {
    let conn = get_connection(&state.pool)?;

    let downloads = fetch_one(&conn, queries::downloads::COUNTS, &[&hash], |row| {
        Ok(DownloadCounts {
            total: row.get(0)?,
            unique: row.get(1)?,
        })
    })?
    .unwrap_or_default();

    Ok(Json(DownloadCountsResponse {
        success: true,
        downloads,
    }))
}

#[cfg(test)]
mod tests {
    use crate::database::{fetch_all, fetch_one, queries};
    use crate::test_utils::{create_test_app, create_test_db};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    #[test]
    fn test_like_upsert_keeps_one_row_per_device() {
        let pool = create_test_db();
        let conn = pool.get().unwrap();

        for action in ["like", "dislike"] {
            conn.execute(
                queries::likes::UPSERT,
                rusqlite::params!["QmImage", "device-1", action],
            )
            .unwrap();
        }

        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM image_likes WHERE image_id = ?",
                ["QmImage"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);

        let action: String = conn
            .query_row(
                "SELECT action FROM image_likes WHERE image_id = ? AND device_id = ?",
                ["QmImage", "device-1"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(action, "dislike");
    }

    #[test]
    fn test_like_counts_reflect_latest_actions_only() {
        let pool = create_test_db();
        let conn = pool.get().unwrap();

        conn.execute(
            queries::likes::UPSERT,
            rusqlite::params!["QmImage", "device-1", "like"],
        )
        .unwrap();
        conn.execute(
            queries::likes::UPSERT,
            rusqlite::params!["QmImage", "device-2", "like"],
        )
        .unwrap();
        conn.execute(
            queries::likes::UPSERT,
            rusqlite::params!["QmImage", "device-1", "dislike"],
        )
        .unwrap();

        let counts = fetch_all(
            &conn,
            queries::likes::COUNTS_BY_ACTION,
            &[&"QmImage"],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .unwrap();

        assert_eq!(
            counts,
            vec![("dislike".to_string(), 1), ("like".to_string(), 1)]
        );
    }

    #[test]
    fn test_download_counts_total_and_unique() {
        let pool = create_test_db();
        let conn = pool.get().unwrap();

        for device in ["device-1", "device-1", "device-2"] {
            conn.execute(
                queries::downloads::INSERT,
                rusqlite::params!["QmImage", device],
            )
            .unwrap();
        }

        let (total, unique) = fetch_one(
            &conn,
            queries::downloads::COUNTS,
            &[&"QmImage"],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .unwrap()
        .unwrap();

        assert_eq!(total, 3);
        assert_eq!(unique, 2);
    }

    #[tokio::test]
    async fn test_like_round_trip() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/like")
            .json(&json!({
                "imageId": "QmImage",
                "deviceId": "device-1",
                "action": "like"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = server
            .post("/api/like")
            .json(&json!({
                "imageId": "QmImage",
                "deviceId": "device-1",
                "action": "dislike"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = server.get("/api/images/QmImage/likes").await;
        let body: Value = response.json();

        assert_eq!(body["success"], true);
        assert_eq!(
            body["counts"],
            json!([{ "action": "dislike", "count": 1 }])
        );
    }

    #[tokio::test]
    async fn test_like_rejects_missing_fields_and_bad_action() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/like")
            .json(&json!({ "imageId": "QmImage" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/like")
            .json(&json!({
                "imageId": "QmImage",
                "deviceId": "device-1",
                "action": "love"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_round_trip() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        for device in ["device-1", "device-2", "device-2"] {
            let response = server
                .post("/api/download")
                .json(&json!({ "imageId": "QmImage", "deviceId": device }))
                .await;
            assert_eq!(response.status_code(), StatusCode::OK);
        }

        let response = server.get("/api/images/QmImage/downloads").await;
        let body: Value = response.json();

        assert_eq!(body["downloads"]["total"], 3);
        assert_eq!(body["downloads"]["unique"], 2);
    }

    #[tokio::test]
    async fn test_download_rejects_missing_device() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/download")
            .json(&json!({ "imageId": "QmImage" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}
