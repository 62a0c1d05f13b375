use crate::api::error::AppError;
use crate::entities::return_media::MediaType;
use crate::entities::return_requests::ReturnStatus;
use crate::entities::{prelude::*, return_media, return_requests, users};
use crate::services::return_service::StagedMedia;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use futures::TryStreamExt;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    FromQueryResult, JoinType, LoaderTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set,
    sea_query::{Expr, Func, LikeExpr},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

#[derive(Deserialize)]
pub struct ListReturnsQuery {
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserDetails {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub full_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct MediaFileResponse {
    pub id: String,
    pub file: String,
    pub file_url: String,
    #[schema(value_type = String)]
    pub media_type: MediaType,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct ReturnRequestResponse {
    pub id: String,
    pub user: String,
    pub user_details: UserDetails,
    pub barcode: String,
    #[schema(value_type = String)]
    pub status: ReturnStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub admin_notes: Option<String>,
    pub media_files: Vec<MediaFileResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
    pub admin_notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct StatisticsResponse {
    pub total_requests: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

/// The query every read goes through. Staff see everything and may narrow
/// with a search term matched case-insensitively against the barcode, the
/// owner's username or the owner's email (any of the three). Everyone else
/// sees their own requests only and the search term is ignored. Ordering is
/// always newest first.
fn visible_to(claims: &Claims, search: Option<&str>) -> Select<ReturnRequests> {
    let mut select = ReturnRequests::find();

    if claims.is_staff {
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            // % and _ in the term are matched literally, not as LIKE wildcards
            let escaped = term
                .to_lowercase()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let pattern = LikeExpr::new(format!("%{}%", escaped)).escape('\\');
            select = select
                .join(JoinType::InnerJoin, return_requests::Relation::Users.def())
                .filter(
                    Condition::any()
                        .add(
                            Expr::expr(Func::lower(Expr::col((
                                return_requests::Entity,
                                return_requests::Column::Barcode,
                            ))))
                            .like(pattern.clone()),
                        )
                        .add(
                            Expr::expr(Func::lower(Expr::col((
                                users::Entity,
                                users::Column::Username,
                            ))))
                            .like(pattern.clone()),
                        )
                        .add(
                            Expr::expr(Func::lower(Expr::col((
                                users::Entity,
                                users::Column::Email,
                            ))))
                            .like(pattern),
                        ),
                );
        }
    } else {
        select = select.filter(return_requests::Column::UserId.eq(&claims.sub));
    }

    select.order_by_desc(return_requests::Column::CreatedAt)
}

fn to_response(
    request: return_requests::Model,
    owner: users::Model,
    media: Vec<return_media::Model>,
) -> ReturnRequestResponse {
    let full_name = owner.full_name();
    let media_files = media
        .into_iter()
        .map(|m| {
            let file_url = format!("/media/{}", m.file);
            MediaFileResponse {
                id: m.id,
                file: m.file,
                file_url,
                media_type: m.media_type,
                uploaded_at: m.uploaded_at,
            }
        })
        .collect();

    ReturnRequestResponse {
        id: request.id,
        user: request.user_id,
        user_details: UserDetails {
            id: owner.id,
            username: owner.username,
            email: owner.email,
            full_name,
        },
        barcode: request.barcode,
        status: request.status,
        created_at: request.created_at,
        updated_at: request.updated_at,
        admin_notes: request.admin_notes,
        media_files,
    }
}

async fn load_representation(
    db: &DatabaseConnection,
    request: return_requests::Model,
) -> Result<ReturnRequestResponse, AppError> {
    let owner = request
        .find_related(Users)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal(format!("owner missing for request {}", request.id)))?;
    let media = request.find_related(ReturnMedia).all(db).await?;
    Ok(to_response(request, owner, media))
}

#[utoipa::path(
    get,
    path = "/return-requests",
    params(
        ("search" = Option<String>, Query, description = "Staff only: term matched against barcode, owner username or owner email")
    ),
    responses(
        (status = 200, description = "Visible return requests, newest first", body = Vec<ReturnRequestResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "returns"
)]
pub async fn list_returns(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListReturnsQuery>,
) -> Result<Json<Vec<ReturnRequestResponse>>, AppError> {
    let requests = visible_to(&claims, query.search.as_deref())
        .all(&state.db)
        .await?;

    // One query per relation instead of one per row
    let owners = requests.load_one(Users, &state.db).await?;
    let media = requests.load_many(ReturnMedia, &state.db).await?;

    let mut result = Vec::with_capacity(requests.len());
    for ((request, owner), files) in requests.into_iter().zip(owners).zip(media) {
        let owner = owner.ok_or_else(|| {
            AppError::Internal(format!("owner missing for request {}", request.id))
        })?;
        result.push(to_response(request, owner, files));
    }

    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/return-requests",
    request_body(content = Multipart, description = "barcode text field plus zero or more media_files file fields"),
    responses(
        (status = 201, description = "Return request created", body = ReturnRequestResponse),
        (status = 400, description = "Validation failure, field-keyed"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "returns"
)]
pub async fn create_return(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ReturnRequestResponse>), AppError> {
    let mut barcode: Option<String> = None;
    let mut staged: Vec<StagedMedia> = Vec::new();

    let result: Result<return_requests::Model, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(msg)
            }
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "barcode" {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                barcode = Some(text);
            } else if name == "media_files" {
                let filename = field
                    .file_name()
                    .map(|f| f.to_string())
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        AppError::field("media_files", "No filename was submitted.")
                    })?;

                let body_with_io_error = field.map_err(std::io::Error::other);
                let reader = StreamReader::new(body_with_io_error);
                staged.push(state.returns.stage_media(&filename, reader).await?);
            }
        }

        let barcode = barcode
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AppError::field("barcode", "This field is required."))?;

        // The owner is always the caller; nothing in the body can override it
        state
            .returns
            .create_request(&claims.sub, barcode, std::mem::take(&mut staged))
            .await
    }
    .await;

    match result {
        Ok(request) => {
            let representation = load_representation(&state.db, request).await?;
            Ok((StatusCode::CREATED, Json(representation)))
        }
        Err(e) => {
            // Files written before the failure are gone either way; also
            // drain the remaining multipart stream so the client sees the
            // error response instead of a connection reset.
            state.returns.discard_staged(&staged).await;
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/return-requests/{id}",
    params(("id" = String, Path, description = "Return request ID")),
    responses(
        (status = 200, description = "Return request detail", body = ReturnRequestResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found or outside the caller's visible scope")
    ),
    security(("jwt" = [])),
    tag = "returns"
)]
pub async fn get_return(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<ReturnRequestResponse>, AppError> {
    // Scoping through the same query as the list keeps another user's ids
    // indistinguishable from absent ones.
    let request = visible_to(&claims, None)
        .filter(return_requests::Column::Id.eq(&id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Return request not found".to_string()))?;

    Ok(Json(load_representation(&state.db, request).await?))
}

#[utoipa::path(
    patch,
    path = "/return-requests/{id}/update_status",
    params(("id" = String, Path, description = "Return request ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated return request", body = ReturnRequestResponse),
        (status = 400, description = "Invalid status value"),
        (status = 403, description = "Caller is not staff"),
        (status = 404, description = "No such return request")
    ),
    security(("jwt" = [])),
    tag = "returns"
)]
pub async fn update_status(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ReturnRequestResponse>, AppError> {
    if !claims.is_staff {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }

    // Validated before touching the row; a bad value leaves it unchanged
    let status = ReturnStatus::try_from_value(&payload.status).map_err(|_| {
        AppError::field(
            "status",
            &format!("\"{}\" is not a valid choice.", payload.status),
        )
    })?;

    let request = ReturnRequests::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Return request not found".to_string()))?;

    let request_id = request.id.clone();
    let mut active: return_requests::ActiveModel = request.into();
    active.status = Set(status);
    if let Some(notes) = payload.admin_notes {
        // Omitted notes keep the stored value; an explicit "" clears it
        active.admin_notes = Set(if notes.is_empty() { None } else { Some(notes) });
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;

    tracing::info!(
        "✅ Return request {} set to {} by {}",
        request_id,
        updated.status.to_value(),
        claims.username
    );

    Ok(Json(load_representation(&state.db, updated).await?))
}

#[derive(FromQueryResult)]
struct StatusCount {
    status: ReturnStatus,
    count: i64,
}

#[utoipa::path(
    get,
    path = "/return-requests/statistics",
    responses(
        (status = 200, description = "Counts by status across all requests", body = StatisticsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not staff")
    ),
    security(("jwt" = [])),
    tag = "returns"
)]
pub async fn statistics(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StatisticsResponse>, AppError> {
    if !claims.is_staff {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }

    // One grouped query, so the four numbers describe a single snapshot
    // and total always equals pending + approved + rejected.
    let rows = ReturnRequests::find()
        .select_only()
        .column(return_requests::Column::Status)
        .column_as(return_requests::Column::Id.count(), "count")
        .group_by(return_requests::Column::Status)
        .into_model::<StatusCount>()
        .all(&state.db)
        .await?;

    let mut response = StatisticsResponse {
        total_requests: 0,
        pending: 0,
        approved: 0,
        rejected: 0,
    };
    for row in rows {
        response.total_requests += row.count;
        match row.status {
            ReturnStatus::Pending => response.pending = row.count,
            ReturnStatus::Approved => response.approved = row.count,
            ReturnStatus::Rejected => response.rejected = row.count,
        }
    }

    Ok(Json(response))
}
