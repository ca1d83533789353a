use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::engine::{self, CommentError};
use crate::models::*;
use crate::store::{Store, StoreError};

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
}

/// Loads a confession for a mutation, translating store errors to
/// responses. A repaired load is logged here; the emptied lists reach disk
/// through the mutation's own write-back.
fn fetch_confession(state: &AppState, id: &str) -> Result<Confession, HttpResponse> {
    match state.store.load_confession(id) {
        Ok(loaded) => {
            if loaded.repaired {
                log::warn!(
                    "confession {}: discarded legacy sub-list shapes during load",
                    id
                );
            }
            Ok(loaded.confession)
        }
        Err(StoreError::NotFound(_)) => Err(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("Confession not found."))),
        Err(e) => Err(HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to load confession: {}", e)))),
    }
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Confession Endpoints ====================

pub async fn create_confession(
    state: web::Data<AppState>,
    body: web::Json<CreateConfessionRequest>,
) -> impl Responder {
    let text = body.text.trim();
    if text.is_empty() || body.secret_code.is_empty() || body.user_id.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "Text, secret code, and userId are required.",
        ));
    }
    if text.chars().count() > MAX_CONFESSION_LEN {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "Confession cannot exceed 1000 characters.",
        ));
    }
    if body.secret_code.chars().count() < MIN_SECRET_CODE_LEN {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "Secret code must be at least 4 characters.",
        ));
    }

    // Snapshot the author's current anonymous name onto the post
    let display_name = match state.store.get_user_by_external_id(&body.user_id) {
        Ok(user) if !user.anonymous_name.is_empty() => user.anonymous_name,
        _ => DEFAULT_DISPLAY_NAME.to_string(),
    };

    let secret_code_hash = match state.auth_service.hash_secret_code(&body.secret_code) {
        Ok(hash) => hash,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to hash secret code"))
        }
    };

    let mut confession = Confession {
        id: String::new(),
        text: text.to_string(),
        secret_code_hash,
        author_id: body.user_id.clone(),
        display_name,
        category: body
            .category
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        reactions: Vec::new(),
        saved_by: Vec::new(),
        comments: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    match state.store.create_confession(&mut confession) {
        Ok(_) => HttpResponse::Created().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to create confession: {}", e))),
    }
}

#[derive(Deserialize)]
pub struct ListConfessionsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list_confessions(
    state: web::Data<AppState>,
    query: web::Query<ListConfessionsQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(50).min(100);
    let offset = query.offset.unwrap_or(0);

    match state.store.list_confessions(limit, offset) {
        Ok(confessions) => HttpResponse::Ok().json(ApiResponse::success(confessions)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to list confessions: {}", e))),
    }
}

pub async fn get_confession(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    match fetch_confession(&state, &id) {
        Ok(confession) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(resp) => resp,
    }
}

pub async fn update_confession(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateConfessionRequest>,
) -> impl Responder {
    if body.secret_code.is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("Secret code is required to edit."));
    }
    if body.text.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("Updated text is required."));
    }
    if body.text.trim().chars().count() > MAX_CONFESSION_LEN {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "Confession cannot exceed 1000 characters.",
        ));
    }

    let id = path.into_inner();
    let mut confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state
        .auth_service
        .verify_secret_code(&body.secret_code, &confession.secret_code_hash)
    {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::Forbidden()
                .json(ApiResponse::<()>::error("Incorrect secret code."))
        }
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to verify secret code"))
        }
    }

    confession.text = body.text.trim().to_string();

    match state.store.update_confession(&mut confession) {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to update confession: {}", e))),
    }
}

pub async fn delete_confession(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<DeleteConfessionRequest>,
) -> impl Responder {
    if body.secret_code.is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("Secret code is required to delete."));
    }

    let id = path.into_inner();
    let confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state
        .auth_service
        .verify_secret_code(&body.secret_code, &confession.secret_code_hash)
    {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::Forbidden()
                .json(ApiResponse::<()>::error("Incorrect secret code."))
        }
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to verify secret code"))
        }
    }

    match state.store.delete_confession(&id) {
        Ok(_) => HttpResponse::Ok()
            .json(ApiResponse::success("Confession deleted successfully.")),
        Err(StoreError::NotFound(_)) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("Confession not found.")),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to delete confession: {}", e))),
    }
}

// ==================== Reaction / Save Endpoints ====================

pub async fn react(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReactionRequest>,
) -> impl Responder {
    if body.user_id.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("userId is required."));
    }

    let id = path.into_inner();
    let mut confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let (reactions, transition) =
        engine::reconcile(confession.reactions, &body.user_id, body.requested);
    log::debug!("confession {}: reaction {:?} for {}", id, transition, body.user_id);
    confession.reactions = reactions;

    match state.store.update_confession(&mut confession) {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to process reaction: {}", e))),
    }
}

pub async fn toggle_save(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SaveRequest>,
) -> impl Responder {
    if body.user_id.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("userId is required."));
    }

    let id = path.into_inner();
    let mut confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let saved = engine::toggle_save(&mut confession.saved_by, &body.user_id);
    log::debug!("confession {}: saved={} for {}", id, saved, body.user_id);

    match state.store.update_confession(&mut confession) {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to toggle save: {}", e))),
    }
}

// ==================== Comment Endpoints ====================

pub async fn add_comment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<AddCommentRequest>,
) -> impl Responder {
    if body.user_id.is_empty() || body.text.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("userId and text are required."));
    }

    let id = path.into_inner();
    let mut confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    confession.comments.push(engine::new_comment(
        &body.user_id,
        &body.user_name,
        &body.user_image,
        body.text.trim(),
    ));

    match state.store.update_confession(&mut confession) {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to add comment: {}", e))),
    }
}

pub async fn update_comment(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<UpdateCommentRequest>,
) -> impl Responder {
    if body.text.trim().is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("Text is required."));
    }

    let (id, comment_id) = path.into_inner();
    let mut confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match engine::edit_comment(
        &mut confession.comments,
        &comment_id,
        &body.user_id,
        body.text.trim(),
    ) {
        Ok(()) => {}
        Err(CommentError::NotFound) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Comment not found."))
        }
        Err(CommentError::NotAuthor) => {
            return HttpResponse::Forbidden().json(ApiResponse::<()>::error("Unauthorized."))
        }
    }

    match state.store.update_confession(&mut confession) {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to update comment: {}", e))),
    }
}

pub async fn delete_comment(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<DeleteCommentRequest>,
) -> impl Responder {
    let (id, comment_id) = path.into_inner();
    let mut confession = match fetch_confession(&state, &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match engine::delete_comment(&mut confession.comments, &comment_id, &body.user_id) {
        Ok(()) => {}
        Err(CommentError::NotFound) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Comment not found."))
        }
        Err(CommentError::NotAuthor) => {
            return HttpResponse::Forbidden().json(ApiResponse::<()>::error("Unauthorized."))
        }
    }

    match state.store.update_confession(&mut confession) {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(confession)),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to delete comment: {}", e))),
    }
}

// ==================== User Endpoints ====================

/// Whether a sign-in attempt satisfies an account's password guard.
/// Accounts without a stored hash are passwordless and always pass.
fn password_matches(auth: &AuthService, user: &User, password: Option<&str>) -> bool {
    match user.password_hash.as_deref() {
        Some(hash) => password
            .map(|p| auth.verify_password(p, hash).unwrap_or(false))
            .unwrap_or(false),
        None => true,
    }
}

pub async fn get_user(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match state.store.get_user_by_external_id(&id) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        // Unknown ids get an empty profile rather than a 404; the frontend
        // treats this as "no anonymous name chosen yet"
        Err(StoreError::NotFound(_)) => HttpResponse::Ok().json(ApiResponse::success(
            serde_json::json!({ "id": id, "anonymousName": "" }),
        )),
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to get user: {}", e))),
    }
}

pub async fn sync_user(
    state: web::Data<AppState>,
    body: web::Json<SyncUserRequest>,
) -> impl Responder {
    if body.google_id.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("googleId is required"));
    }

    // Candidate identity for a first sign-in; the store's upsert discards
    // it when the google id already has a row
    let (custom_user_id, anonymous_name) = AuthService::generate_anonymous_identity();
    let mut candidate = User {
        id: String::new(),
        google_id: Some(body.google_id.clone()),
        custom_user_id,
        email: body.email.clone(),
        username: body.username.clone(),
        anonymous_name,
        password_hash: None,
        picture: DEFAULT_PICTURE.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let user = match state.store.sync_google_user(&mut candidate) {
        Ok(user) => user,
        Err(StoreError::Database(e)) => {
            return HttpResponse::BadRequest()
                .json(ApiResponse::<()>::error(format!("Failed to sync user: {}", e)))
        }
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Failed to sync user: {}", e)))
        }
    };

    let token = match state.auth_service.generate_token(&user.id) {
        Ok(t) => t,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to generate token"))
        }
    };

    HttpResponse::Ok().json(ApiResponse::success(AuthResponse { token, user }))
}

pub async fn update_user(
    state: web::Data<AppState>,
    body: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let external_id = body.id.clone().or_else(|| body.google_id.clone());
    let Some(external_id) = external_id.filter(|id| !id.is_empty()) else {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("User ID is required."));
    };

    match state
        .store
        .update_anonymous_name(&external_id, &body.anonymous_name)
    {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(StoreError::NotFound(_)) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("User not found."))
        }
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to update user: {}", e))),
    }
}

pub async fn manual_auth(
    state: web::Data<AppState>,
    body: web::Json<ManualAuthRequest>,
) -> impl Responder {
    if body.email.is_empty() || body.username.is_empty() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("Email and Username are required"));
    }

    let user = match state.store.get_user_by_email(&body.email) {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => {
            let password_hash = match body.password.as_deref() {
                Some(password) => match state.auth_service.hash_password(password) {
                    Ok(hash) => Some(hash),
                    Err(_) => {
                        return HttpResponse::InternalServerError()
                            .json(ApiResponse::<()>::error("Failed to hash password"))
                    }
                },
                None => None,
            };

            let (custom_user_id, anonymous_name) = AuthService::generate_anonymous_identity();
            let mut user = User {
                id: String::new(),
                google_id: None,
                custom_user_id,
                email: body.email.clone(),
                username: body.username.clone(),
                anonymous_name,
                password_hash,
                picture: DEFAULT_PICTURE.to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            match state.store.create_user(&mut user) {
                Ok(()) => user,
                // Lost a race with a concurrent first sign-in for this
                // email: fall back to the row that won
                Err(StoreError::Database(_)) => {
                    match state.store.get_user_by_email(&body.email) {
                        Ok(existing) => existing,
                        Err(e) => {
                            return HttpResponse::InternalServerError().json(
                                ApiResponse::<()>::error(format!("Failed to authenticate: {}", e)),
                            )
                        }
                    }
                }
                Err(e) => {
                    return HttpResponse::InternalServerError()
                        .json(ApiResponse::<()>::error(format!("Failed to create user: {}", e)))
                }
            }
        }
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Failed to authenticate: {}", e)))
        }
    };

    // Accounts created with a password require it on later sign-ins
    if !password_matches(&state.auth_service, &user, body.password.as_deref()) {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
    }

    let token = match state.auth_service.generate_token(&user.id) {
        Ok(t) => t,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to generate token"))
        }
    };

    HttpResponse::Ok().json(ApiResponse::success(AuthResponse { token, user }))
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))

        // Confessions
        .route("/api/confessions", web::post().to(create_confession))
        .route("/api/confessions", web::get().to(list_confessions))
        .route("/api/confessions/{id}", web::get().to(get_confession))
        .route("/api/confessions/{id}", web::put().to(update_confession))
        .route("/api/confessions/{id}", web::delete().to(delete_confession))
        .route("/api/confessions/{id}/react", web::post().to(react))
        .route("/api/confessions/{id}/save", web::post().to(toggle_save))
        .route("/api/confessions/{id}/comments", web::post().to(add_comment))
        .route(
            "/api/confessions/{id}/comments/{comment_id}",
            web::put().to(update_comment),
        )
        .route(
            "/api/confessions/{id}/comments/{comment_id}",
            web::delete().to(delete_comment),
        )

        // Users
        .route("/api/users/sync", web::post().to(sync_user))
        .route("/api/users/update", web::post().to(update_user))
        .route("/api/users/manual-auth", web::post().to(manual_auth))
        .route("/api/users/{id}", web::get().to(get_user));
}
