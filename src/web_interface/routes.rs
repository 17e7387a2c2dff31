use std::convert::Infallible;
use std::sync::Arc;

use log::{debug, error, warn};
use rust_embed::RustEmbed;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use super::types::{AcceptedSession, ApiError, CreateSessionRequest, CreatedSession};
use crate::error_handling::types::SessionError;
use crate::session_management::session_manager::AcceptRequest;
use crate::session_management::{Dispatcher, SessionManager};

/// Largest JSON body the API accepts.
const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/web/"]
pub struct WebAssets;

/// Shared state handed to every handler.
pub struct ApiContext {
    pub manager: Arc<SessionManager>,
    pub dispatcher: Dispatcher,
    pub public_url: String,
}

fn with_context(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (Arc<ApiContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Every route, with rejections turned into `{ message }` bodies.
pub fn routes(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    pages()
        .or(assets())
        .or(api(ctx))
        .recover(handle_rejection)
}

/// GET /, /share/<token>, /accept/<token>, /status/<token>
pub fn pages() -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let index = warp::path::end().map(|| serve_asset("index.html"));
    let share = warp::path!("share" / String).map(|_token: String| serve_asset("share.html"));
    let accept = warp::path!("accept" / String).map(|_token: String| serve_asset("accept.html"));
    let status = warp::path!("status" / String).map(|_token: String| serve_asset("status.html"));

    warp::get().and(index.or(share).unify().or(accept).unify().or(status).unify())
}

/// GET /assets/<file>
pub fn assets() -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("assets" / String)
        .and(warp::get())
        .map(|file: String| serve_asset(&format!("assets/{}", file)))
}

/// The JSON API under /api/sessions
pub fn api(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let create = warp::path!("api" / "sessions")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(create_session);

    let share = warp::path!("api" / "sessions" / String / "share")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(share_info);

    let accept = warp::path!("api" / "sessions" / String / "accept")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(accept_session);

    let status = warp::path!("api" / "sessions" / String)
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(session_status);

    create
        .or(share)
        .unify()
        .or(accept)
        .unify()
        .or(status)
        .unify()
}

pub async fn create_session(
    ctx: Arc<ApiContext>,
    body: CreateSessionRequest,
) -> Result<Response, Infallible> {
    let session = match ctx
        .manager
        .create(body.src_paths.into_vec(), body.dest_path)
        .await
    {
        Ok(session) => session,
        Err(e) => return Ok(error_response(&e)),
    };
    let created = CreatedSession {
        share_url: format!("{}/share/{}", ctx.public_url, session.token),
        token: session.token,
        public_key: session.public_key,
    };
    Ok(reply::with_status(reply::json(&created), StatusCode::CREATED).into_response())
}

pub async fn share_info(token: String, ctx: Arc<ApiContext>) -> Result<Response, Infallible> {
    Ok(match ctx.manager.share_info(&token) {
        Ok(info) => reply::json(&info).into_response(),
        Err(e) => error_response(&e),
    })
}

/// Records the client's details and queues the orchestration without waiting for it.
pub async fn accept_session(
    token: String,
    ctx: Arc<ApiContext>,
    body: AcceptRequest,
) -> Result<Response, Infallible> {
    let session = match ctx.manager.accept(&token, body) {
        Ok(session) => session,
        Err(e) => return Ok(error_response(&e)),
    };
    if let Err(e) = ctx.dispatcher.enqueue(&session.token) {
        let e = ctx.manager.mark_failed(&session.token, e);
        return Ok(error_response(&e));
    }
    let accepted = AcceptedSession {
        status_url: format!("{}/status/{}", ctx.public_url, session.token),
        token: session.token,
        status: session.status,
    };
    Ok(reply::with_status(reply::json(&accepted), StatusCode::ACCEPTED).into_response())
}

pub async fn session_status(token: String, ctx: Arc<ApiContext>) -> Result<Response, Infallible> {
    Ok(match ctx.manager.status(&token) {
        Ok(view) => reply::json(&view).into_response(),
        Err(e) => error_response(&e),
    })
}

pub fn status_code(err: &SessionError) -> StatusCode {
    match err {
        SessionError::ValidationError(_) => StatusCode::BAD_REQUEST,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::AlreadyExists(_) | SessionError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &SessionError) -> Response {
    let code = status_code(err);
    if code.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected ({}): {}", code, err);
    }
    json_error(err.to_string(), code)
}

fn json_error(message: String, code: StatusCode) -> Response {
    reply::with_status(reply::json(&ApiError { message }), code).into_response()
}

/// Embedded file with its content type, or a 404.
pub fn serve_asset(name: &str) -> Response {
    match WebAssets::get(name) {
        Some(content) => {
            let mime = mime_guess::from_path(name).first_or_octet_stream();
            reply::with_header(
                content.data.into_owned(),
                "content-type",
                mime.as_ref().to_string(),
            )
            .into_response()
        }
        None => {
            debug!("No embedded asset named {}", name);
            json_error(format!("{} not found", name), StatusCode::NOT_FOUND)
        }
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    };
    Ok(json_error(message, code))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::configuration::Config;
    use crate::session_management::SessionStatus;
    use crate::storage::{FileStorage, Storage};
    use crate::test_support::{fake_automation, fake_keygen};
    use crate::web_interface::types::SourcePaths;
    use tempfile::TempDir;

    struct Fixture {
        _tools: TempDir,
        _sessions: TempDir,
        storage: Arc<FileStorage>,
        ctx: Arc<ApiContext>,
    }

    fn fixture() -> Fixture {
        let tools = TempDir::new().unwrap();
        let sessions = TempDir::new().unwrap();
        let mut config = Config::default();
        config.keygen.command = fake_keygen(tools.path());
        config.automation.command = fake_automation(tools.path(), 0, 0).0;
        config.server.public_url = Some("http://h.test".into());

        let storage = Arc::new(FileStorage::new(sessions.path()).unwrap());
        let manager = Arc::new(SessionManager::new(storage.clone(), &config));
        let (dispatcher, _worker) = Dispatcher::spawn(manager.clone());
        Fixture {
            _tools: tools,
            _sessions: sessions,
            storage,
            ctx: Arc::new(ApiContext {
                manager,
                dispatcher,
                public_url: config.public_url(),
            }),
        }
    }

    fn create_body(paths: &str) -> CreateSessionRequest {
        CreateSessionRequest {
            src_paths: SourcePaths::Joined(paths.to_string()),
            dest_path: None,
        }
    }

    fn accept_body(host: &str) -> AcceptRequest {
        AcceptRequest {
            client_host: host.to_string(),
            client_user: "u".to_string(),
            dest_path: None,
        }
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            status_code(&SessionError::ValidationError("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&SessionError::NotFound("t".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_code(&SessionError::InvalidTransition {
                from: SessionStatus::TransferSuccess,
                to: SessionStatus::StartingTransfer,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_code(&SessionError::AlreadyExists("t".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_code(&SessionError::LaunchFailure("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_embedded_pages_are_served() {
        for page in ["index.html", "share.html", "accept.html", "status.html"] {
            let response = serve_asset(page);
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["content-type"], "text/html");
        }
        let css = serve_asset("assets/style.css");
        assert_eq!(css.headers()["content-type"], "text/css");
        assert_eq!(serve_asset("missing.html").status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_then_share() {
        let f = fixture();

        let response = create_session(f.ctx.clone(), create_body("/a,/b")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let sessions = f.storage.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].src_paths, vec!["/a", "/b"]);

        let response = share_info(sessions[0].token.clone(), f.ctx.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_without_sources_is_bad_request() {
        let f = fixture();
        let response = create_session(f.ctx.clone(), create_body(" , ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(f.storage.list_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_queues_orchestration() {
        let f = fixture();
        let session = f.ctx.manager.create(vec!["/a".into()], None).await.unwrap();

        let response = accept_session(session.token.clone(), f.ctx.clone(), accept_body("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let second = accept_session(session.token.clone(), f.ctx.clone(), accept_body("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        for _ in 0..100 {
            if f.storage.load_report(&session.token).unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        let response = session_status(session.token.clone(), f.ctx.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored = f.storage.load_session(&session.token).unwrap();
        assert_eq!(stored.status, SessionStatus::TransferSuccess);
        assert_eq!(stored.cleanup_rc, Some(0));
    }

    #[tokio::test]
    async fn test_accept_with_closed_queue_records_error() {
        let f = fixture();
        let ctx = Arc::new(ApiContext {
            manager: f.ctx.manager.clone(),
            dispatcher: Dispatcher::closed(),
            public_url: f.ctx.public_url.clone(),
        });
        let session = ctx.manager.create(vec!["/a".into()], None).await.unwrap();

        let response = accept_session(session.token.clone(), ctx.clone(), accept_body("10.0.0.5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let stored = f.storage.load_session(&session.token).unwrap();
        assert_eq!(stored.status, SessionStatus::StartingTransfer);
        assert_eq!(stored.error.as_deref(), Some("Orchestration queue is closed"));
        assert!(ctx.manager.pending_runs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_accept_and_unknown_token() {
        let f = fixture();
        let session = f.ctx.manager.create(vec!["/a".into()], None).await.unwrap();

        let response = accept_session(session.token.clone(), f.ctx.clone(), accept_body(""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = session_status("unknowntoken1234".into(), f.ctx.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = share_info("../../etc".into(), f.ctx.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
