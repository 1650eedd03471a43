use std::{error::Error as StdError, str::FromStr as _, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::{fs, net, task};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

use helpdesk::{
    api, db, directory,
    service::{self, Backend, Settings},
    sla, Caller, Catalog, Config, Service,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn StdError>> {
    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    tracing_subscriber::registry()
        .with(LevelFilter::from_str(&config.log.level)?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (db_client, db_connection) = db::connect(&config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            tracing::error!(error = %e, "database connection failed");
        }
    });

    db_client.init_schema().await?;

    let service = Service::new(
        Backend::uniform(Arc::new(db_client)),
        Catalog::default(),
        sla::Policy::default(),
        Settings::from(&config.tickets),
    );
    service.bootstrap().await?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .route("/ticket", get(list_tickets).post(add_ticket))
        .route(
            "/ticket/:id",
            get(get_ticket).patch(edit_ticket).delete(delete_ticket),
        )
        .route("/ticket/:id/permanent", delete(purge_ticket))
        .route("/ticket/number/:number", get(get_ticket_by_number))
        .route("/ticket/:id/followers", post(add_follower))
        .route(
            "/ticket/:id/followers/:follower_id",
            delete(remove_follower),
        )
        .route("/ticket/:id/notes", post(add_note))
        .route("/note/:id", patch(edit_note).delete(delete_note))
        .route("/ticket/:id/tasks", post(add_task))
        .route("/task/:id", patch(edit_task).delete(delete_task))
        .layer(cors)
        .with_state(Arc::new(AppState {
            service,
            jwt_decoding_key: DecodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
        }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!(addr = %config.http.server.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTicketsInput {
    page: Option<usize>,
    limit: Option<usize>,
}

async fn list_tickets(
    State(state): State<SharedAppState>,
    _: Auth,
    Query(ListTicketsInput { page, limit }): Query<ListTicketsInput>,
    Query(filter): Query<api::ticket::Filter>,
    Query(sort): Query<api::ticket::Sort>,
) -> Result<Json<db::Paginated<api::Ticket>>, ApiError> {
    let default = db::Page::default();
    let page = db::Page {
        page: page.unwrap_or(default.page).max(1),
        limit: limit.unwrap_or(default.limit),
    };
    Ok(Json(state.service.list(&filter, page, sort).await?))
}

async fn add_ticket(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Json(input): Json<api::ticket::New>,
) -> Result<(StatusCode, Json<api::Ticket>), ApiError> {
    let ticket = state.service.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn get_ticket(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::ticket::Details>, ApiError> {
    Ok(Json(state.service.find_one_by_id(&caller, id).await?))
}

async fn get_ticket_by_number(
    State(state): State<SharedAppState>,
    _: Auth,
    Path(number): Path<String>,
) -> Result<Json<api::Ticket>, ApiError> {
    // The leading `#` does not survive in a path, so accept both forms.
    let number = if number.starts_with('#') {
        number
    } else {
        format!("#{number}")
    };
    let number = number
        .parse::<api::ticket::Number>()
        .map_err(|_| ApiError::Malformed)?;
    Ok(Json(state.service.find_by_number(&number).await?))
}

async fn edit_ticket(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
    Json(edit): Json<api::ticket::Edit>,
) -> Result<Json<api::ticket::Updated>, ApiError> {
    Ok(Json(state.service.update(&caller, id, edit).await?))
}

async fn delete_ticket(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
) -> Result<StatusCode, ApiError> {
    state.service.soft_delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn purge_ticket(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
) -> Result<StatusCode, ApiError> {
    if caller.external_id.is_none() {
        return Err(service::Error::Unauthenticated.into());
    }
    state.service.delete_permanently(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_follower(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
    Json(api::follower::Add { follower_id }): Json<api::follower::Add>,
) -> Result<Json<api::ticket::Updated>, ApiError> {
    Ok(Json(
        state.service.add_follower(&caller, id, &follower_id).await?,
    ))
}

async fn remove_follower(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path((id, follower_id)): Path<(api::ticket::Id, api::user::Id)>,
) -> Result<Json<api::ticket::Updated>, ApiError> {
    Ok(Json(
        state.service.remove_follower(&caller, id, follower_id).await?,
    ))
}

async fn add_note(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
    Json(input): Json<api::note::New>,
) -> Result<(StatusCode, Json<api::note::Note>), ApiError> {
    let note = state.service.add_note(&caller, id, input).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn edit_note(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::note::Id>,
    Json(edit): Json<api::note::Edit>,
) -> Result<Json<api::note::Note>, ApiError> {
    Ok(Json(state.service.update_note(&caller, id, edit).await?))
}

async fn delete_note(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::note::Id>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_note(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_task(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::ticket::Id>,
    Json(input): Json<api::task::New>,
) -> Result<(StatusCode, Json<api::task::Task>), ApiError> {
    let task = state.service.add_task(&caller, id, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn edit_task(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::task::Id>,
    Json(edit): Json<api::task::Edit>,
) -> Result<Json<api::task::Task>, ApiError> {
    Ok(Json(state.service.update_task(&caller, id, edit).await?))
}

async fn delete_task(
    State(state): State<SharedAppState>,
    Auth(caller): Auth,
    Path(id): Path<api::task::Id>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_task(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum ApiError {
    #[from]
    Service(service::Error),
    InvalidToken,
    Malformed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use service::Error as E;

        let status = match &self {
            Self::Service(E::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Service(E::Validation(_)) | Self::Malformed => {
                StatusCode::BAD_REQUEST
            }
            Self::Service(E::Dependency(directory::Error::NotFound(_))) => {
                StatusCode::BAD_REQUEST
            }
            Self::Service(
                E::Dependency(directory::Error::Unavailable(_))
                | E::Concurrency(_),
            ) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Service(E::Unauthenticated) | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::Service(E::Store(e)) => {
                tracing::error!(error = %e, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        match self {
            Self::Service(e) if status != StatusCode::INTERNAL_SERVER_ERROR => {
                (status, e.to_string()).into_response()
            }
            _ => status.into_response(),
        }
    }
}

type SharedAppState = Arc<AppState>;

struct AppState {
    service: Service,

    jwt_decoding_key: DecodingKey,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct AuthClaims {
    /// External party id of the bearer.
    sub: String,
    exp: i64,
}

/// The request's [`Caller`]. Requests without a bearer token are anonymous;
/// requests with an undecodable one are rejected.
struct Auth(Caller);

#[async_trait]
impl FromRequestParts<SharedAppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Self(Caller::anonymous()));
        }
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::InvalidToken)?;
        let token_data = decode::<AuthClaims>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| ApiError::InvalidToken)?;

        Ok(Self(
            Caller::authenticated(token_data.claims.sub)
                .with_token(bearer.token()),
        ))
    }
}
