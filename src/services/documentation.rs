use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Fact or Fiction Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::facts::random_fact,
        crate::routes::auth::sign_up,
        crate::routes::auth::sign_in,
        crate::routes::auth::sign_out,
        crate::routes::profile::get_profile,
        crate::routes::profile::get_leaderboard,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::start_round,
        crate::routes::session::submit_answer,
        crate::routes::session::advance_round,
        crate::routes::session::attach_identity,
        crate::routes::session::close_session,
        crate::routes::sse::session_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::ActionResponse,
            crate::facts::Fact,
            crate::auth::Identity,
            crate::dto::auth::SignUpRequest,
            crate::dto::auth::SignInRequest,
            crate::dto::auth::SessionResponse,
            crate::dto::profile::ProfileResponse,
            crate::dto::profile::LeaderboardEntry,
            crate::dto::round::RoundView,
            crate::dto::round::AnswerRequest,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "facts", description = "Random fact generation"),
        (name = "auth", description = "Account sessions"),
        (name = "profile", description = "Profiles and leaderboard"),
        (name = "sessions", description = "Game sessions and rounds"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
