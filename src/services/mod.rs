/// Account sign-up, sign-in and sign-out.
pub mod auth_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Fact endpoint backing `/facts/random`.
pub mod fact_service;
/// Health check service.
pub mod health_service;
/// Profile and leaderboard reads.
pub mod profile_service;
/// Game session lifecycle and player intents.
pub mod session_service;
/// Background removal of idle game sessions.
pub mod session_sweeper;
/// Server-Sent Events streaming of round snapshots.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
