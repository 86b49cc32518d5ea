//! JSON HTTP API for Canvass.
//!
//! Exposes an axum [`Router`] backed by any [`SurveyStore`] and
//! [`ChannelAdapter`]: the authoring interface, dispatch, the delivery log,
//! analytics, and the public take-survey endpoints. Auth for the
//! administrative routes and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", canvass_api::api_router(state))
//! ```

pub mod analytics;
pub mod dispatch;
pub mod error;
pub mod recipients;
pub mod records;
pub mod state;
pub mod surveys;
pub mod take;

use axum::{
  Router,
  routing::{get, post},
};
use canvass_core::{channel::ChannelAdapter, store::SurveyStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, A>(state: AppState<S, A>) -> Router<()>
where
  S: SurveyStore + 'static,
  A: ChannelAdapter + 'static,
{
  Router::new()
    // Authoring
    .route("/surveys", post(surveys::create::<S, A>))
    .route("/surveys/{id}", get(surveys::get_one::<S, A>))
    .route("/surveys/{id}/status", post(surveys::set_status::<S, A>))
    .route("/recipients", post(recipients::create::<S, A>))
    .route("/recipients/{id}", get(recipients::get_one::<S, A>))
    // Dispatch and its records
    .route("/surveys/{id}/dispatch", post(dispatch::handler::<S, A>))
    .route("/surveys/{id}/invitations", get(records::invitations::<S, A>))
    .route("/surveys/{id}/deliveries", get(records::deliveries::<S, A>))
    .route("/surveys/{id}/responses", get(records::responses::<S, A>))
    .route("/surveys/{id}/analytics", get(analytics::handler::<S, A>))
    // Public
    .route(
      "/surveys/{id}/take",
      get(take::form::<S, A>).post(take::submit::<S, A>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
