use crate::honeypot::HoneypotInputs;
use crate::outcome::{ContactResponse, Outcome};
use crate::processor::ContactProcessor;
use crate::submission::FormFields;
use axum::extract::rejection::FormRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ContactProcessor>,
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/contact", post(contact_handler))
        .route("/contact/honeypot", get(honeypot_handler))
        .route("/healthz", get(healthz_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then let in-flight submissions finish.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    log::info!("Contact relay listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("Contact relay stopped");
    Ok(())
}

async fn contact_handler(
    State(state): State<AppState>,
    form: Result<Form<FormFields>, FormRejection>,
) -> Json<ContactResponse> {
    let outcome = match form {
        Ok(Form(fields)) => state.processor.process_isolated(fields).await,
        Err(rejection) => {
            log::error!("Error: unreadable contact form submission: {rejection}");
            Outcome::DeliveryFailed
        }
    };
    Json(ContactResponse::from(outcome))
}

async fn honeypot_handler(State(state): State<AppState>) -> Json<HoneypotInputs> {
    Json(state.processor.honeypot().inputs())
}

async fn healthz_handler() -> &'static str {
    "ok"
}
