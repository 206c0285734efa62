//! Portfolio document endpoints

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;

use super::reply::ApiReply;
use crate::AppState;
use crate::auth::RequestSession;
use crate::data::Portfolio;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PortfolioQuery {
    username: Option<String>,
}

/// GET /api/get_portfolio[?username=]
///
/// With a username, the public portfolio of that handle. Without one, the
/// caller's own portfolio.
pub async fn get_portfolio(
    State(state): State<AppState>,
    Query(query): Query<PortfolioQuery>,
    RequestSession(mut session): RequestSession,
) -> Result<ApiReply, AppError> {
    let portfolio = match query.username.filter(|u| !u.is_empty()) {
        Some(handle) => state.db.get_portfolio_by_handle(&handle).await?,
        None => {
            let id = state.auth.current_login(&mut session).await?;
            state.db.get_portfolio_by_id(&id.0).await?
        }
    };

    let portfolio = portfolio.ok_or(AppError::NotFound)?;
    ApiReply::json(&portfolio)
}

/// POST /api/put_portfolio
///
/// The body is parsed here rather than by the `Json` extractor so that a
/// malformed document gets the standard error envelope.
pub async fn put_portfolio(
    State(state): State<AppState>,
    RequestSession(mut session): RequestSession,
    body: Bytes,
) -> Result<ApiReply, AppError> {
    let id = state.auth.current_login(&mut session).await?;

    let portfolio: Portfolio = serde_json::from_slice(&body)
        .map_err(|_| AppError::Validation("could not parse json".to_string()))?;

    if !state.db.save_portfolio(&id.0, &portfolio).await? {
        return Err(AppError::NotFound);
    }

    tracing::debug!(identity_id = %id, sections = portfolio.sections.len(), "Portfolio saved");
    Ok(ApiReply::NoBody)
}
