//! Filter Chain Engine (C9): an explicit registry of filter values executed
//! in order around the reverse-proxy call, per §4.3 and the REDESIGN FLAGS
//! note that annotation-driven filter chains don't survive translation —
//! "chain composition is data, not metaprogramming".
//!
//! Each filter is a value implementing [`PreFilter`] or [`PostFilter`];
//! `order()` fixes its position and the engine sorts by it rather than by
//! declaration or attribute scanning. Pre-filters run ascending by `order`
//! and may short-circuit with a terminal response; post-filters always run
//! (even after a short-circuit, per §4.3's "runs on every exit path"),
//! descending by `order`.

use std::sync::Arc;

use actix_web::HttpResponse;
use async_trait::async_trait;
use log::error;

use crate::models::context::RequestContext;
use crate::state::AppState;

/// Outcome of a pre-filter's evaluation.
pub enum PreOutcome {
    /// Continue to the next pre-filter (or to the reverse proxy call).
    Continue,
    /// Stop the chain here; `C10` is never called. Post-filters still run.
    ShortCircuit(HttpResponse),
}

#[async_trait]
pub trait PreFilter: Send + Sync {
    fn name(&self) -> &'static str;
    /// Position in the pre-filter chain; lower runs first.
    fn order(&self) -> i32;
    async fn apply(&self, ctx: &mut RequestContext, state: &AppState) -> PreOutcome;
}

#[async_trait]
pub trait PostFilter: Send + Sync {
    fn name(&self) -> &'static str;
    /// Position in the post-filter chain; the engine runs these descending.
    fn order(&self) -> i32;
    async fn apply(&self, ctx: &mut RequestContext, state: &AppState, response: HttpResponse) -> HttpResponse;
}

/// Holds the ordered filter registries and runs a request through them.
/// Constructed once at startup; the engine itself is stateless and `Clone`
/// (an `Arc` of filter trait objects).
#[derive(Clone)]
pub struct FilterChainEngine {
    pre: Arc<Vec<Box<dyn PreFilter>>>,
    post: Arc<Vec<Box<dyn PostFilter>>>,
}

impl FilterChainEngine {
    pub fn new(mut pre: Vec<Box<dyn PreFilter>>, mut post: Vec<Box<dyn PostFilter>>) -> Self {
        pre.sort_by_key(|f| f.order());
        post.sort_by_key(|f| std::cmp::Reverse(f.order()));
        Self {
            pre: Arc::new(pre),
            post: Arc::new(post),
        }
    }

    /// Runs the pre-filter chain. Returns `Err(response)` the instant a
    /// filter short-circuits; callers must still run `run_post` on that
    /// response.
    pub async fn run_pre(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), HttpResponse> {
        for filter in self.pre.iter() {
            match filter.apply(ctx, state).await {
                PreOutcome::Continue => continue,
                PreOutcome::ShortCircuit(response) => {
                    return Err(response);
                }
            }
        }
        Ok(())
    }

    /// Runs the post-filter chain over whatever response resulted from
    /// forwarding (or from a pre-filter short-circuit). Always runs every
    /// registered post-filter, per §4.3.
    pub async fn run_post(&self, ctx: &mut RequestContext, state: &AppState, mut response: HttpResponse) -> HttpResponse {
        for filter in self.post.iter() {
            response = filter.apply(ctx, state, response).await;
        }
        response
    }
}

/// Converts an unexpected panic caught at the chain boundary into a 500
/// problem-details response, per §4.3 / §7's panic-propagation policy.
pub fn panic_to_problem_details(request_id: &str) -> HttpResponse {
    use crate::models::error::{GatewayError, GatewayErrorKind};
    error!("filter chain panicked for request {request_id}");
    let err = GatewayError::new(GatewayErrorKind::Internal, "internal gateway error", request_id);
    <GatewayError as actix_web::ResponseError>::error_response(&err)
}
