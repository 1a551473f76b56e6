//! HTTP upload boundary for the processing pipeline
//!
//! - POST /observations/:subject_id/audio - run the pipeline over an upload
//! - GET /observations/:subject_id - stored records for a subject
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
