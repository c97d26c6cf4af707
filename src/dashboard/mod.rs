//! HTTP JSON API.

mod server;

pub use server::{
    DashboardHandle, DashboardServer, IDENTITY_HEADER, build_router, start_server, status_for,
};
