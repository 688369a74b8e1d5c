use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::{err, error_code};
use log::{debug, warn};

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::teachers::try_handle,
    handlers::subjects::try_handle,
    handlers::students::try_handle,
    handlers::enrollment::try_handle,
    handlers::attendance::try_handle,
    handlers::stats::try_handle,
    handlers::reports::try_handle,
    handlers::charts::try_handle,
];

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    for try_handle in HANDLERS {
        if let Some(resp) = try_handle(state, req) {
            return resp;
        }
    }
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let resp = dispatch(state, &req);
    match error_code(&resp) {
        None => debug!(
            "event=ipc_request module=ipc status=ok method={} id={}",
            req.method, req.id
        ),
        Some(code) => warn!(
            "event=ipc_request module=ipc status=error method={} id={} code={}",
            req.method, req.id, code
        ),
    }
    resp
}
