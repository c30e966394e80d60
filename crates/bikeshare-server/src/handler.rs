use crate::routes::{parse_route, Route};
use bikeshare_core::{BikeService, CoreError};
use bikeshare_schema::{Operation, ValidationError};
use serde_json::{json, Value};
use std::io::Read;
use tiny_http::{Header, Request, Response, StatusCode};
use tracing::{debug, error, info, warn};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// What the worker loop should do after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Served,
    /// The store is gone; stop serving.
    Fatal,
}

enum BodyError {
    TooLarge,
    Read(std::io::Error),
}

fn respond_json(req: Request, code: u16, body: &Value) -> u16 {
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(
        Response::from_string(body.to_string())
            .with_status_code(StatusCode(code))
            .with_header(header),
    );
    code
}

fn respond_text(req: Request, code: u16, msg: &str) -> u16 {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
    code
}

fn read_body(req: &mut Request) -> Result<Vec<u8>, BodyError> {
    if req.body_length().is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(BodyError::TooLarge);
    }
    let mut body = Vec::new();
    req.as_reader()
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut body)
        .map_err(BodyError::Read)?;
    if body.len() > MAX_BODY_BYTES {
        return Err(BodyError::TooLarge);
    }
    Ok(body)
}

fn parse_json(body: &[u8], operation: Operation) -> Result<Value, CoreError> {
    serde_json::from_slice(body).map_err(|e| {
        ValidationError::malformed_body(operation, format!("is not valid JSON: {e}")).into()
    })
}

pub fn error_body(e: &CoreError) -> Value {
    let mut body = json!({
        "error": e.kind(),
        "message": e.to_string(),
    });
    if let CoreError::Validation(v) = e {
        body["details"] = json!(v.violations);
    }
    body
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Codec(e.into()))
}

fn dispatch(service: &BikeService, route: Route, body: Option<&[u8]>) -> Result<Value, CoreError> {
    let body = body.unwrap_or_default();
    match route {
        Route::Hello | Route::Health => Ok(json!({"status": "ok"})),
        Route::ListAvailable(filter) => to_json(&service.list_available(&filter)?),
        Route::Create => {
            let payload = parse_json(body, Operation::Create)?;
            to_json(&service.create(&payload)?)
        }
        Route::Get(id) => to_json(&service.get(&id)?),
        Route::Replace(id) => {
            let payload = parse_json(body, Operation::Update)?;
            to_json(&service.replace(&id, &payload)?)
        }
        Route::Delete(id) => {
            service.delete(&id)?;
            Ok(json!({"id": id, "deleted": true}))
        }
        Route::Reserve(id) => {
            service.reserve(&id)?;
            Ok(json!({"id": id, "available": false}))
        }
        Route::Clear(id) => {
            service.clear(&id)?;
            Ok(json!({"id": id, "available": true}))
        }
    }
}

/// Handle a single HTTP request, dispatching to the matching operation.
pub fn handle_request(service: &BikeService, mut req: Request) -> Disposition {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let route = match parse_route(&method, &url) {
        Ok(route) => route,
        Err(e) => {
            let code = respond_text(req, e.status_code(), e.message());
            info!("{method} {url} -> {code}");
            return Disposition::Served;
        }
    };

    let body = match route {
        Route::Create | Route::Replace(_) => match read_body(&mut req) {
            Ok(body) => Some(body),
            Err(BodyError::TooLarge) => {
                let code = respond_text(req, 413, "request body too large");
                info!("{method} {url} -> {code}");
                return Disposition::Served;
            }
            Err(BodyError::Read(e)) => {
                warn!("{method} {url}: reading body failed: {e}");
                respond_text(req, 400, "could not read request body");
                return Disposition::Served;
            }
        },
        _ => None,
    };

    if route == Route::Hello {
        let code = respond_text(req, 200, "hello!");
        info!("{method} {url} -> {code}");
        return Disposition::Served;
    }

    match dispatch(service, route, body.as_deref()) {
        Ok(value) => {
            let code = respond_json(req, 200, &value);
            info!("{method} {url} -> {code}");
            Disposition::Served
        }
        Err(e) => {
            let code = respond_json(req, e.status_code(), &error_body(&e));
            if e.is_fatal() {
                error!("{method} {url} -> {code}: {e}; shutting down");
                Disposition::Fatal
            } else if code >= 500 {
                error!("{method} {url} -> {code}: {e}");
                Disposition::Served
            } else {
                info!("{method} {url} -> {code}: {e}");
                Disposition::Served
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bikeshare_schema::{BikeId, Violation};

    #[test]
    fn validation_errors_carry_details() {
        let e = CoreError::Validation(ValidationError {
            operation: Operation::Create,
            violations: vec![Violation::new("hourlyCost", "must be greater than 0")],
        });
        let body = error_body(&e);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["details"][0]["field"], "hourlyCost");
        assert_eq!(body["details"][0]["reason"], "must be greater than 0");
    }

    #[test]
    fn other_errors_have_no_details() {
        let body = error_body(&CoreError::NotFound(BikeId::new("8")));
        assert_eq!(body["error"], "not_found");
        assert!(body.get("details").is_none());
        assert!(body["message"].as_str().unwrap().contains('8'));
    }

    #[test]
    fn malformed_json_is_a_body_violation() {
        let err = parse_json(b"{nope", Operation::Create).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(matches!(err, CoreError::Validation(ref v) if v.mentions("body")));
    }
}
