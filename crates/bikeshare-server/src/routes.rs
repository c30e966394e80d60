//! URL and method dispatch for the resource API.
//!
//! Bikes are served under `/resources` and, for older clients, `/api/bikes`.

use bikeshare_schema::{BikeId, Filter};
use tiny_http::Method;

pub const ROUTE_PREFIXES: [&str; 2] = ["/resources", "/api/bikes"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Hello,
    Health,
    ListAvailable(Filter),
    Create,
    Get(BikeId),
    Replace(BikeId),
    Delete(BikeId),
    Reserve(BikeId),
    Clear(BikeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    MethodNotAllowed,
}

impl RouteError {
    pub fn status_code(self) -> u16 {
        match self {
            RouteError::NotFound => 404,
            RouteError::MethodNotAllowed => 405,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RouteError::NotFound => "not found",
            RouteError::MethodNotAllowed => "method not allowed",
        }
    }
}

/// Split a request URL into its path and optional query string.
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Decode `field=value&...` into listing criteria.
pub fn parse_filter(query: Option<&str>) -> Filter {
    match query {
        Some(q) => Filter::from_pairs(url::form_urlencoded::parse(q.as_bytes())),
        None => Filter::new(),
    }
}

/// Strip a resource prefix, returning what follows it (`""`, `"/"`, `"/{id}..."`).
fn strip_resource_prefix(path: &str) -> Option<&str> {
    ROUTE_PREFIXES.iter().find_map(|prefix| {
        path.strip_prefix(prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

pub fn parse_route(method: &Method, url: &str) -> Result<Route, RouteError> {
    let (path, query) = split_url(url);

    match path {
        "/hello" => {
            return match method {
                Method::Get => Ok(Route::Hello),
                _ => Err(RouteError::MethodNotAllowed),
            }
        }
        "/health" => {
            return match method {
                Method::Get => Ok(Route::Health),
                _ => Err(RouteError::MethodNotAllowed),
            }
        }
        _ => {}
    }

    let rest = strip_resource_prefix(path).ok_or(RouteError::NotFound)?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    match (segments.as_slice(), method) {
        ([], Method::Get) => Ok(Route::ListAvailable(parse_filter(query))),
        ([], Method::Post) => Ok(Route::Create),
        ([], _) => Err(RouteError::MethodNotAllowed),
        ([id], Method::Get) => Ok(Route::Get(BikeId::new(*id))),
        ([id], Method::Put) => Ok(Route::Replace(BikeId::new(*id))),
        ([id], Method::Delete) => Ok(Route::Delete(BikeId::new(*id))),
        ([_], _) => Err(RouteError::MethodNotAllowed),
        ([id, "reserve"], Method::Patch) => Ok(Route::Reserve(BikeId::new(*id))),
        ([id, "clear"], Method::Patch) => Ok(Route::Clear(BikeId::new(*id))),
        ([_, "reserve" | "clear"], _) => Err(RouteError::MethodNotAllowed),
        _ => Err(RouteError::NotFound),
    }
}
