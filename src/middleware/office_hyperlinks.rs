//! Office hyperlink handling.
//!
//! Office applications fetch a link themselves before handing it to the
//! browser. Without cookies that fetch ends in a sign-in redirect, and Office
//! opens the sign-in page instead of the original link. Answering the Office
//! fetcher with a self-refreshing page makes it pass the original URL on.

use http::Method;

use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

const PAGE: &str = "<html><head><meta http-equiv=\"refresh\" content=\"0\"/></head><body></body></html>";

fn is_office(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    ua.contains("ms-office") || ua.contains("microsoft office")
}

pub async fn office_hyperlinks(req: Request, next: Next) -> Response {
    let from_office = matches!(*req.method(), Method::GET | Method::HEAD)
        && req.header("user-agent").is_some_and(is_office);
    if from_office {
        return Response::html(PAGE);
    }
    next.run(req).await
}
