//! Marketing campaign attribution from `utm_*` query parameters.

use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// Campaign attribution attached to requests that carry `utm_*` parameters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Campaign {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub name: Option<String>,
}

impl Campaign {
    fn from_request(req: &Request) -> Option<Self> {
        let mut campaign = Self::default();
        for (key, value) in req.query_pairs() {
            match key.as_str() {
                "utm_source" => campaign.source = Some(value),
                "utm_medium" => campaign.medium = Some(value),
                "utm_campaign" => campaign.name = Some(value),
                _ => {}
            }
        }
        (campaign != Self::default()).then_some(campaign)
    }
}

pub async fn campaign(mut req: Request, next: Next) -> Response {
    if let Some(campaign) = Campaign::from_request(&req) {
        req.extensions_mut().insert(campaign);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn only_present_when_tagged() {
        let tagged = Request::new(Method::GET, "/?utm_source=newsletter&utm_campaign=spring");
        let campaign = Campaign::from_request(&tagged).unwrap();
        assert_eq!(campaign.source.as_deref(), Some("newsletter"));
        assert_eq!(campaign.name.as_deref(), Some("spring"));
        assert!(campaign.medium.is_none());

        assert!(Campaign::from_request(&Request::new(Method::GET, "/?page=2")).is_none());
    }
}
