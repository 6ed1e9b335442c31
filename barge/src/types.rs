use serde::Serialize;

/// Where and how to reach the cluster API of one barge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    pub barge_id: String,
    pub api_endpoint: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    /// True when the endpoint came from discovery rather than static config
    pub is_dynamically_managed: bool,
}

impl ResolvedEndpoint {
    pub fn new<B, E>(barge_id: B, api_endpoint: E, auth_token: Option<String>, dynamic: bool) -> Self
    where
        B: Into<String>,
        E: Into<String>,
    {
        ResolvedEndpoint {
            barge_id: barge_id.into(),
            api_endpoint: api_endpoint.into(),
            auth_token,
            is_dynamically_managed: dynamic,
        }
    }
}
