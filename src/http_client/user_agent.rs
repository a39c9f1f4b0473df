//! User agent handling for HTTP requests.

pub const USER_AGENT: &str = concat!(
    "biocfetch/",
    env!("CARGO_PKG_VERSION"),
    " (academic research)"
);

/// Resolve user agent from config values.
/// - custom set => used verbatim
/// - otherwise the default agent, with the contact email appended when known
///   (NCBI asks clients to identify themselves)
pub fn resolve_user_agent(custom: Option<&str>, email: Option<&str>) -> String {
    match (custom, email) {
        (Some(custom), _) if !custom.trim().is_empty() => custom.to_string(),
        (_, Some(email)) if !email.trim().is_empty() => {
            format!("{} mailto:{}", USER_AGENT, email.trim())
        }
        _ => USER_AGENT.to_string(),
    }
}
