//! Parsing of `WWW-Authenticate: Bearer ...` challenges.

/// A Bearer challenge advertised by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// URL of the token server.
    pub realm: String,
    /// Service name the token server expects.
    pub service: Option<String>,
    /// Scope suggested by the registry.
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Returns `None` unless the value is a Bearer challenge with a non-empty
    /// `realm` parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwork_registry::BearerChallenge;
    ///
    /// let challenge = BearerChallenge::parse(
    ///     r#"Bearer realm="https://auth.example/token",service="x""#,
    /// ).unwrap();
    /// assert_eq!(challenge.realm, "https://auth.example/token");
    /// assert_eq!(challenge.service.as_deref(), Some("x"));
    /// ```
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim_start();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in parse_params(params) {
            if key.eq_ignore_ascii_case("realm") {
                realm = Some(value);
            } else if key.eq_ignore_ascii_case("service") {
                service = Some(value);
            } else if key.eq_ignore_ascii_case("scope") {
                scope = Some(value);
            }
        }

        Some(Self {
            realm: realm.filter(|r| !r.is_empty())?,
            service,
            scope,
        })
    }
}

/// Splits `k1="v1", k2=v2` into key/value pairs, honouring quoted strings.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        if key.trim().is_empty() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim().to_string();
        }

        params.push((key.trim().to_string(), value));
    }

    params
}
