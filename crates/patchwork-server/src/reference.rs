//! Repository name, tag and digest grammar.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of a repository name.
pub const NAME_MAX_LEN: usize = 255;

const NAME_COMPONENT: &str = r"[a-z0-9]+(?:(?:[._]|__|-*)[a-z0-9]+)*";
const DOMAIN_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    let domain = format!(r"{DOMAIN_COMPONENT}(?:\.{DOMAIN_COMPONENT})*(?::[0-9]+)?");
    Regex::new(&format!(
        r"^(?:{domain}/)?{NAME_COMPONENT}(?:/{NAME_COMPONENT})*$"
    ))
    .expect("valid name pattern")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$")
        .expect("valid tag pattern")
});

static DIGEST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}$")
        .expect("valid digest pattern")
});

/// Returns `true` if `name` is a valid repository name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= NAME_MAX_LEN && NAME_RE.is_match(name)
}

/// Returns `true` if `tag` is a valid tag.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    TAG_RE.is_match(tag)
}

/// Returns `true` if `digest` is a valid content digest.
#[must_use]
pub fn is_valid_digest(digest: &str) -> bool {
    DIGEST_RE.is_match(digest)
}

/// Returns `true` if `reference` is a tag or a digest.
#[must_use]
pub fn is_valid_reference(reference: &str) -> bool {
    is_valid_tag(reference) || is_valid_digest(reference)
}
