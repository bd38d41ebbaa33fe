//! Connection-type inference from ISP, organization and ASN names.
//!
//! Matching is a case-insensitive substring search over four keyword sets,
//! tried in a fixed order: mobile, datacentre, fibre, dsl. The first set with
//! a hit wins, so a name that mentions both a carrier and a cloud resolves to
//! [`ConnectionType::Mobile`].

use portwatch_core::ConnectionType;

const MOBILE_KEYWORDS: &[&str] = &[
    "mobile", "lte", "4g", "5g", "cellular", "wireless", "vodafone", "t-mobile", "verizon",
    "at&t", "att",
];

const DATACENTRE_KEYWORDS: &[&str] = &[
    "aws",
    "amazon",
    "azure",
    "microsoft",
    "google",
    "gcp",
    "hetzner",
    "ovh",
    "digitalocean",
    "linode",
    "vultr",
    "datacentre",
    "datacenter",
    "hosting",
    "cloud",
];

const FIBRE_KEYWORDS: &[&str] = &["fiber", "fibre", "ftth", "fttp"];

const DSL_KEYWORDS: &[&str] = &["dsl", "vdsl", "adsl", "broadband"];

/// Keyword sets in precedence order.
const RULES: &[(ConnectionType, &[&str])] = &[
    (ConnectionType::Mobile, MOBILE_KEYWORDS),
    (ConnectionType::Datacentre, DATACENTRE_KEYWORDS),
    (ConnectionType::Fibre, FIBRE_KEYWORDS),
    (ConnectionType::Dsl, DSL_KEYWORDS),
];

/// Classify an ISP or organization name.
#[must_use]
pub fn classify(name: &str) -> ConnectionType {
    let haystack = name.to_lowercase();

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| haystack.contains(kw)))
        .map_or(ConnectionType::Unknown, |(kind, _)| *kind)
}

/// Classify using every name the provider returned for an IP.
#[must_use]
pub fn classify_parts(isp: &str, org: &str, asn: &str) -> ConnectionType {
    classify(&format!("{isp} {org} {asn}"))
}
