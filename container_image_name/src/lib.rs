//! Container image references as accepted by `docker pull` and the kubelet, following the grammar
//! of [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go):
//!
//! ```txt
//! reference            := name [ ":" tag ] [ "@" digest ]
//! name                 := [domain '/'] path-component ['/' path-component]*
//! domain               := domain-component ['.' domain-component]* [':' port-number]
//! domain-component     := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! port-number          := /[0-9]+/
//! path-component       := alpha-numeric [separator alpha-numeric]*
//! alpha-numeric        := /[a-z0-9]+/
//! separator            := /[_.]|__|[-]*/
//! tag                  := /[\w][\w.-]{0,127}/
//! digest               := digest-algorithm ":" digest-hex
//! digest-algorithm     := component [ /[+.-_]/ component ]*
//! digest-hex           := /[0-9a-fA-F]{32,}/
//! identifier           := /[a-f0-9]{64}/
//! ```
//!
//! A bare 64 character identifier is accepted as well, like `ParseAnyReference` does.

use std::{fmt, ops::Range, str::FromStr, sync::LazyLock};

use regex::Regex;

/// Longest accepted name, excluding tag and digest.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Empty,
    Format,
    NameTooLong(usize),
    UppercaseRepository,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Empty => f.write_str("repository name must have at least one component"),
            InvalidReason::Format => f.write_str("invalid reference format"),
            InvalidReason::NameTooLong(len) => write!(
                f,
                "repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters, found {len}"
            ),
            InvalidReason::UppercaseRepository => {
                f.write_str("repository name must be lowercase")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidImageName {
    pub input: String,
    pub reason: InvalidReason,
}

impl std::error::Error for InvalidImageName {}

impl fmt::Display for InvalidImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid image name {:?}: {}", self.input, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parts {
    domain: Option<Range<usize>>,
    port: Option<Range<usize>>,
    path: Range<usize>,
    tag: Option<Range<usize>>,
    digest: Option<Range<usize>>,
}

static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    const DOMAIN_COMPONENT: &str = r"[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?";
    const PATH_COMPONENT: &str = r"[a-z0-9]+(?:(?:[_.]|__|[-]*)[a-z0-9]+)*";
    Regex::new(&format!(
        r"^(?:(?P<domain>{DOMAIN_COMPONENT}(?:\.{DOMAIN_COMPONENT})*)(?::(?P<port>[0-9]+))?/)?(?P<path>{PATH_COMPONENT}(?:/{PATH_COMPONENT})*)(?::(?P<tag>[\w][\w.-]{{0,127}}))?(?:@(?P<digest>[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{{32,}}))?$"
    ))
    .expect("reference regex is valid")
});

static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("identifier regex is valid"));

fn parse(value: &str) -> Result<Parts, InvalidReason> {
    if value.is_empty() {
        return Err(InvalidReason::Empty);
    }

    if IDENTIFIER_REGEX.is_match(value) {
        return Ok(Parts {
            domain: None,
            port: None,
            path: 0..value.len(),
            tag: None,
            digest: None,
        });
    }

    let Some(captures) = REFERENCE_REGEX.captures(value) else {
        // Match again with the repository lowercased to tell the user what is actually wrong.
        let lowered = value.to_ascii_lowercase();
        if lowered != value && REFERENCE_REGEX.is_match(&lowered) {
            return Err(InvalidReason::UppercaseRepository);
        }
        return Err(InvalidReason::Format);
    };

    let range = |name: &str| captures.name(name).map(|m| m.range());

    let path = range("path").ok_or(InvalidReason::Format)?;
    let name_len = path.end;
    if name_len > NAME_TOTAL_LENGTH_MAX {
        return Err(InvalidReason::NameTooLong(name_len));
    }

    let mut domain = range("domain");
    let mut path = path;

    // A single leading component is only a domain if it looks like a host: it contains a dot, a
    // port or is `localhost`. Otherwise it is the first path component, e.g. `library/nginx`.
    if let Some(d) = domain.clone() {
        let text = &value[d.clone()];
        let is_host = text.contains('.') || text == "localhost" || range("port").is_some();
        if !is_host {
            if !text.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.')) {
                return Err(InvalidReason::UppercaseRepository);
            }
            path = d.start..path.end;
            domain = None;
        }
    }

    Ok(Parts {
        port: domain.as_ref().and(range("port")),
        domain,
        path,
        tag: range("tag"),
        digest: range("digest"),
    })
}

/// A validated, owned container image reference.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageName {
    value: String,
}

impl ImageName {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidImageName> {
        let value = value.into();
        match parse(&value) {
            Ok(_) => Ok(Self { value }),
            Err(reason) => Err(InvalidImageName {
                input: value,
                reason,
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn as_ref(&self) -> ImageNameRef<'_> {
        // The value was validated on construction.
        ImageNameRef::new(&self.value).expect("validated on construction")
    }
}

impl FromStr for ImageName {
    type Err = InvalidImageName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A parsed image reference borrowing its input. Written as:
///
/// ```txt
/// <domain>:<port>/<path>:<tag>@<algorithm>:<hex>
/// ```
///
/// Only `<path>` is required. `<port>` requires `<domain>`.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageNameRef<'a> {
    value: &'a str,
    parts: Parts,
}

impl<'a> ImageNameRef<'a> {
    pub fn new(value: &'a str) -> Result<Self, InvalidImageName> {
        parse(value)
            .map(|parts| Self { value, parts })
            .map_err(|reason| InvalidImageName {
                input: value.to_owned(),
                reason,
            })
    }

    fn slice(&self, range: &Option<Range<usize>>) -> Option<&'a str> {
        range.clone().map(|range| &self.value[range])
    }

    pub fn domain(&self) -> Option<&'a str> {
        self.slice(&self.parts.domain)
    }

    pub fn port(&self) -> Option<&'a str> {
        self.slice(&self.parts.port)
    }

    pub fn path(&self) -> &'a str {
        &self.value[self.parts.path.clone()]
    }

    /// The final `/` separated component of the path, e.g. `nginx` for `docker.io/library/nginx`.
    pub fn last_path_component(&self) -> &'a str {
        let path = self.path();
        path.rsplit('/').next().unwrap_or(path)
    }

    pub fn tag(&self) -> Option<&'a str> {
        self.slice(&self.parts.tag)
    }

    pub fn digest(&self) -> Option<&'a str> {
        self.slice(&self.parts.digest)
    }

    pub fn as_str(&self) -> &'a str {
        self.value
    }

    pub fn to_owned(&self) -> ImageName {
        ImageName {
            value: self.value.to_owned(),
        }
    }
}

impl fmt::Debug for ImageNameRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl fmt::Display for ImageNameRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ImageName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ImageName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_names() {
        let name = ImageNameRef::new("nginx").unwrap();
        assert_eq!(name.domain(), None);
        assert_eq!(name.path(), "nginx");
        assert_eq!(name.tag(), None);
        assert_eq!(name.last_path_component(), "nginx");

        let name = ImageNameRef::new("library/busybox:1.36").unwrap();
        assert_eq!(name.domain(), None);
        assert_eq!(name.path(), "library/busybox");
        assert_eq!(name.tag(), Some("1.36"));
        assert_eq!(name.last_path_component(), "busybox");
    }

    #[test]
    fn parses_registry_port_tag_and_digest() {
        let name = ImageNameRef::new(
            "reg.io:5000/org-name/img_name:v1@sha256:01234567aaaaaaaa01234567aaaaaaaa",
        )
        .unwrap();
        assert_eq!(name.domain(), Some("reg.io"));
        assert_eq!(name.port(), Some("5000"));
        assert_eq!(name.path(), "org-name/img_name");
        assert_eq!(name.tag(), Some("v1"));
        assert_eq!(
            name.digest(),
            Some("sha256:01234567aaaaaaaa01234567aaaaaaaa")
        );

        let name = ImageNameRef::new("localhost/app").unwrap();
        assert_eq!(name.domain(), Some("localhost"));
        assert_eq!(name.path(), "app");
    }

    #[test]
    fn accepts_identifiers() {
        let id = "a".repeat(64);
        assert_eq!(ImageNameRef::new(&id).unwrap().path(), id);
    }

    #[test]
    fn rejects_invalid_references() {
        assert_eq!(ImageNameRef::new("").unwrap_err().reason, InvalidReason::Empty);
        assert_eq!(ImageNameRef::new("#").unwrap_err().reason, InvalidReason::Format);
        assert_eq!(ImageNameRef::new(".").unwrap_err().reason, InvalidReason::Format);
        assert_eq!(
            ImageNameRef::new("a@sha256:1234").unwrap_err().reason,
            InvalidReason::Format
        );
        assert_eq!(
            ImageNameRef::new("Nginx").unwrap_err().reason,
            InvalidReason::UppercaseRepository
        );
        assert_eq!(
            ImageNameRef::new(&"a".repeat(256)).unwrap_err().reason,
            InvalidReason::NameTooLong(256)
        );
    }

    #[test]
    fn error_message_names_input() {
        let error = ImageName::new("#").unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid image name \"#\": invalid reference format"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_validates() {
        let name: ImageName = serde_json::from_str(r#""busybox:latest""#).unwrap();
        assert_eq!(name.as_str(), "busybox:latest");
        assert_eq!(serde_json::to_string(&name).unwrap(), r#""busybox:latest""#);
        assert!(serde_json::from_str::<ImageName>(r##""#""##).is_err());
    }
}
