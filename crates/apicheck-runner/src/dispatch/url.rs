//! URL construction: base URL + endpoint + path segments, then query string

use reqwest::Url;

use super::DispatchError;

/// Primitive query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for QueryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered query parameters. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, QueryValue)>,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Append only when `value` is `Some`; optional search filters left
    /// unset never reach the query string.
    #[must_use]
    pub fn with_opt<V: Into<QueryValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Drop leading, trailing and repeated `/` from one path part.
///
/// `"Wizards"`, `"/Wizards/"` and `"Wizards/"` all become `"Wizards"`.
#[must_use]
pub fn normalize_segment(segment: &str) -> String {
    segment
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `{base_url}/{endpoint}/{segments...}` with slashes normalized and empty
/// parts dropped. Unescaped; for messages only, [`build_url`] builds the
/// request URL.
#[must_use]
pub fn join_path(base_url: &str, endpoint: &str, segments: &[&str]) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();
    for part in path_parts(endpoint, segments) {
        url.push('/');
        url.push_str(part);
    }
    url
}

/// Non-empty `/`-separated pieces of the endpoint and every segment, in order.
fn path_parts<'a>(endpoint: &'a str, segments: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
    std::iter::once(endpoint)
        .chain(segments.iter().copied())
        .flat_map(|part| part.split('/'))
        .filter(|piece| !piece.is_empty())
}

/// Parse `base_url`, append the endpoint and segments as percent-encoded path
/// segments, then append `query` (form-urlencoded, in order).
///
/// Reserved characters inside a segment (`#`, `?`, `%`, ...) are escaped, so
/// they stay part of the path.
pub fn build_url(
    base_url: &str,
    endpoint: &str,
    segments: &[&str],
    query: Option<&QueryParams>,
) -> Result<Url, DispatchError> {
    let invalid = |detail: String| DispatchError::InvalidUrl {
        url: join_path(base_url, endpoint, segments),
        detail,
    };

    let mut url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("base URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(path_parts(endpoint, segments));

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query.iter() {
            pairs.append_pair(key, &value.to_string());
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: &str = "https://wizard-world-api.herokuapp.com";

    // ── path joining ──

    #[test]
    fn slash_variants_normalize_identically() {
        let plain = join_path(BASE, "Wizards", &[]);
        assert_eq!(plain, "https://wizard-world-api.herokuapp.com/Wizards");
        assert_eq!(join_path(BASE, "/Wizards/", &[]), plain);
        assert_eq!(join_path(BASE, "Wizards/", &[]), plain);
        assert_eq!(join_path(&format!("{BASE}/"), "//Wizards", &[]), plain);
    }

    #[test]
    fn segments_are_appended_in_order() {
        assert_eq!(
            join_path(BASE, "Wizards", &["/1/", "elixirs"]),
            "https://wizard-world-api.herokuapp.com/Wizards/1/elixirs"
        );
    }

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(
            join_path(BASE, "Wizards", &["", "/", "1"]),
            "https://wizard-world-api.herokuapp.com/Wizards/1"
        );
        assert_eq!(join_path(BASE, "", &[]), BASE);
    }

    #[test]
    fn inner_duplicate_slashes_collapse() {
        assert_eq!(normalize_segment("a//b///c"), "a/b/c");
    }

    #[test]
    fn base_url_path_is_kept() {
        assert_eq!(
            join_path("http://localhost:8080/api/v1/", "Spells", &[]),
            "http://localhost:8080/api/v1/Spells"
        );
    }

    // ── build_url ──

    #[test]
    fn query_params_are_encoded_in_order() {
        let query = QueryParams::new()
            .with("FirstName", "Harry Potter")
            .with("Limit", 5)
            .with("Exact", true)
            .with_opt("LastName", None::<&str>)
            .with("Name", "a&b=c");
        let url = build_url(BASE, "Wizards", &[], Some(&query)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://wizard-world-api.herokuapp.com/Wizards?FirstName=Harry+Potter&Limit=5&Exact=true&Name=a%26b%3Dc"
        );
    }

    #[test]
    fn empty_query_adds_no_question_mark() {
        let url = build_url(BASE, "Wizards", &[], Some(&QueryParams::new())).unwrap();
        assert_eq!(url.as_str(), "https://wizard-world-api.herokuapp.com/Wizards");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn build_url_keeps_base_path() {
        let url = build_url("http://localhost:8080/api/v1/", "/Spells/", &["7"], None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/Spells/7");
    }

    #[test]
    fn reserved_characters_stay_in_the_path() {
        let url = build_url("http://h", "Spells", &["C#"], None).unwrap();
        assert_eq!(url.path(), "/Spells/C%23");
        assert_eq!(url.fragment(), None);

        let query = QueryParams::new().with("x", 1);
        let url = build_url("http://h", "Spells", &["a?b"], Some(&query)).unwrap();
        assert_eq!(url.path(), "/Spells/a%3Fb");
        assert_eq!(url.query(), Some("x=1"));
        assert_eq!(url.as_str(), "http://h/Spells/a%3Fb?x=1");

        let url = build_url("http://h", "Potions", &["100%"], None).unwrap();
        assert_eq!(url.path(), "/Potions/100%25");
    }

    #[test]
    fn spaces_in_segments_are_encoded() {
        let url = build_url(BASE, "Wizards", &["Harry Potter"], None).unwrap();
        assert_eq!(url.path(), "/Wizards/Harry%20Potter");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = build_url("not a url", "Wizards", &[], None).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidUrl { .. }));
    }

    #[test]
    fn query_from_iterator() {
        let query: QueryParams = [("Type", "Charm"), ("Name", "Lumos")].into_iter().collect();
        assert_eq!(query.len(), 2);
        let url = build_url(BASE, "Spells", &[], Some(&query)).unwrap();
        assert_eq!(url.query(), Some("Type=Charm&Name=Lumos"));
    }

    #[test]
    fn query_value_display() {
        assert_eq!(QueryValue::from(1.5).to_string(), "1.5");
        assert_eq!(QueryValue::from(-3i64).to_string(), "-3");
        assert_eq!(QueryValue::from(false).to_string(), "false");
    }

    // ── properties ──

    proptest! {
        #[test]
        fn normalization_is_idempotent(segment in "[/a-zA-Z0-9]{0,20}") {
            let once = normalize_segment(&segment);
            prop_assert_eq!(normalize_segment(&once), once.clone());
            prop_assert!(!once.starts_with('/'));
            prop_assert!(!once.ends_with('/'));
            prop_assert!(!once.contains("//"));
        }

        #[test]
        fn build_url_agrees_with_join_path_for_plain_names(
            name in "[a-zA-Z0-9]{1,12}",
            segment in "/{0,2}[a-zA-Z0-9]{1,8}/{0,2}",
        ) {
            let url = build_url(BASE, &name, &[segment.as_str()], None).unwrap();
            prop_assert_eq!(url.as_str(), join_path(BASE, &name, &[segment.as_str()]));
        }

        #[test]
        fn surrounding_slashes_do_not_change_url(
            name in "[a-zA-Z0-9]{1,12}",
            lead in 0usize..3,
            trail in 0usize..3,
        ) {
            let decorated = format!("{}{name}{}", "/".repeat(lead), "/".repeat(trail));
            prop_assert_eq!(
                join_path(BASE, &decorated, &[decorated.as_str()]),
                join_path(BASE, &name, &[name.as_str()])
            );
        }
    }
}
