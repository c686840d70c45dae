//! An ordered HTTP header list with case-insensitive lookup.

/// HTTP headers in arrival order.
///
/// Names keep their original spelling (so a client request is written out the
/// way the caller supplied it) but every lookup ignores ASCII case.  Repeated
/// names are kept as separate entries; [`Headers::get`] returns the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, keeping any earlier entries with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Builder-style [`Headers::append`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Value of the first header called `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first header called `name`, or `""` when absent.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let headers = Headers::new().with("Sec-WebSocket-Key", "abc");
        assert_eq!(headers.get("sec-websocket-key"), Some("abc"));
        assert_eq!(headers.get("SEC-WEBSOCKET-KEY"), Some("abc"));
        assert_eq!(headers.get("Upgrade"), None);
    }

    #[test]
    fn test_first_of_repeated_names_wins() {
        let headers: Headers = [("X-A", "1"), ("x-a", "2")].into_iter().collect();
        assert_eq!(headers.get("X-A"), Some("1"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_iteration_preserves_order_and_spelling() {
        let headers = Headers::new().with("Origin", "o").with("Host", "h");
        let names: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["Origin", "Host"]);
    }

    #[test]
    fn test_missing_header_reads_as_empty() {
        assert_eq!(Headers::new().get_or_empty("Origin"), "");
        assert!(Headers::new().is_empty());
    }
}
