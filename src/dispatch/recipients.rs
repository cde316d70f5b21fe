use crate::dispatch::{DispatchError, DispatchResult};
use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,;]+").unwrap());

/// Ordered recipient addresses as typed by the user.
///
/// Duplicates are kept and addresses are not validated; a malformed address
/// fails at delivery time for that recipient only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientList {
    addresses: Vec<String>,
}

impl RecipientList {
    /// Split on runs of whitespace, commas and semicolons, dropping empties
    pub fn parse(text: &str) -> Self {
        SEPARATORS
            .split(text)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.addresses.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.addresses
    }

    /// Pre-flight size check; the whole request is rejected, never truncated
    pub fn enforce_limit(&self, max: usize) -> DispatchResult<()> {
        if self.len() > max {
            return Err(DispatchError::RecipientLimitExceeded {
                count: self.len(),
                max,
            });
        }
        Ok(())
    }
}

impl FromIterator<String> for RecipientList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            addresses: iter
                .into_iter()
                .map(|address| address.trim().to_string())
                .filter(|address| !address.is_empty())
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecipientList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_separators() {
        let list = RecipientList::parse("a@x.com, b@x.com;; c@x.com");
        assert_eq!(list.as_slice(), ["a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_parse_newlines_and_tabs() {
        let list = RecipientList::parse("\n  first@x.com\t\tsecond@x.com\r\n,third@x.com;\n");
        assert_eq!(list.as_slice(), ["first@x.com", "second@x.com", "third@x.com"]);
    }

    #[test]
    fn test_parse_keeps_duplicates_and_order() {
        let list = RecipientList::parse("z@x.com a@x.com z@x.com");
        assert_eq!(list.as_slice(), ["z@x.com", "a@x.com", "z@x.com"]);
    }

    #[test]
    fn test_parse_does_not_validate() {
        let list = RecipientList::parse("not-an-address, b@x.com");
        assert_eq!(list.as_slice(), ["not-an-address", "b@x.com"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(RecipientList::parse("").is_empty());
        assert!(RecipientList::parse(" ;, \n ").is_empty());
    }

    #[test]
    fn test_enforce_limit() {
        let list: RecipientList = (0..301).map(|i| format!("u{i}@x.com")).collect();
        assert!(list.enforce_limit(301).is_ok());
        assert!(matches!(
            list.enforce_limit(300),
            Err(DispatchError::RecipientLimitExceeded { count: 301, max: 300 })
        ));
    }
}
