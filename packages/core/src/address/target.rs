//! Ordered, duplicate-free set of hosts targeted by one batch

use std::collections::HashSet;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::{collapse, expand};
use crate::error::InputError;

/// Hosts targeted by a batch
///
/// Entries are dotted-quads or hostnames. Order is insertion order and only
/// matters for deterministic partitioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSet {
    hosts: Vec<String>,
}

impl TargetSet {
    /// Build from explicit host names, dropping blanks and later duplicates
    pub fn from_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty())
            .filter(|h| seen.insert(h.clone()))
            .collect();
        Self { hosts }
    }

    /// Build from a range expression (see [`super::expand`])
    pub fn from_range(range_expr: &str) -> Result<Self, InputError> {
        let addrs = expand(range_expr)?;
        Ok(Self {
            hosts: addrs.iter().map(Ipv4Addr::to_string).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == host)
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}

/// Express a group of hosts as a single scanner range expression
///
/// Pure IPv4 groups collapse to canonical ranges; groups containing
/// hostnames are comma-joined verbatim.
pub fn to_range_expr(hosts: &[String]) -> String {
    let parsed: Option<Vec<Ipv4Addr>> = hosts.iter().map(|h| h.parse().ok()).collect();
    match parsed {
        Some(addrs) => collapse(&addrs),
        None => hosts.join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hosts_dedups_and_keeps_order() {
        let set = TargetSet::from_hosts(["b.example", "10.0.0.1", " b.example ", "", "a.example"]);
        assert_eq!(set.hosts(), &["b.example", "10.0.0.1", "a.example"]);
        assert_eq!(set.len(), 3);
        assert!(set.contains("a.example"));
    }

    #[test]
    fn from_range_expands_in_numeric_order() {
        let set = TargetSet::from_range("10.0.0.10,10.0.0.2-3").unwrap();
        assert_eq!(set.hosts(), &["10.0.0.2", "10.0.0.3", "10.0.0.10"]);
    }

    #[test]
    fn from_range_propagates_format_errors() {
        assert!(matches!(
            TargetSet::from_range("10.0.0/24"),
            Err(InputError::InvalidRangeFormat(_))
        ));
    }

    #[test]
    fn range_expr_for_mixed_groups() {
        let ips = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        assert_eq!(to_range_expr(&ips), "10.0.0.1-10.0.0.2");

        let mixed = vec!["10.0.0.1".to_string(), "db.internal".to_string()];
        assert_eq!(to_range_expr(&mixed), "10.0.0.1,db.internal");
    }
}
