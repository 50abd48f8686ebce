//! # Host addressing
//!
//! Converts between human range expressions and concrete address lists.
//!
//! Accepted expression forms, freely mixed with commas:
//! * A single IPv4 address (`192.168.1.5`).
//! * A dash range with a full end (`192.168.1.10-192.168.1.40`).
//! * A dash range with a partial end (`192.168.1.10-40`, `192.168.1.10-2.40`).
//! * A CIDR block (`192.168.1.0/24`).
//!
//! [`collapse`] is the inverse of [`expand`]: it renders a list as the shortest
//! comma-joined set of full dotted-quad runs, so `collapse(expand(r)) == r`
//! whenever `r` is already in that canonical form.

mod target;

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::error::InputError;

pub use target::{TargetSet, to_range_expr};

/// Upper bound on the number of addresses a single expression may expand to (a /16)
pub const MAX_EXPANDED_ADDRESSES: usize = 65_536;

/// Expand a range expression into a sorted, deduplicated address list
pub fn expand(range_expr: &str) -> Result<Vec<Ipv4Addr>, InputError> {
    let trimmed = range_expr.trim();
    if trimmed.is_empty() {
        return Err(InputError::InvalidRangeFormat(
            "range expression is empty".to_string(),
        ));
    }

    let mut addresses: BTreeSet<u32> = BTreeSet::new();

    for item in trimmed.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(InputError::InvalidRangeFormat(format!(
                "empty item in '{range_expr}'"
            )));
        }

        let (start, end) = parse_item(item)?;
        let count = (end - start) as usize + 1;
        // Overlapping items only count once, so the total is checked after merging
        if count > MAX_EXPANDED_ADDRESSES {
            return Err(too_large(range_expr));
        }
        addresses.extend(start..=end);
        if addresses.len() > MAX_EXPANDED_ADDRESSES {
            return Err(too_large(range_expr));
        }
    }

    Ok(addresses.into_iter().map(Ipv4Addr::from).collect())
}

fn too_large(range_expr: &str) -> InputError {
    InputError::InvalidRangeFormat(format!(
        "'{range_expr}' expands to more than {MAX_EXPANDED_ADDRESSES} addresses"
    ))
}

/// Collapse an address list into its canonical range string
///
/// Input order and duplicates do not matter; every address appears in the output.
pub fn collapse(addresses: &[Ipv4Addr]) -> String {
    runs(addresses)
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                Ipv4Addr::from(start).to_string()
            } else {
                format!("{}-{}", Ipv4Addr::from(start), Ipv4Addr::from(end))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Render an address list as scanner target arguments
///
/// `nmap` only accepts a dash inside a single octet, so runs are split at
/// /24 boundaries and written as `a.b.c.x-y`.
pub fn scanner_targets(addresses: &[Ipv4Addr]) -> Vec<String> {
    let mut targets = Vec::new();

    for (start, end) in runs(addresses) {
        let mut cur = start;
        loop {
            let block_end = (cur | 0xFF).min(end);
            let first = Ipv4Addr::from(cur);
            if cur == block_end {
                targets.push(first.to_string());
            } else {
                let [a, b, c, d] = first.octets();
                targets.push(format!("{a}.{b}.{c}.{d}-{}", block_end & 0xFF));
            }

            match block_end.checked_add(1) {
                Some(next) if next <= end => cur = next,
                _ => break,
            }
        }
    }

    targets
}

/// Sorted, merged runs of consecutive addresses as inclusive `u32` bounds
fn runs(addresses: &[Ipv4Addr]) -> Vec<(u32, u32)> {
    let sorted: BTreeSet<u32> = addresses.iter().map(|a| u32::from(*a)).collect();

    let mut runs: Vec<(u32, u32)> = Vec::new();
    for addr in sorted {
        match runs.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(addr) => *end = addr,
            _ => runs.push((addr, addr)),
        }
    }
    runs
}

/// Parse one comma-free item into inclusive bounds
fn parse_item(item: &str) -> Result<(u32, u32), InputError> {
    if let Some((ip_str, prefix_str)) = item.split_once('/') {
        return parse_cidr(item, ip_str, prefix_str);
    }

    if let Some((start_str, end_str)) = item.split_once('-') {
        let start = parse_addr(start_str.trim(), item)?;
        let end = parse_range_end(end_str.trim(), &start, item)?;
        let (start, end) = (u32::from(start), u32::from(end));
        if start > end {
            return Err(InputError::InvalidRangeFormat(format!(
                "range start is after range end: {item}"
            )));
        }
        return Ok((start, end));
    }

    let addr = u32::from(parse_addr(item, item)?);
    Ok((addr, addr))
}

fn parse_addr(s: &str, original: &str) -> Result<Ipv4Addr, InputError> {
    s.parse::<Ipv4Addr>().map_err(|e| {
        InputError::InvalidRangeFormat(format!("invalid address '{s}' in '{original}': {e}"))
    })
}

fn parse_cidr(original: &str, ip_str: &str, prefix_str: &str) -> Result<(u32, u32), InputError> {
    let ip = parse_addr(ip_str.trim(), original)?;
    let prefix = prefix_str.trim().parse::<u8>().map_err(|e| {
        InputError::InvalidRangeFormat(format!("invalid prefix in CIDR '{original}': {e}"))
    })?;

    let network = Ipv4Network::new(ip, prefix)
        .map_err(|e| InputError::InvalidRangeFormat(format!("invalid CIDR '{original}': {e}")))?;

    Ok((u32::from(network.network()), u32::from(network.broadcast())))
}

/// Parse the end of a dash range, borrowing leading octets from the start
///
/// `"40"` after `192.168.1.10` means `192.168.1.40`; `"2.40"` means `192.168.2.40`.
fn parse_range_end(end_str: &str, start: &Ipv4Addr, original: &str) -> Result<Ipv4Addr, InputError> {
    let invalid = |detail: String| InputError::InvalidRangeFormat(format!("{detail}: {original}"));

    if end_str.is_empty() {
        return Err(invalid("range end is empty".to_string()));
    }

    let partial_octets = end_str
        .split('.')
        .map(|octet| octet.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| invalid(format!("invalid range end '{end_str}' ({e})")))?;

    if partial_octets.len() > 4 {
        return Err(invalid(format!("range end has too many octets '{end_str}'")));
    }

    let mut end_octets = start.octets();
    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn expand_full_dash_range() {
        let addrs = expand("192.168.1.10-192.168.1.12").unwrap();
        assert_eq!(
            addrs,
            vec![ip("192.168.1.10"), ip("192.168.1.11"), ip("192.168.1.12")]
        );
    }

    #[test]
    fn expand_partial_range_ends() {
        assert_eq!(expand("192.168.1.10-12").unwrap().len(), 3);

        let addrs = expand("192.168.1.254-2.1").unwrap();
        assert_eq!(
            addrs,
            vec![
                ip("192.168.1.254"),
                ip("192.168.1.255"),
                ip("192.168.2.0"),
                ip("192.168.2.1")
            ]
        );
    }

    #[test]
    fn expand_cidr_includes_network_and_broadcast() {
        let addrs = expand("10.0.0.0/30").unwrap();
        assert_eq!(
            addrs,
            vec![ip("10.0.0.0"), ip("10.0.0.1"), ip("10.0.0.2"), ip("10.0.0.3")]
        );

        // Host bits are masked off
        assert_eq!(expand("10.0.0.7/30").unwrap()[0], ip("10.0.0.4"));
    }

    #[test]
    fn expand_mixed_literals_sorted_and_deduplicated() {
        let addrs = expand("10.0.0.5, 10.0.0.1,10.0.0.4-5 ,10.0.0.1").unwrap();
        assert_eq!(
            addrs,
            vec![ip("10.0.0.1"), ip("10.0.0.4"), ip("10.0.0.5")]
        );
    }

    #[test]
    fn expand_rejects_malformed_input() {
        for bad in [
            "",
            "   ",
            "not-an-ip",
            "10.0.0.1/33",
            "10.0.0.256",
            "10.0.0.9-10.0.0.1",
            "10.0.0.1-",
            "10.0.0.1-1.2.3.4.5",
            "10.0.0.1,,10.0.0.2",
            "10.0.0.0/x",
        ] {
            assert!(
                matches!(expand(bad), Err(InputError::InvalidRangeFormat(_))),
                "expected InvalidRangeFormat for {bad:?}"
            );
        }
    }

    #[test]
    fn expand_rejects_oversized_ranges() {
        assert!(expand("10.0.0.0/16").is_ok());
        assert!(matches!(
            expand("10.0.0.0/15"),
            Err(InputError::InvalidRangeFormat(_))
        ));
    }

    #[test]
    fn size_limit_counts_overlapping_items_once() {
        let addrs = expand("10.0.0.0/16,10.0.0.1").unwrap();
        assert_eq!(addrs.len(), MAX_EXPANDED_ADDRESSES);
        assert!(expand("10.0.0.0/16,10.0.128.0-10.0.255.255").is_ok());

        assert!(matches!(
            expand("10.0.0.0/16,10.1.0.0"),
            Err(InputError::InvalidRangeFormat(_))
        ));
    }

    #[test]
    fn collapse_merges_contiguous_runs() {
        let addrs = vec![
            ip("192.168.1.12"),
            ip("192.168.1.10"),
            ip("192.168.1.11"),
            ip("192.168.1.20"),
            ip("192.168.1.30"),
            ip("192.168.1.31"),
        ];
        assert_eq!(
            collapse(&addrs),
            "192.168.1.10-192.168.1.12,192.168.1.20,192.168.1.30-192.168.1.31"
        );
    }

    #[test]
    fn collapse_never_drops_addresses() {
        let addrs = expand("10.0.0.1-10.0.0.3,10.0.5.7,10.0.5.9").unwrap();
        let collapsed = collapse(&addrs);
        assert_eq!(expand(&collapsed).unwrap(), addrs);
        assert_eq!(collapse(&[]), "");
    }

    #[test]
    fn collapse_expand_is_fixed_point_for_canonical_ranges() {
        for canonical in [
            "192.168.1.10-192.168.1.40",
            "10.0.0.1",
            "10.0.0.1-10.0.0.2,10.0.0.4",
            "10.0.0.255-10.0.1.3,172.16.0.9",
            "255.255.255.254-255.255.255.255",
        ] {
            assert_eq!(collapse(&expand(canonical).unwrap()), canonical);
        }
    }

    #[test]
    fn scanner_targets_split_at_octet_boundaries() {
        let addrs = expand("192.168.1.250-192.168.2.3,10.0.0.9").unwrap();
        assert_eq!(
            scanner_targets(&addrs),
            vec!["10.0.0.9", "192.168.1.250-255", "192.168.2.0-3"]
        );
    }

    #[test]
    fn scanner_targets_handle_top_of_address_space() {
        let addrs = expand("255.255.255.254-255.255.255.255").unwrap();
        assert_eq!(scanner_targets(&addrs), vec!["255.255.255.254-255"]);
    }
}
