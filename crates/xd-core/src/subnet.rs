//! /24 grouping of attacker addresses.

use crate::histogram::Histogram;

/// `a.b.c.0/24` key for a dotted-quad literal, `None` for anything else.
///
/// Octets are plain decimal in `0..=255`; leading zeros are accepted and
/// dropped from the key, so `010.0.0.5` groups under `10.0.0.0/24`.
pub fn subnet_key(hostname: &str) -> Option<String> {
    let mut octets = [0u8; 4];
    let mut parts = hostname.trim().split('.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    let [a, b, c, _] = octets;
    Some(format!("{}.{}.{}.0/24", a, b, c))
}

/// Sums hostname counts into their /24 networks. Non-IPv4 hostnames are
/// dropped. Subnets keep the order in which they first appear in `hostnames`.
pub fn rollup(hostnames: &Histogram) -> Histogram {
    let mut subnets = Histogram::new();
    for (hostname, count) in hostnames.iter() {
        if let Some(key) = subnet_key(hostname) {
            subnets.add_n(key, count);
        }
    }
    subnets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_key_accepts_leading_zero_octets() {
        assert_eq!(subnet_key("010.0.0.5").as_deref(), Some("10.0.0.0/24"));
        assert_eq!(subnet_key("192.168.001.007").as_deref(), Some("192.168.1.0/24"));
    }

    #[test]
    fn test_subnet_key_rejects_non_literals() {
        for host in ["256.0.0.1", "10.0.0", "10.0.0.1.2", "10.0..1", "+10.0.0.1", "evil.example.com", ""] {
            assert_eq!(subnet_key(host), None, "{}", host);
        }
    }

    #[test]
    fn test_leading_zero_hosts_roll_up_with_canonical_form() {
        let mut input = Histogram::new();
        input.add_n("10.0.0.5", 2);
        input.add_n("010.0.0.9", 3);

        let subnets = rollup(&input);
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets.get("10.0.0.0/24"), 5);
    }

    fn hostnames(entries: &[(&str, u64)]) -> Histogram {
        let mut histogram = Histogram::new();
        for (host, count) in entries {
            histogram.add_n(*host, *count);
        }
        histogram
    }

    #[test]
    fn test_rollup_groups_by_first_three_octets() {
        let input = hostnames(&[
            ("10.0.0.5", 3),
            ("10.0.0.9", 2),
            ("10.0.1.2", 4),
            ("not-an-ip", 1),
        ]);
        let subnets = rollup(&input);

        assert_eq!(subnets.len(), 2);
        assert_eq!(subnets.get("10.0.0.0/24"), 5);
        assert_eq!(subnets.get("10.0.1.0/24"), 4);
        assert_eq!(subnets.ranked(), vec![("10.0.0.0/24", 5), ("10.0.1.0/24", 4)]);
    }

    #[test]
    fn test_rollup_total_matches_ipv4_keys() {
        let input = hostnames(&[
            ("198.51.100.7", 6),
            ("evil.example.com", 9),
            ("198.51.100.200", 1),
            ("203.0.113.4", 2),
            ("1.2.3", 5),
            ("1.2.3.4.5", 5),
        ]);
        let ipv4_total: u64 = input
            .iter()
            .filter(|(host, _)| subnet_key(host).is_some())
            .map(|(_, count)| count)
            .sum();

        assert_eq!(rollup(&input).total(), ipv4_total);
        assert_eq!(ipv4_total, 9);
    }

    #[test]
    fn test_ties_rank_by_first_appearance() {
        let input = hostnames(&[("172.16.5.1", 2), ("192.0.2.1", 2)]);
        assert_eq!(
            rollup(&input).ranked(),
            vec![("172.16.5.0/24", 2), ("192.0.2.0/24", 2)]
        );
    }

    #[test]
    fn test_subnet_key_rejects_non_octets() {
        assert_eq!(subnet_key("256.1.1.1"), None);
        assert_eq!(subnet_key("a.b.c.d"), None);
        assert_eq!(subnet_key("::1"), None);
        assert_eq!(subnet_key("8.8.4.4").as_deref(), Some("8.8.4.0/24"));
    }
}
