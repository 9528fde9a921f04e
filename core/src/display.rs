use ethers::types::Address;
use ethers::utils::to_checksum;

/// Keep the first `n - 1` and last `n` characters, joined by `...`.
pub fn ellipsis(text: &str, n: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 2 * n {
        return text.to_string();
    }
    let head: String = chars[..n.saturating_sub(1)].iter().collect();
    let tail: String = chars[chars.len() - n..].iter().collect();
    format!("{head}...{tail}")
}

/// Short `0xAB…CD` form of an address; anything that does not look like an
/// address is returned unchanged.
pub fn truncate_address(address: Option<&str>) -> String {
    let Some(address) = address else {
        return "No Account".to_string();
    };
    let well_formed = address.len() > 6
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_alphanumeric());
    if !well_formed {
        return address.to_string();
    }
    format!("{}\u{2026}{}", &address[..4], &address[address.len() - 2..])
}

/// Label shown for the connected account.
pub fn account_label(address: Address, ens_name: Option<&str>) -> String {
    let checksummed = to_checksum(&address, None);
    match ens_name {
        Some(name) => format!("{name} ({checksummed})"),
        None => ellipsis(&checksummed, 6),
    }
}

/// Format a number with `,` thousands separators and `.` as the decimal
/// separator.
pub fn format_number(value: f64) -> String {
    let text = value.abs().to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ellipsis() {
        assert_eq!(
            ellipsis("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359", 6),
            "0xfB6...c5d359"
        );
        assert_eq!(ellipsis("", 6), "");
        assert_eq!(ellipsis("short", 6), "short");
    }

    #[test]
    fn test_truncate_address() {
        assert_eq!(truncate_address(None), "No Account");
        assert_eq!(
            truncate_address(Some("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359")),
            "0xfB\u{2026}59"
        );
        assert_eq!(truncate_address(Some("vitalik.eth")), "vitalik.eth");
    }

    #[test]
    fn test_account_label() {
        let address: Address = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
            .parse()
            .unwrap();
        assert_eq!(account_label(address, None), "0xfB6...c5d359");
        assert_eq!(
            account_label(address, Some("mixer.eth")),
            "mixer.eth (0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359)"
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.5), "999.5");
        assert_eq!(format_number(1234.567), "1,234.567");
        assert_eq!(format_number(1_000_000.0), "1,000,000");
        assert_eq!(format_number(-12345.0), "-12,345");
    }
}
