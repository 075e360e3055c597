//! HRP amount token: the optional `<digits><suffix>` segment of the prefix.

use crate::error::{Bolt11Error, Result};

/// 1 BTC in millisatoshis.
const MSAT_PER_BTC: u128 = 10u128.pow(11);

fn multiplier_msat(suffix: Option<char>) -> Option<u128> {
    match suffix {
        None => Some(MSAT_PER_BTC),
        Some('m') => Some(10u128.pow(8)),
        Some('u') => Some(10u128.pow(5)),
        Some('n') => Some(10u128.pow(2)),
        Some('p') => None, // pico is handled separately: multiplier is 1/10 msat
        _ => None,
    }
}

fn is_valid_digits(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    digits == "0" || !digits.starts_with('0')
}

/// Parse an amount token (e.g. `"2500u"`, `""`, `"9678785340p"`) into
/// millisatoshis. An empty token means "no amount" (donation invoice).
pub fn hrp_to_msat(token: &str) -> Result<Option<u64>> {
    if token.is_empty() {
        return Ok(None);
    }
    let (digits, suffix) = match token.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&token[..token.len() - 1], Some(c)),
        _ => (token, None),
    };
    if !is_valid_digits(digits) {
        return Err(Bolt11Error::InvalidAmount(token.to_string()));
    }
    let value: u128 = digits
        .parse()
        .map_err(|_| Bolt11Error::InvalidAmount(token.to_string()))?;

    let msat = if suffix == Some('p') {
        if value % 10 != 0 {
            return Err(Bolt11Error::PicoNotMultipleOfTen(token.to_string()));
        }
        value / 10
    } else {
        let multiplier = multiplier_msat(suffix)
            .ok_or_else(|| Bolt11Error::InvalidAmount(token.to_string()))?;
        value * multiplier
    };

    u64::try_from(msat)
        .map(Some)
        .map_err(|_| Bolt11Error::InvalidAmount(token.to_string()))
}

/// Render millisatoshis as the shortest exact HRP amount token.
pub fn msat_to_hrp(msat: Option<u64>) -> String {
    let msat = match msat {
        None => return String::new(),
        Some(m) => m as u128,
    };
    const DIVISORS: [(u128, char); 3] = [
        (10u128.pow(8), 'm'),
        (10u128.pow(5), 'u'),
        (10u128.pow(2), 'n'),
    ];
    for &(divisor, suffix) in &DIVISORS {
        if msat % divisor == 0 && msat / divisor >= 1 {
            return format!("{}{}", msat / divisor, suffix);
        }
    }
    format!("{}p", msat * 10)
}

/// Convenience: `sat_to_hrp` in terms of the msat codec.
pub fn sat_to_hrp(sat: u64) -> String {
    msat_to_hrp(Some(sat * 1000))
}

/// Whole-satoshi amount, or an error if the token isn't sat-exact.
pub fn hrp_to_sat(token: &str) -> Result<Option<u64>> {
    let msat = hrp_to_msat(token)?;
    Ok(match msat {
        None => None,
        Some(m) if m % 1000 == 0 => Some(m / 1000),
        Some(_) => return Err(Bolt11Error::InvalidAmount(token.to_string())),
    })
}

/// `msat % 1000 == 0` gate used by the decoded invoice's convenience view.
pub fn msat_to_sat(msat: Option<u64>) -> Option<u64> {
    msat.and_then(|m| (m % 1000 == 0).then_some(m / 1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_has_no_amount() {
        assert_eq!(hrp_to_msat("").unwrap(), None);
        assert_eq!(msat_to_hrp(None), "");
    }

    #[test]
    fn micro_bitcoin_coffee() {
        assert_eq!(hrp_to_msat("2500u").unwrap(), Some(250_000_000));
        assert_eq!(msat_to_hrp(Some(250_000_000)), "2500u");
    }

    #[test]
    fn milli_bitcoin_round_trip() {
        assert_eq!(hrp_to_msat("20m").unwrap(), Some(2_000_000_000));
        assert_eq!(msat_to_hrp(Some(2_000_000_000)), "20m");
    }

    #[test]
    fn pico_must_be_multiple_of_ten() {
        assert_eq!(hrp_to_msat("9678785340p").unwrap(), Some(967_878_534));
        assert!(matches!(
            hrp_to_msat("1p").unwrap_err(),
            Bolt11Error::PicoNotMultipleOfTen(_)
        ));
    }

    #[test]
    fn fractional_sat_has_no_sat_form() {
        let msat = hrp_to_msat("9678785340p").unwrap();
        assert_eq!(msat_to_sat(msat), None);
    }

    #[test]
    fn whole_sat_round_trip() {
        for sat in [1u64, 100, 250_000, 1_000_000_000] {
            let token = sat_to_hrp(sat);
            assert_eq!(hrp_to_sat(&token).unwrap(), Some(sat));
        }
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(hrp_to_msat("0123u").is_err());
        assert!(hrp_to_msat("0").is_ok());
    }

    #[test]
    fn fallback_to_pico_when_no_shorter_form() {
        // 1234 msat has no exact m/u/n representation
        assert_eq!(msat_to_hrp(Some(1234)), "12340p");
        assert_eq!(hrp_to_msat("12340p").unwrap(), Some(1234));
    }
}
