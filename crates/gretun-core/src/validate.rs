//! Pure input validators for the provisioning workflow.
//!
//! Every workflow stage that consumes free-form text funnels it through one
//! of these before touching the accumulator, so each rule is testable on
//! its own.

use crate::error::ValidationError;

/// Inclusive MTU bounds for both tunnel layers
pub const MTU_MIN: u16 = 1280;
pub const MTU_MAX: u16 = 1500;

/// Validate a dotted-quad IPv4 address: four octets, each in 0..=255.
pub fn validate_ipv4(input: &str) -> Result<String, ValidationError> {
    let s = input.trim();
    let octets: Vec<&str> = s.split('.').collect();
    if octets.len() != 4 {
        return Err(ValidationError::InvalidAddress(s.to_string()));
    }
    for octet in &octets {
        if octet.is_empty() || octet.len() > 3 || !octet.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidAddress(s.to_string()));
        }
        // len <= 3 guarantees the parse fits in u16
        if octet.parse::<u16>().map_err(|_| ValidationError::InvalidAddress(s.to_string()))? > 255 {
            return Err(ValidationError::InvalidAddress(s.to_string()));
        }
    }
    Ok(s.to_string())
}

/// Validate an MTU value: integer in [1280, 1500].
pub fn validate_mtu(input: &str) -> Result<u16, ValidationError> {
    let mtu: u16 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidMtu(input.trim().to_string()))?;
    if !(MTU_MIN..=MTU_MAX).contains(&mtu) {
        return Err(ValidationError::InvalidMtu(input.trim().to_string()));
    }
    Ok(mtu)
}

/// Validate a maintenance hour: integer in [0, 23].
pub fn validate_hour(input: &str) -> Result<u8, ValidationError> {
    let hour: u8 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidHour(input.trim().to_string()))?;
    if hour > 23 {
        return Err(ValidationError::InvalidHour(input.trim().to_string()));
    }
    Ok(hour)
}

/// Validate a tunnel name: non-empty after trimming.
pub fn validate_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

/// Validate a pre-shared key: non-empty after trimming.
///
/// No character restrictions: a PSK containing shell- or config-significant
/// characters passes through to the rendered artifacts verbatim.
pub fn validate_psk(input: &str) -> Result<String, ValidationError> {
    let psk = input.trim();
    if psk.is_empty() {
        return Err(ValidationError::EmptyPsk);
    }
    Ok(psk.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_accepts_valid() {
        assert_eq!(validate_ipv4("192.168.1.1").unwrap(), "192.168.1.1");
        assert_eq!(validate_ipv4("0.0.0.0").unwrap(), "0.0.0.0");
        assert_eq!(validate_ipv4("255.255.255.255").unwrap(), "255.255.255.255");
        assert_eq!(validate_ipv4(" 10.0.0.1 ").unwrap(), "10.0.0.1");
    }

    #[test]
    fn test_ipv4_rejects_out_of_range_octet() {
        assert!(validate_ipv4("256.1.1.1").is_err());
        assert!(validate_ipv4("1.1.1.256").is_err());
    }

    #[test]
    fn test_ipv4_rejects_malformed() {
        assert!(validate_ipv4("").is_err());
        assert!(validate_ipv4("1.2.3").is_err());
        assert!(validate_ipv4("1.2.3.4.5").is_err());
        assert!(validate_ipv4("a.b.c.d").is_err());
        assert!(validate_ipv4("1..2.3").is_err());
        assert!(validate_ipv4("1.2.3.-4").is_err());
        assert!(validate_ipv4("1.2.3.0004").is_err());
    }

    #[test]
    fn test_mtu_bounds_inclusive() {
        assert_eq!(validate_mtu("1280").unwrap(), 1280);
        assert_eq!(validate_mtu("1500").unwrap(), 1500);
        assert_eq!(validate_mtu("1480").unwrap(), 1480);
        assert!(validate_mtu("1279").is_err());
        assert!(validate_mtu("1501").is_err());
        assert!(validate_mtu("abc").is_err());
        assert!(validate_mtu("9999").is_err());
    }

    #[test]
    fn test_hour_bounds_inclusive() {
        assert_eq!(validate_hour("0").unwrap(), 0);
        assert_eq!(validate_hour("23").unwrap(), 23);
        assert_eq!(validate_hour("3").unwrap(), 3);
        assert!(validate_hour("24").is_err());
        assert!(validate_hour("-1").is_err());
        assert!(validate_hour("x").is_err());
    }

    #[test]
    fn test_name_and_psk_nonempty() {
        assert_eq!(validate_name("t1").unwrap(), "t1");
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_psk("secret123").unwrap(), "secret123");
        assert!(validate_psk("").is_err());
    }

    #[test]
    fn test_psk_passes_shell_metacharacters_through() {
        // Deliberately not escaped; renderers substitute it verbatim.
        assert_eq!(validate_psk("a'b\"c$d").unwrap(), "a'b\"c$d");
    }
}
