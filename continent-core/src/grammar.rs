//! Version identifier grammar: `v{uint}.{hex8}` (§6). Construction of an
//! identifier is part of the ingest contract (external to this crate, §9);
//! this module only validates conformance, which the workflow's `validate`
//! step and any reader accepting a caller-supplied version may want.
pub fn is_valid_version_grammar(version: &str) -> bool {
    let Some(rest) = version.strip_prefix('v') else { return false };
    let Some((uint_part, hex_part)) = rest.split_once('.') else { return false };
    if uint_part.is_empty() || !uint_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    hex_part.len() == 8 && hex_part.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::typical("v1724460000.0a1b2c3d")]
    #[case::zero_ts("v0.00000000")]
    #[case::uppercase_hex("v1724460000.0A1B2C3D")]
    fn accepts_well_formed_identifiers(#[case] version: &str) {
        assert!(is_valid_version_grammar(version));
    }

    #[rstest]
    #[case::missing_prefix("1724460000.0a1b2c3d")]
    #[case::short_hex("v1724460000.0a1b2c3")]
    #[case::non_hex_digit("v1724460000.0a1b2c3g")]
    #[case::empty_uint("v.0a1b2c3d")]
    #[case::empty_string("")]
    #[case::missing_dot("v17244600000a1b2c3d")]
    fn rejects_malformed_identifiers(#[case] version: &str) {
        assert!(!is_valid_version_grammar(version));
    }
}
