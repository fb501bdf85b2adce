//! Unit tests for redemption codes.

use proptest::prelude::*;
use tinysteps::rewards::redemption_code;
use uuid::Uuid;

#[test]
fn test_known_code() {
    assert_eq!(redemption_code(Uuid::nil()), "AAAA-AAAA");
}

proptest! {
    #[test]
    fn prop_code_is_unambiguous(seed in any::<u128>()) {
        let code = redemption_code(Uuid::from_u128(seed));

        prop_assert_eq!(code.len(), 9);
        prop_assert_eq!(&code[4..5], "-");
        for c in code.chars().filter(|c| *c != '-') {
            prop_assert!(c.is_ascii_uppercase() || c.is_ascii_digit());
            prop_assert!(!"01OIL".contains(c));
        }
    }
}
