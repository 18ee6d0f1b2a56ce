use rand::Rng;

pub const ORDER_PREFIX: &str = "PED";
pub const DELIVERY_NOTE_PREFIX: &str = "REM";
pub const QUOTE_PREFIX: &str = "COT";

/// Zero-padding width for sequential codes unless configured otherwise
pub const DEFAULT_CODE_WIDTH: usize = 5;

const QUOTE_SUFFIX_LEN: usize = 4;
const QUOTE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `format_code("PED", 42) == "PED-00042"`. Numbers wider than five digits are
/// printed in full.
pub fn format_code(prefix: &str, n: u64) -> String {
    format_code_with_width(prefix, n, DEFAULT_CODE_WIDTH)
}

pub fn format_code_with_width(prefix: &str, n: u64, width: usize) -> String {
    format!("{}-{:0width$}", prefix, n, width = width)
}

/// Random `COT-XXXX` code over uppercase letters and digits.
/// Not unique by construction; callers check for collisions.
pub fn generate_quote_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..QUOTE_SUFFIX_LEN)
        .map(|_| QUOTE_ALPHABET[rng.gen_range(0..QUOTE_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", QUOTE_PREFIX, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn pads_to_five_digits() {
        assert_eq!(format_code("PED", 1), "PED-00001");
        assert_eq!(format_code("PED", 42), "PED-00042");
        assert_eq!(format_code("REM", 99_999), "REM-99999");
    }

    #[test]
    fn widens_past_five_digits_without_truncation() {
        assert_eq!(format_code("REM", 123_456), "REM-123456");
    }

    #[test]
    fn honours_custom_width() {
        assert_eq!(format_code_with_width("PED", 7, 3), "PED-007");
    }

    #[test]
    fn quote_code_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_quote_code(&mut rng);
            assert_eq!(code.len(), 8);
            assert!(code.starts_with("COT-"));
            assert!(code[4..]
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    proptest! {
        #[test]
        fn numeric_part_round_trips(n in 0u64..10_000_000_000) {
            let code = format_code("PED", n);
            let (prefix, digits) = code.split_once('-').unwrap();
            prop_assert_eq!(prefix, "PED");
            prop_assert!(digits.len() >= DEFAULT_CODE_WIDTH);
            prop_assert_eq!(digits.parse::<u64>().unwrap(), n);
        }

        #[test]
        fn codes_sort_in_sequence_order_within_width(a in 0u64..100_000, b in 0u64..100_000) {
            let (ca, cb) = (format_code("PED", a), format_code("PED", b));
            prop_assert_eq!(a.cmp(&b), ca.cmp(&cb));
        }
    }
}
