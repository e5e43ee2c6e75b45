use rand::distributions::Alphanumeric;
use rand::Rng;

pub const ORDER_NUMBER_PREFIX: &str = "ORD-";
const ORDER_NUMBER_LEN: usize = 10;
const PICKUP_CODE_LEN: usize = 6;

/// `ORD-` followed by ten uppercase alphanumerics
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{}{}", ORDER_NUMBER_PREFIX, suffix)
}

/// Six decimal digits, zero padded
pub fn generate_pickup_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", code, width = PICKUP_CODE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with(ORDER_NUMBER_PREFIX));

        let suffix = &number[ORDER_NUMBER_PREFIX.len()..];
        assert_eq!(suffix.len(), ORDER_NUMBER_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_pickup_code_shape() {
        for _ in 0..100 {
            let code = generate_pickup_code();
            assert_eq!(code.len(), PICKUP_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
