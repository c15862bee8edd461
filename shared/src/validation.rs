//! Validation utilities for Millstock
//!
//! Includes India-specific checks for GST registration and phone numbers.

use rust_decimal::Decimal;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Decimal places kept by the stock quantity columns
pub const MAX_QUANTITY_SCALE: u32 = 3;

/// Validate that a quantity fits the stored precision
pub fn validate_quantity_scale(quantity: Decimal) -> Result<(), &'static str> {
    if quantity.normalize().scale() > MAX_QUANTITY_SCALE {
        return Err("Quantity allows at most 3 decimal places");
    }
    Ok(())
}

/// Validate that a quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    validate_quantity_scale(quantity)
}

/// Validate that a quantity is zero or more
pub fn validate_non_negative(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Validate a percentage (discount, GST) is within 0-100
pub fn validate_percent(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a carton count
pub fn validate_carton_qty(carton_qty: i32) -> Result<(), &'static str> {
    if carton_qty <= 0 {
        return Err("Carton quantity must be positive");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate supplier code format (SUP-NNNNN)
pub fn validate_supplier_code(code: &str) -> Result<(), &'static str> {
    let digits = code
        .strip_prefix("SUP-")
        .ok_or("Supplier code must start with 'SUP-'")?;
    if digits.len() != 5 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("Supplier code must end with 5 digits");
    }
    Ok(())
}

// ============================================================================
// India-Specific Validations
// ============================================================================

/// Validate Indian phone number format
/// Accepts: 9876543210, 98765-43210, +919876543210, 09876543210
pub fn validate_indian_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let local = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('0') => &digits[1..],
        12 if digits.starts_with("91") => &digits[2..],
        _ => return Err("Invalid Indian phone number format"),
    };

    // Mobile numbers start with 6-9
    match local.chars().next() {
        Some('6'..='9') => Ok(()),
        _ => Err("Invalid Indian phone number format"),
    }
}

/// Validate GSTIN shape
/// 15 characters: 2-digit state code, PAN (5 letters, 4 digits, 1 letter),
/// entity number, 'Z', checksum character
pub fn validate_gstin(gstin: &str) -> Result<(), &'static str> {
    let chars: Vec<char> = gstin.chars().collect();
    if chars.len() != 15 {
        return Err("GSTIN must be 15 characters");
    }

    let state: String = chars[0..2].iter().collect();
    match state.parse::<u8>() {
        Ok(code) if (1..=38).contains(&code) || code == 97 => {}
        _ => return Err("Invalid state code in GSTIN"),
    }

    let pan_ok = chars[2..7].iter().all(|c| c.is_ascii_uppercase())
        && chars[7..11].iter().all(|c| c.is_ascii_digit())
        && chars[11].is_ascii_uppercase();
    if !pan_ok {
        return Err("Invalid PAN in GSTIN");
    }

    if !(chars[12].is_ascii_digit() || chars[12].is_ascii_uppercase()) || chars[12] == '0' {
        return Err("Invalid entity number in GSTIN");
    }
    if chars[13] != 'Z' {
        return Err("GSTIN 14th character must be 'Z'");
    }
    if !(chars[14].is_ascii_digit() || chars[14].is_ascii_uppercase()) {
        return Err("Invalid GSTIN checksum character");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(Decimal::from(1)).is_ok());
        assert!(validate_positive_quantity(Decimal::new(5, 1)).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(Decimal::from(-3)).is_err());
        assert!(validate_positive_quantity(Decimal::new(5, 3)).is_ok());
        assert!(validate_positive_quantity(Decimal::new(5, 4)).is_err());
        assert!(validate_positive_quantity(Decimal::new(15000, 4)).is_ok());
    }

    #[test]
    fn test_percent_bounds() {
        assert!(validate_percent(Decimal::ZERO).is_ok());
        assert!(validate_percent(Decimal::from(18)).is_ok());
        assert!(validate_percent(Decimal::from(100)).is_ok());
        assert!(validate_percent(Decimal::from(101)).is_err());
        assert!(validate_percent(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_carton_qty() {
        assert!(validate_carton_qty(150).is_ok());
        assert!(validate_carton_qty(0).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("accounts@example.in").is_ok());
        assert!(validate_email("invalid").is_err());
    }

    #[test]
    fn test_supplier_code() {
        assert!(validate_supplier_code("SUP-00042").is_ok());
        assert!(validate_supplier_code("SUP-42").is_err());
        assert!(validate_supplier_code("SUPP-00042").is_err());
    }

    #[test]
    fn test_indian_phone() {
        assert!(validate_indian_phone("9876543210").is_ok());
        assert!(validate_indian_phone("98765-43210").is_ok());
        assert!(validate_indian_phone("+91 98765 43210").is_ok());
        assert!(validate_indian_phone("09876543210").is_ok());
        assert!(validate_indian_phone("1234567890").is_err());
        assert!(validate_indian_phone("12345").is_err());
    }

    #[test]
    fn test_gstin() {
        assert!(validate_gstin("27AAPFU0939F1ZV").is_ok());
        assert!(validate_gstin("29ABCDE1234F1Z5").is_ok());
        assert!(validate_gstin("27AAPFU0939F1XV").is_err());
        assert!(validate_gstin("99AAPFU0939F1ZV").is_err());
        assert!(validate_gstin("27AAPF0939F1ZV").is_err());
        assert!(validate_gstin("27aapfu0939f1zv").is_err());
    }
}
