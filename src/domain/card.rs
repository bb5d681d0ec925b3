use crate::error::CollectionError;

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// The card holder's identity digits, as the charge API expects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderId {
    /// Six-digit birth date (`YYMMDD`), personal customers.
    Birth(String),
    /// Ten-digit business registration number, corporate customers.
    Business(String),
}

impl HolderId {
    pub fn birth(value: impl Into<String>) -> Result<Self, CollectionError> {
        let value = value.into();
        if value.len() == 6 && all_digits(&value) {
            Ok(Self::Birth(value))
        } else {
            Err(CollectionError::ValidationError(
                "Birth date must be six digits (YYMMDD)".to_string(),
            ))
        }
    }

    pub fn business(value: impl Into<String>) -> Result<Self, CollectionError> {
        let value = value.into();
        if value.len() == 10 && all_digits(&value) {
            Ok(Self::Business(value))
        } else {
            Err(CollectionError::ValidationError(
                "Business registration number must be ten digits".to_string(),
            ))
        }
    }

    pub fn digits(&self) -> &str {
        match self {
            Self::Birth(digits) | Self::Business(digits) => digits,
        }
    }
}

/// Validated card entry for one charge attempt.
///
/// Construction enforces the input rules; the full card number leaves the
/// process only inside the gateway charge call. Everything persisted or
/// displayed comes from the masking accessors.
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    number: String,
    expiry_month: String,
    expiry_year: String,
    holder: HolderId,
    installments: u8,
}

// Masked by hand so a stray debug log cannot leak the card number.
impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &self.masked_number())
            .field("expiry", &self.masked_expiry())
            .field("holder", &self.masked_holder())
            .field("installments", &self.installments)
            .finish()
    }
}

impl CardDetails {
    /// Validates and normalizes card entry.
    ///
    /// The card number may contain `-` or space separators; after stripping
    /// them it must be exactly 16 digits. Expiry month is `01`..`12`, expiry
    /// year two digits. `installments` of 0 means lump sum.
    pub fn new(
        number: &str,
        expiry_month: &str,
        expiry_year: &str,
        holder: HolderId,
        installments: u8,
    ) -> Result<Self, CollectionError> {
        let number: String = number
            .chars()
            .filter(|c| *c != '-' && *c != ' ')
            .collect();
        if number.len() != 16 || !all_digits(&number) {
            return Err(CollectionError::ValidationError(
                "Card number must be 16 digits".to_string(),
            ));
        }
        if expiry_month.len() != 2 || !all_digits(expiry_month) {
            return Err(CollectionError::ValidationError(
                "Expiry month must be two digits".to_string(),
            ));
        }
        match expiry_month.parse::<u8>() {
            Ok(1..=12) => {}
            _ => {
                return Err(CollectionError::ValidationError(
                    "Expiry month must be between 01 and 12".to_string(),
                ));
            }
        }
        if expiry_year.len() != 2 || !all_digits(expiry_year) {
            return Err(CollectionError::ValidationError(
                "Expiry year must be two digits".to_string(),
            ));
        }

        Ok(Self {
            number,
            expiry_month: expiry_month.to_string(),
            expiry_year: expiry_year.to_string(),
            holder,
            installments,
        })
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn expiry_month(&self) -> &str {
        &self.expiry_month
    }

    pub fn expiry_year(&self) -> &str {
        &self.expiry_year
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn installments(&self) -> u8 {
        self.installments
    }

    pub fn last4(&self) -> &str {
        &self.number[self.number.len() - 4..]
    }

    /// `****-****-****-1234`
    pub fn masked_number(&self) -> String {
        format!("****-****-****-{}", self.last4())
    }

    /// `**/YY`: the month is hidden, the year kept for expiry triage.
    pub fn masked_expiry(&self) -> String {
        format!("**/{}", self.expiry_year)
    }

    /// First two identity digits, the rest starred.
    pub fn masked_holder(&self) -> String {
        let digits = self.holder.digits();
        format!("{}{}", &digits[..2], "*".repeat(digits.len() - 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> HolderId {
        HolderId::birth("950101").unwrap()
    }

    #[test]
    fn test_card_number_validation() {
        assert!(CardDetails::new("1234567890123456", "01", "27", holder(), 0).is_ok());
        // Separators are tolerated and stripped.
        assert!(CardDetails::new("1234-5678-9012-3456", "01", "27", holder(), 0).is_ok());
        assert!(CardDetails::new("1234 5678 9012 3456", "01", "27", holder(), 0).is_ok());
        assert!(CardDetails::new("123456789012345", "01", "27", holder(), 0).is_err());
        assert!(CardDetails::new("12345678901234567", "01", "27", holder(), 0).is_err());
        assert!(CardDetails::new("1234abcd90123456", "01", "27", holder(), 0).is_err());
    }

    #[test]
    fn test_expiry_validation() {
        assert!(CardDetails::new("1234567890123456", "12", "27", holder(), 0).is_ok());
        assert!(CardDetails::new("1234567890123456", "00", "27", holder(), 0).is_err());
        assert!(CardDetails::new("1234567890123456", "13", "27", holder(), 0).is_err());
        assert!(CardDetails::new("1234567890123456", "1", "27", holder(), 0).is_err());
        assert!(CardDetails::new("1234567890123456", "01", "2", holder(), 0).is_err());
        assert!(CardDetails::new("1234567890123456", "01", "2x", holder(), 0).is_err());
    }

    #[test]
    fn test_holder_id_validation() {
        assert!(HolderId::birth("950101").is_ok());
        assert!(HolderId::birth("95010").is_err());
        assert!(HolderId::birth("95O101").is_err());
        assert!(HolderId::business("1234567890").is_ok());
        assert!(HolderId::business("123456789").is_err());
    }

    #[test]
    fn test_masking() {
        let card = CardDetails::new("1234-5678-9012-3456", "09", "26", holder(), 3).unwrap();
        assert_eq!(card.last4(), "3456");
        assert_eq!(card.masked_number(), "****-****-****-3456");
        assert_eq!(card.masked_expiry(), "**/26");
        assert_eq!(card.masked_holder(), "95****");
        assert_eq!(card.installments(), 3);

        let corp = CardDetails::new(
            "1234567890123456",
            "09",
            "26",
            HolderId::business("1068641234").unwrap(),
            0,
        )
        .unwrap();
        assert_eq!(corp.masked_holder(), "10********");
    }

    #[test]
    fn test_debug_never_shows_the_full_number() {
        let card = CardDetails::new("1234-5678-9012-3456", "09", "26", holder(), 3).unwrap();
        let printed = format!("{card:?}");
        assert!(!printed.contains("1234567890123456"));
        assert!(printed.contains("****-****-****-3456"));
    }
}
