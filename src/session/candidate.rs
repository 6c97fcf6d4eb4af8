use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeCategory {
    #[default]
    General,
    Construction,
    Electrical,
    Plumbing,
    Welding,
    Manufacturing,
    Maintenance,
}

/// Details collected before the interview starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    /// Optional; a placeholder address is generated when absent
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Position applied for (required)
    #[serde(default)]
    pub position: String,

    #[serde(default)]
    pub trade_category: TradeCategory,
}

impl CandidateProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.position.trim().is_empty() {
            return Err(ValidationError::MissingField("position"));
        }

        if let Some(email) = self.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(ValidationError::Invalid {
                    field: "email",
                    reason: format!("`{}` is not an email address", email),
                });
            }
        }

        Ok(())
    }

    /// Email to persist; blank counts as absent
    pub(crate) fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_is_required() {
        let profile = CandidateProfile {
            position: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(profile.validate(), Err(ValidationError::MissingField("position")));
    }

    #[test]
    fn test_email_is_optional_but_checked() {
        let mut profile = CandidateProfile {
            position: "Electrician".to_string(),
            ..Default::default()
        };
        assert!(profile.validate().is_ok());

        profile.email = Some("".to_string());
        assert!(profile.validate().is_ok());
        assert_eq!(profile.email(), None);

        profile.email = Some("not-an-email".to_string());
        assert!(matches!(
            profile.validate(),
            Err(ValidationError::Invalid { field: "email", .. })
        ));
    }

    #[test]
    fn test_trade_category_wire_names() {
        let json = r#"{"position":"Welder","trade_category":"welding"}"#;
        let profile: CandidateProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.trade_category, TradeCategory::Welding);

        let defaulted: CandidateProfile = serde_json::from_str(r#"{"position":"Helper"}"#).unwrap();
        assert_eq!(defaulted.trade_category, TradeCategory::General);
    }
}
