// 🚗 Owner Record - the vehicle-owner entity behind every certificate
//
// Identity is the per-store integer id. The same id can exist in the
// primary and secondary store for unrelated records.

use crate::error::{CertError, FieldError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage and form date format
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const VEHICLE_NO_MIN: usize = 4;
const VEHICLE_NO_MAX: usize = 15;
const MOBILE_MIN_DIGITS: usize = 10;
const MOBILE_MAX_DIGITS: usize = 15;

// ============================================================================
// OWNER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// Unique within one store only
    pub id: i64,

    pub owner_name: String,
    pub father_name: String,
    pub mobile_no: String,
    pub address: String,

    pub vehicle_no: String,
    pub vehicle_model: String,
    pub chassis_no: String,
    pub engine_no: String,

    /// Registration date
    pub today_date: NaiveDate,

    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

// ============================================================================
// NEW OWNER (validated payload)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOwner {
    pub owner_name: String,
    pub father_name: String,
    pub mobile_no: String,
    pub address: String,
    pub vehicle_no: String,
    pub vehicle_model: String,
    pub chassis_no: String,
    pub engine_no: String,
    pub today_date: NaiveDate,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NewOwner {
    /// Attach the id assigned by the store
    pub fn into_owner(self, id: i64) -> Owner {
        Owner {
            id,
            owner_name: self.owner_name,
            father_name: self.father_name,
            mobile_no: self.mobile_no,
            address: self.address,
            vehicle_no: self.vehicle_no,
            vehicle_model: self.vehicle_model,
            chassis_no: self.chassis_no,
            engine_no: self.engine_no,
            today_date: self.today_date,
            metadata: self.metadata,
        }
    }

    /// Record where this payload came from (form, csv import, ...)
    pub fn set_provenance(&mut self, source: &str) {
        self.metadata
            .insert("source".to_string(), serde_json::json!(source));
        self.metadata.insert(
            "received_at".to_string(),
            serde_json::json!(chrono::Utc::now().to_rfc3339()),
        );
    }
}

// ============================================================================
// OWNER FORM (raw submission)
// ============================================================================

/// Raw registration form as submitted over HTTP or read from CSV
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerForm {
    pub owner_name: String,
    pub father_name: String,
    pub mobile_no: String,
    pub address: String,
    pub vehicle_no: String,
    pub vehicle_model: String,
    pub chassis_no: String,
    pub engine_no: String,
    pub today_date: String,
}

impl OwnerForm {
    /// Validate every field, collecting all failures
    pub fn validate(&self) -> Result<NewOwner> {
        let mut errors = Vec::new();

        let owner_name = self.owner_name.trim().to_string();
        if owner_name.is_empty() {
            errors.push(FieldError::new("owner_name", "This field is required."));
        }

        let vehicle_no = normalize_vehicle_no(&self.vehicle_no);
        if vehicle_no.is_empty() {
            errors.push(FieldError::new("vehicle_no", "This field is required."));
        } else if vehicle_no.len() < VEHICLE_NO_MIN || vehicle_no.len() > VEHICLE_NO_MAX {
            errors.push(FieldError::new(
                "vehicle_no",
                format!(
                    "Vehicle number must be {}-{} characters.",
                    VEHICLE_NO_MIN, VEHICLE_NO_MAX
                ),
            ));
        } else if !vehicle_no.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push(FieldError::new(
                "vehicle_no",
                "Vehicle number may only contain letters and digits.",
            ));
        }

        let mobile_no = self.mobile_no.trim().to_string();
        if !mobile_no.is_empty() && !is_valid_mobile(&mobile_no) {
            errors.push(FieldError::new(
                "mobile_no",
                format!(
                    "Enter a valid mobile number ({}-{} digits).",
                    MOBILE_MIN_DIGITS, MOBILE_MAX_DIGITS
                ),
            ));
        }

        let today_date = match self.today_date.trim() {
            "" => Some(Local::now().date_naive()),
            raw => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(FieldError::new(
                        "today_date",
                        "Enter a valid date (YYYY-MM-DD).",
                    ));
                    None
                }
            },
        };

        match today_date {
            Some(today_date) if errors.is_empty() => Ok(NewOwner {
                owner_name,
                father_name: self.father_name.trim().to_string(),
                mobile_no,
                address: self.address.trim().to_string(),
                vehicle_no,
                vehicle_model: self.vehicle_model.trim().to_string(),
                chassis_no: self.chassis_no.trim().to_uppercase(),
                engine_no: self.engine_no.trim().to_uppercase(),
                today_date,
                metadata: HashMap::new(),
            }),
            _ => Err(CertError::Validation(errors)),
        }
    }
}

/// "ka 01 ab 1234" → "KA01AB1234"
pub fn normalize_vehicle_no(raw: &str) -> String {
    raw.split_whitespace().collect::<String>().to_uppercase()
}

fn is_valid_mobile(mobile: &str) -> bool {
    let digits = mobile.strip_prefix('+').unwrap_or(mobile);
    (MOBILE_MIN_DIGITS..=MOBILE_MAX_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> OwnerForm {
        OwnerForm {
            owner_name: "  Ravi Kumar ".to_string(),
            father_name: "Suresh Kumar".to_string(),
            mobile_no: "+919876543210".to_string(),
            address: "12 MG Road, Bengaluru".to_string(),
            vehicle_no: "ka 01 ab 1234".to_string(),
            vehicle_model: "Activa 6G".to_string(),
            chassis_no: "me4jf50abkd123456".to_string(),
            engine_no: "jf50e1234567".to_string(),
            today_date: "2024-01-15".to_string(),
        }
    }

    #[test]
    fn test_valid_form_normalizes_fields() {
        let owner = valid_form().validate().unwrap();

        assert_eq!(owner.owner_name, "Ravi Kumar");
        assert_eq!(owner.vehicle_no, "KA01AB1234");
        assert_eq!(owner.chassis_no, "ME4JF50ABKD123456");
        assert_eq!(
            owner.today_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_missing_date_defaults_to_today() {
        let mut form = valid_form();
        form.today_date = String::new();

        let owner = form.validate().unwrap();
        assert_eq!(owner.today_date, Local::now().date_naive());
    }

    #[test]
    fn test_collects_all_field_errors() {
        let form = OwnerForm {
            vehicle_no: "KA-01".to_string(),
            mobile_no: "12345".to_string(),
            today_date: "15/01/2024".to_string(),
            ..Default::default()
        };

        match form.validate() {
            Err(CertError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["owner_name", "vehicle_no", "mobile_no", "today_date"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_vehicle_length_bounds() {
        let mut form = valid_form();
        form.vehicle_no = "AB1".to_string();
        assert!(form.validate().is_err());

        form.vehicle_no = "AB12".to_string();
        assert!(form.validate().is_ok());

        form.vehicle_no = "A".repeat(16);
        assert!(form.validate().is_err());
    }
}
