//! Vendor onboarding portal records.
//!
//! Older records keep business and bank details in flat `Basic_information_*`
//! and `Payment_Setup_*` fields; newer ones nest them under
//! `business_information_details` and `bank_branch_details`. Input is folded
//! into one shape here, nested values first.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::validation::{is_valid_email, is_valid_ifsc, normalize_phone};

/// Highest cancellation charge a vendor may set, in percent.
pub const MAX_CANCELLATION_CHARGES: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessInformation {
    pub business_name: Option<String>,
    pub legal_name: Option<String>,
    pub email: Option<String>,
    /// E.164
    pub phone: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub city_id: Option<i64>,
    pub state_id: Option<i64>,
    pub country_id: Option<i64>,
}

impl BusinessInformation {
    fn merge(self, update: Self) -> Self {
        Self {
            business_name: update.business_name.or(self.business_name),
            legal_name: update.legal_name.or(self.legal_name),
            email: update.email.or(self.email),
            phone: update.phone.or(self.phone),
            description: update.description.or(self.description),
            address: update.address.or(self.address),
            zip_code: update.zip_code.or(self.zip_code),
            city_id: update.city_id.or(self.city_id),
            state_id: update.state_id.or(self.state_id),
            country_id: update.country_id.or(self.country_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceAreas {
    pub location: Option<String>,
    pub regions: Option<String>,
    pub pincode: Option<String>,
    pub working_hours: Option<String>,
}

impl ServiceAreas {
    fn merge(self, update: Self) -> Self {
        Self {
            location: update.location.or(self.location),
            regions: update.regions.or(self.regions),
            pincode: update.pincode.or(self.pincode),
            working_hours: update.working_hours.or(self.working_hours),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KycDetails {
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub govt_id_type: Option<String>,
    pub id_number: Option<String>,
    pub business_pan: Option<String>,
    pub gst_number: Option<String>,
}

impl KycDetails {
    fn merge(self, update: Self) -> Self {
        Self {
            full_name: update.full_name.or(self.full_name),
            date_of_birth: update.date_of_birth.or(self.date_of_birth),
            govt_id_type: update.govt_id_type.or(self.govt_id_type),
            id_number: update.id_number.or(self.id_number),
            business_pan: update.business_pan.or(self.business_pan),
            gst_number: update.gst_number.or(self.gst_number),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BankDetails {
    pub holder_name: Option<String>,
    pub bank_name: Option<String>,
    pub branch_name: Option<String>,
    pub account_no: Option<String>,
    pub ifsc: Option<String>,
    pub upi: Option<String>,
}

impl BankDetails {
    fn merge(self, update: Self) -> Self {
        Self {
            holder_name: update.holder_name.or(self.holder_name),
            bank_name: update.bank_name.or(self.bank_name),
            branch_name: update.branch_name.or(self.branch_name),
            account_no: update.account_no.or(self.account_no),
            ifsc: update.ifsc.or(self.ifsc),
            upi: update.upi.or(self.upi),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceCategory {
    pub category_id: i64,
    pub category_name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub pricing: Option<BigDecimal>,
    pub pricing_currency: Option<String>,
}

/// A vendor's business, KYC and payout profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnboardingPortal {
    pub vendor_onboarding_portal_id: i64,
    pub vendor_id: i64,
    pub business: BusinessInformation,
    pub service_areas: ServiceAreas,
    pub kyc: KycDetails,
    pub bank: BankDetails,
    pub service_categories: Vec<ServiceCategory>,
    /// Cancellation fee as a percentage of the booking amount.
    #[schema(value_type = Option<String>, example = "20")]
    pub cancellation_charges: Option<BigDecimal>,
    pub escrow_payment: bool,
    pub initial_payment_required: bool,
    pub if_confirm: bool,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Input ============

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BusinessInformationInput {
    pub business_name: Option<String>,
    #[serde(alias = "Basic_information_LegalName")]
    pub legal_name: Option<String>,
    pub business_email: Option<String>,
    pub business_phone: Option<String>,
    #[serde(alias = "Basic_information_Business_Description")]
    pub description: Option<String>,
    #[serde(alias = "Basic_information_BusinessAddress")]
    pub address: Option<String>,
    #[serde(alias = "Basic_information_ZipCode")]
    pub zip_code: Option<String>,
    #[serde(alias = "Basic_information_City_id")]
    pub city_id: Option<i64>,
    #[serde(alias = "Basic_information_State_id")]
    pub state_id: Option<i64>,
    #[serde(alias = "Basic_information_Country_id")]
    pub country_id: Option<i64>,
    #[serde(rename = "KYC_fullname")]
    pub kyc_fullname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BankBranchInput {
    pub bank_branch_name: Option<String>,
    pub bank_name: Option<String>,
    #[serde(alias = "holderName")]
    pub holder_name: Option<String>,
    #[serde(alias = "accountNo")]
    pub account_no: Option<String>,
    pub ifsc: Option<String>,
    pub upi: Option<String>,
}

/// Create/update payload in either the nested or the legacy flat layout.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct OnboardingPortalInput {
    #[serde(default, alias = "Vendor_id")]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub business_information_details: Option<BusinessInformationInput>,
    #[serde(default)]
    pub bank_branch_details: Option<BankBranchInput>,

    #[serde(default, rename = "Basic_information_business_name")]
    pub legacy_business_name: Option<String>,
    #[serde(default, rename = "Basic_information_LegalName")]
    pub legacy_legal_name: Option<String>,
    #[serde(default, rename = "Basic_information_Email")]
    pub legacy_email: Option<String>,
    #[serde(default, rename = "Basic_information_phone")]
    pub legacy_phone: Option<String>,
    #[serde(default, rename = "Basic_information_Business_Description")]
    pub legacy_description: Option<String>,
    #[serde(default, rename = "Basic_information_BusinessAddress")]
    pub legacy_address: Option<String>,
    #[serde(default, rename = "Basic_information_ZipCode")]
    pub legacy_zip_code: Option<String>,
    #[serde(default, rename = "Basic_information_City_id")]
    pub legacy_city_id: Option<i64>,
    #[serde(default, rename = "Basic_information_State_id")]
    pub legacy_state_id: Option<i64>,
    #[serde(default, rename = "Basic_information_Country_id")]
    pub legacy_country_id: Option<i64>,

    #[serde(default, rename = "service_areas_locaiton", alias = "service_areas_location")]
    pub service_areas_location: Option<String>,
    #[serde(default, rename = "service_areas_Regions")]
    pub service_areas_regions: Option<String>,
    #[serde(default, rename = "service_areas_pincode")]
    pub service_areas_pincode: Option<String>,
    #[serde(default, rename = "service_areas_workingHoures", alias = "service_areas_working_hours")]
    pub service_areas_working_hours: Option<String>,

    #[serde(default, rename = "KYC_fullname")]
    pub kyc_full_name: Option<String>,
    #[serde(default, rename = "KYC_DoB")]
    pub kyc_date_of_birth: Option<String>,
    #[serde(default, rename = "KYC_GovtIdtype")]
    pub kyc_govt_id_type: Option<String>,
    #[serde(default, rename = "KYC_Idno")]
    pub kyc_id_number: Option<String>,
    #[serde(default, rename = "KYC_Business_PanCard")]
    pub kyc_business_pan: Option<String>,
    #[serde(default, rename = "KYC_GSTNo")]
    pub kyc_gst_number: Option<String>,

    #[serde(default, rename = "Payment_Setup_HolderName")]
    pub legacy_holder_name: Option<String>,
    #[serde(default, rename = "Payment_Setup_BankName")]
    pub legacy_bank_name: Option<String>,
    #[serde(default, rename = "Payment_Setup_BranchName")]
    pub legacy_branch_name: Option<String>,
    #[serde(default, rename = "Payment_Setup_AccountNo")]
    pub legacy_account_no: Option<String>,
    #[serde(default, rename = "Payment_Setup_Ifsc")]
    pub legacy_ifsc: Option<String>,
    #[serde(default, rename = "Payment_Setup_UPI")]
    pub legacy_upi: Option<String>,

    #[serde(default)]
    pub service_categories: Option<Vec<ServiceCategory>>,
    #[serde(default, rename = "CancellationCharges", alias = "cancellation_charges")]
    #[schema(value_type = Option<String>)]
    pub cancellation_charges: Option<BigDecimal>,
    #[serde(default, rename = "EscrowPayment", alias = "escrow_payment")]
    pub escrow_payment: Option<bool>,
    #[serde(default)]
    pub initial_payment_required: Option<bool>,
    #[serde(default, rename = "ifConfirm", alias = "if_confirm")]
    pub if_confirm: Option<bool>,
    #[serde(default, rename = "Status", alias = "status")]
    pub status: Option<bool>,
}

/// Normalized input, every field optional so it can patch an existing record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnboardingDraft {
    pub vendor_id: Option<i64>,
    pub business: BusinessInformation,
    pub service_areas: ServiceAreas,
    pub kyc: KycDetails,
    pub bank: BankDetails,
    pub service_categories: Option<Vec<ServiceCategory>>,
    pub cancellation_charges: Option<BigDecimal>,
    pub escrow_payment: Option<bool>,
    pub initial_payment_required: Option<bool>,
    pub if_confirm: Option<bool>,
    pub status: Option<bool>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Nested value when present, legacy flat value otherwise.
fn pick(nested: Option<String>, legacy: Option<String>) -> Option<String> {
    clean(nested).or_else(|| clean(legacy))
}

impl OnboardingPortalInput {
    pub fn into_draft(self) -> OnboardingDraft {
        let nested = self.business_information_details.unwrap_or_default();
        let bank = self.bank_branch_details.unwrap_or_default();

        OnboardingDraft {
            vendor_id: self.vendor_id,
            business: BusinessInformation {
                business_name: pick(nested.business_name, self.legacy_business_name),
                legal_name: pick(nested.legal_name, self.legacy_legal_name),
                email: pick(nested.business_email, self.legacy_email),
                phone: pick(nested.business_phone, self.legacy_phone),
                description: pick(nested.description, self.legacy_description),
                address: pick(nested.address, self.legacy_address),
                zip_code: pick(nested.zip_code, self.legacy_zip_code),
                city_id: nested.city_id.or(self.legacy_city_id),
                state_id: nested.state_id.or(self.legacy_state_id),
                country_id: nested.country_id.or(self.legacy_country_id),
            },
            service_areas: ServiceAreas {
                location: clean(self.service_areas_location),
                regions: clean(self.service_areas_regions),
                pincode: clean(self.service_areas_pincode),
                working_hours: clean(self.service_areas_working_hours),
            },
            kyc: KycDetails {
                full_name: pick(nested.kyc_fullname, self.kyc_full_name),
                date_of_birth: clean(self.kyc_date_of_birth),
                govt_id_type: clean(self.kyc_govt_id_type),
                id_number: clean(self.kyc_id_number),
                business_pan: clean(self.kyc_business_pan),
                gst_number: clean(self.kyc_gst_number),
            },
            bank: BankDetails {
                holder_name: pick(bank.holder_name, self.legacy_holder_name),
                bank_name: pick(bank.bank_name, self.legacy_bank_name),
                branch_name: pick(bank.bank_branch_name, self.legacy_branch_name),
                account_no: pick(bank.account_no, self.legacy_account_no),
                ifsc: pick(bank.ifsc, self.legacy_ifsc),
                upi: pick(bank.upi, self.legacy_upi),
            },
            service_categories: self.service_categories,
            cancellation_charges: self.cancellation_charges,
            escrow_payment: self.escrow_payment,
            initial_payment_required: self.initial_payment_required,
            if_confirm: self.if_confirm,
            status: self.status,
        }
    }
}

impl OnboardingDraft {
    /// Validates and canonicalizes contact and payout fields.
    pub fn validate(mut self) -> Result<Self, AppError> {
        if let Some(email) = &self.business.email {
            if !is_valid_email(email) {
                return Err(AppError::BadRequest(format!(
                    "Invalid business email '{}'",
                    email
                )));
            }
        }

        if let Some(phone) = self.business.phone.take() {
            self.business.phone = Some(normalize_phone(&phone)?);
        }

        if let Some(ifsc) = self.bank.ifsc.take() {
            let ifsc = ifsc.to_uppercase();
            if !is_valid_ifsc(&ifsc) {
                return Err(AppError::BadRequest(format!("Invalid IFSC code '{}'", ifsc)));
            }
            self.bank.ifsc = Some(ifsc);
        }

        if let Some(charges) = &self.cancellation_charges {
            if *charges < BigDecimal::from(0)
                || *charges > BigDecimal::from(MAX_CANCELLATION_CHARGES)
            {
                return Err(AppError::BadRequest(format!(
                    "Cancellation charges must be between 0 and {} percent",
                    MAX_CANCELLATION_CHARGES
                )));
            }
        }

        if let Some(categories) = &self.service_categories {
            if categories
                .iter()
                .any(|c| c.pricing.as_ref().is_some_and(|p| *p < BigDecimal::from(0)))
            {
                return Err(AppError::BadRequest(
                    "Service category pricing cannot be negative".to_string(),
                ));
            }
        }

        Ok(self)
    }

    /// New record from a validated draft. The store assigns the id.
    pub fn into_portal(self) -> Result<OnboardingPortal, AppError> {
        let vendor_id = self
            .vendor_id
            .ok_or_else(|| AppError::BadRequest("Vendor_id is required".to_string()))?;

        Ok(OnboardingPortal {
            vendor_onboarding_portal_id: 0,
            vendor_id,
            business: self.business,
            service_areas: self.service_areas,
            kyc: self.kyc,
            bank: self.bank,
            service_categories: self.service_categories.unwrap_or_default(),
            cancellation_charges: self.cancellation_charges,
            escrow_payment: self.escrow_payment.unwrap_or(false),
            initial_payment_required: self.initial_payment_required.unwrap_or(false),
            if_confirm: self.if_confirm.unwrap_or(false),
            status: self.status.unwrap_or(true),
            created_at: Utc::now(),
            updated_at: None,
        })
    }

    /// Applies the draft on top of `existing`; absent fields are kept.
    pub fn apply_to(self, existing: OnboardingPortal) -> Result<OnboardingPortal, AppError> {
        if let Some(vendor_id) = self.vendor_id {
            if vendor_id != existing.vendor_id {
                return Err(AppError::BadRequest(
                    "Vendor_id cannot be changed on an existing portal".to_string(),
                ));
            }
        }

        Ok(OnboardingPortal {
            vendor_onboarding_portal_id: existing.vendor_onboarding_portal_id,
            vendor_id: existing.vendor_id,
            business: existing.business.merge(self.business),
            service_areas: existing.service_areas.merge(self.service_areas),
            kyc: existing.kyc.merge(self.kyc),
            bank: existing.bank.merge(self.bank),
            service_categories: self
                .service_categories
                .unwrap_or(existing.service_categories),
            cancellation_charges: self.cancellation_charges.or(existing.cancellation_charges),
            escrow_payment: self.escrow_payment.unwrap_or(existing.escrow_payment),
            initial_payment_required: self
                .initial_payment_required
                .unwrap_or(existing.initial_payment_required),
            if_confirm: self.if_confirm.unwrap_or(existing.if_confirm),
            status: self.status.unwrap_or(existing.status),
            created_at: existing.created_at,
            updated_at: Some(Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> OnboardingPortalInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_nested_fields_win_over_legacy() {
        let draft = input(json!({
            "Vendor_id": 5,
            "Basic_information_business_name": "Old Beats",
            "Basic_information_Email": "old@beats.com",
            "business_information_details": {
                "business_name": "DJ Beats LLC",
                "business_email": "",
                "Basic_information_BusinessAddress": "1 Main St"
            },
            "Payment_Setup_Ifsc": "hdfc0001234",
            "bank_branch_details": {"holderName": "Mike", "accountNo": "123456"}
        }))
        .into_draft();

        assert_eq!(draft.business.business_name.as_deref(), Some("DJ Beats LLC"));
        // Empty nested value falls back to the legacy field.
        assert_eq!(draft.business.email.as_deref(), Some("old@beats.com"));
        assert_eq!(draft.business.address.as_deref(), Some("1 Main St"));
        assert_eq!(draft.bank.holder_name.as_deref(), Some("Mike"));
        assert_eq!(draft.bank.ifsc.as_deref(), Some("hdfc0001234"));
    }

    #[test]
    fn test_validate_canonicalizes_ifsc_and_phone() {
        let draft = input(json!({
            "Vendor_id": 5,
            "Basic_information_phone": "(201) 555-0123",
            "Payment_Setup_Ifsc": "hdfc0001234"
        }))
        .into_draft()
        .validate()
        .unwrap();

        assert_eq!(draft.business.phone.as_deref(), Some("+12015550123"));
        assert_eq!(draft.bank.ifsc.as_deref(), Some("HDFC0001234"));
    }

    #[test]
    fn test_cancellation_charges_range() {
        let ok = input(json!({"Vendor_id": 1, "CancellationCharges": 30})).into_draft();
        assert!(ok.validate().is_ok());

        let too_high = input(json!({"Vendor_id": 1, "CancellationCharges": 31})).into_draft();
        assert!(too_high.validate().is_err());

        let negative = input(json!({"Vendor_id": 1, "cancellation_charges": -1})).into_draft();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_apply_to_keeps_absent_fields() {
        let portal = input(json!({
            "Vendor_id": 5,
            "Basic_information_business_name": "DJ Beats",
            "CancellationCharges": 10,
            "EscrowPayment": true
        }))
        .into_draft()
        .into_portal()
        .unwrap();

        let updated = input(json!({"Basic_information_ZipCode": "10001"}))
            .into_draft()
            .apply_to(portal)
            .unwrap();

        assert_eq!(updated.business.business_name.as_deref(), Some("DJ Beats"));
        assert_eq!(updated.business.zip_code.as_deref(), Some("10001"));
        assert_eq!(updated.cancellation_charges, Some(BigDecimal::from(10)));
        assert!(updated.escrow_payment);
        assert!(updated.updated_at.is_some());
    }

    #[test]
    fn test_vendor_id_required_on_create() {
        assert!(OnboardingDraft::default().into_portal().is_err());
    }
}
