//! Company onboarding and directory queries.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::db::{Sort, SortField};
use crate::ledger;
use crate::models::{Company, CompanyBasicInfo, NewCompany, RegisterCompanyRequest, UpdateCompanyRequest};
use crate::types::{AppError, AppResult, Industry, KycStatus, RegistrationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanySortField {
    CreatedAt,
    CompanyName,
    WalletBalance,
}

impl SortField for CompanySortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "created_date" | "created_at" => Some(Self::CreatedAt),
            "company_name" => Some(Self::CompanyName),
            "wallet_balance" => Some(Self::WalletBalance),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::CompanyName => "company_name",
            Self::WalletBalance => "wallet_balance",
        }
    }
}

pub type CompanySort = Sort<CompanySortField>;

pub const DEFAULT_COMPANY_SORT: CompanySort = Sort {
    field: CompanySortField::CreatedAt,
    descending: true,
};

#[derive(Debug, Clone, Default)]
pub struct CompanyFilter {
    /// Case-insensitive substring over name, email and contact person.
    pub search: Option<String>,
    pub industry: Option<Industry>,
    pub registration_status: Option<RegistrationStatus>,
    pub kyc_status: Option<KycStatus>,
}

impl CompanyFilter {
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, company: &Company) -> bool {
        self.matches_basic(&CompanyBasicInfo::from(company))
    }

    pub fn matches_basic(&self, company: &CompanyBasicInfo) -> bool {
        if let Some(term) = self.search_term() {
            let hit = [
                &company.company_name,
                &company.business_email,
                &company.contact_person,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        self.industry.map_or(true, |i| company.industry == i)
            && self
                .registration_status
                .map_or(true, |s| company.registration_status == s)
            && self.kyc_status.map_or(true, |k| company.kyc_status == k)
    }
}

#[derive(Debug, Clone)]
pub struct CompanyQuery {
    pub filter: CompanyFilter,
    /// Restricts the listing to one company (non-admin callers).
    pub only_id: Option<Uuid>,
    pub sort: CompanySort,
    pub limit: Option<i64>,
}

impl Default for CompanyQuery {
    fn default() -> Self {
        Self {
            filter: CompanyFilter::default(),
            only_id: None,
            sort: DEFAULT_COMPANY_SORT,
            limit: None,
        }
    }
}

/// Sorts in place the way the SQL `ORDER BY` of [`CompanyQuery::sort`] would.
pub fn sort_companies(companies: &mut [Company], sort: &CompanySort) {
    companies.sort_by(|a, b| {
        let ord = match sort.field {
            CompanySortField::CreatedAt => a.created_at.cmp(&b.created_at),
            CompanySortField::CompanyName => a.company_name.cmp(&b.company_name),
            CompanySortField::WalletBalance => a.wallet_balance.cmp(&b.wallet_balance),
        };
        if sort.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Validates a registration form and turns it into a persistable company with
/// a fresh wallet address.
pub fn prepare_registration(
    request: RegisterCompanyRequest,
    initial_balance: Decimal,
) -> AppResult<NewCompany> {
    let request = RegisterCompanyRequest {
        company_name: request.company_name.trim().to_string(),
        business_email: request.business_email.trim().to_string(),
        contact_person: request.contact_person.trim().to_string(),
        phone_number: request.phone_number.trim().to_string(),
        business_address: request.business_address.trim().to_string(),
        tax_id: request
            .tax_id
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        industry: request.industry,
    };

    request.validate()?;
    let industry = request
        .industry
        .ok_or_else(|| AppError::Validation("Please select an industry".to_string()))?;

    Ok(NewCompany {
        company_name: request.company_name,
        business_email: request.business_email,
        contact_person: request.contact_person,
        phone_number: request.phone_number,
        business_address: request.business_address,
        tax_id: request.tax_id,
        industry,
        wallet_address: ledger::wallet_address(),
        initial_balance,
    })
}

/// Materialises a stored company from a registration.
pub fn company_from_registration(new: NewCompany) -> Company {
    let now = Utc::now();
    Company {
        id: Uuid::new_v4(),
        company_name: new.company_name,
        business_email: new.business_email,
        contact_person: new.contact_person,
        phone_number: new.phone_number,
        business_address: new.business_address,
        tax_id: new.tax_id,
        industry: new.industry,
        kyc_status: KycStatus::Pending,
        registration_status: RegistrationStatus::Active,
        wallet_address: Some(new.wallet_address),
        wallet_balance: new.initial_balance,
        created_at: now,
        updated_at: now,
    }
}

/// Trims a partial update and validates what is left, so blank values are
/// rejected the same way registration rejects them.
pub fn prepare_update(changes: UpdateCompanyRequest) -> AppResult<UpdateCompanyRequest> {
    let trim = |v: Option<String>| v.map(|v| v.trim().to_string());
    let changes = UpdateCompanyRequest {
        company_name: trim(changes.company_name),
        business_email: trim(changes.business_email),
        contact_person: trim(changes.contact_person),
        phone_number: trim(changes.phone_number),
        business_address: trim(changes.business_address),
        tax_id: trim(changes.tax_id),
        ..changes
    };
    changes.validate()?;
    Ok(changes)
}

/// Applies a partial update. The balance is not updatable here.
pub fn apply_update(company: &mut Company, changes: &UpdateCompanyRequest) {
    if let Some(v) = &changes.company_name {
        company.company_name = v.trim().to_string();
    }
    if let Some(v) = &changes.business_email {
        company.business_email = v.trim().to_string();
    }
    if let Some(v) = &changes.contact_person {
        company.contact_person = v.trim().to_string();
    }
    if let Some(v) = &changes.phone_number {
        company.phone_number = v.trim().to_string();
    }
    if let Some(v) = &changes.business_address {
        company.business_address = v.trim().to_string();
    }
    if let Some(v) = &changes.tax_id {
        let v = v.trim();
        company.tax_id = (!v.is_empty()).then(|| v.to_string());
    }
    if let Some(v) = changes.industry {
        company.industry = v;
    }
    if let Some(v) = changes.kyc_status {
        company.kyc_status = v;
    }
    if let Some(v) = changes.registration_status {
        company.registration_status = v;
    }
    company.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::company;

    fn registration() -> RegisterCompanyRequest {
        RegisterCompanyRequest {
            company_name: "  Acme Corp ".to_string(),
            business_email: "billing@acme.com".to_string(),
            industry: Some(Industry::Manufacturing),
            contact_person: "Sam Rivera".to_string(),
            phone_number: "+1 (555) 123-4567".to_string(),
            business_address: "12 Harbor Rd, Oakland, CA".to_string(),
            tax_id: Some("   ".to_string()),
        }
    }

    #[test]
    fn test_prepare_registration_trims_and_generates_wallet() {
        let new = prepare_registration(registration(), Decimal::from(1000)).unwrap();
        assert_eq!(new.company_name, "Acme Corp");
        assert_eq!(new.tax_id, None);
        assert_eq!(new.wallet_address.len(), 42);
        assert_eq!(new.initial_balance, Decimal::from(1000));

        let company = company_from_registration(new);
        assert_eq!(company.kyc_status, KycStatus::Pending);
        assert_eq!(company.registration_status, RegistrationStatus::Active);
    }

    #[test]
    fn test_prepare_registration_rejects_missing_fields() {
        let mut req = registration();
        req.business_email = "not-an-email".to_string();
        let err = prepare_registration(req, Decimal::ZERO).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Please enter a valid email address"
        );

        let mut req = registration();
        req.company_name = "   ".to_string();
        assert!(prepare_registration(req, Decimal::ZERO)
            .unwrap_err()
            .to_string()
            .contains("Company name is required"));

        let mut req = registration();
        req.industry = None;
        assert!(prepare_registration(req, Decimal::ZERO)
            .unwrap_err()
            .to_string()
            .contains("Please select an industry"));
    }

    #[test]
    fn test_filter_search_and_facets() {
        let mut acme = company("Acme", 10);
        acme.contact_person = "Dana Whitfield".to_string();
        acme.kyc_status = KycStatus::Approved;

        let by_contact = CompanyFilter {
            search: Some("whitf".to_string()),
            ..Default::default()
        };
        assert!(by_contact.matches(&acme));

        let by_email = CompanyFilter {
            search: Some("ACME@EXAMPLE".to_string()),
            ..Default::default()
        };
        assert!(by_email.matches(&acme));

        let wrong_kyc = CompanyFilter {
            kyc_status: Some(KycStatus::Rejected),
            ..Default::default()
        };
        assert!(!wrong_kyc.matches(&acme));

        let combined = CompanyFilter {
            search: Some("acme".to_string()),
            industry: Some(Industry::Technology),
            registration_status: Some(RegistrationStatus::Active),
            kyc_status: Some(KycStatus::Approved),
        };
        assert!(combined.matches(&acme));
    }

    #[test]
    fn test_sort_parse_and_apply() {
        let sort: CompanySort = "-wallet_balance".parse().unwrap();
        assert_eq!(sort.field, CompanySortField::WalletBalance);
        assert!(sort.descending);
        assert_eq!(sort.sql(), "wallet_balance DESC");
        assert!("-password".parse::<CompanySort>().is_err());

        let mut list = vec![company("B", 5), company("A", 50), company("C", 1)];
        sort_companies(&mut list, &sort);
        let names: Vec<_> = list.iter().map(|c| c.company_name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);

        sort_companies(&mut list, &"company_name".parse().unwrap());
        assert_eq!(list[0].company_name, "A");
    }

    #[test]
    fn test_prepare_update_rejects_blank_after_trim() {
        let err = prepare_update(UpdateCompanyRequest {
            company_name: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("Company name cannot be empty"));

        assert!(prepare_update(UpdateCompanyRequest {
            contact_person: Some(" ".to_string()),
            ..Default::default()
        })
        .is_err());

        let ok = prepare_update(UpdateCompanyRequest {
            company_name: Some("  Acme Labs ".to_string()),
            tax_id: Some("  ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ok.company_name.as_deref(), Some("Acme Labs"));
        assert_eq!(ok.tax_id.as_deref(), Some(""));
    }

    #[test]
    fn test_apply_update_clears_blank_tax_id() {
        let mut acme = company("Acme", 10);
        acme.tax_id = Some("12-345".to_string());
        apply_update(
            &mut acme,
            &UpdateCompanyRequest {
                tax_id: Some(" ".to_string()),
                kyc_status: Some(KycStatus::Approved),
                ..Default::default()
            },
        );
        assert_eq!(acme.tax_id, None);
        assert_eq!(acme.kyc_status, KycStatus::Approved);
        assert_eq!(acme.wallet_balance, Decimal::from(10));
    }
}
