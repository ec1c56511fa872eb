// models.rs
// Domain documents for the MongoDB collections plus the enums shared across
// the route and state layers.

use chrono::NaiveDate;
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::workflow::Status;

/// Department roles used for authorization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Finance,
    PlanningOfficer,
    CustomerCare,
    DocumentOfficer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Finance => "Finance",
            UserRole::PlanningOfficer => "PlanningOfficer",
            UserRole::CustomerCare => "CustomerCare",
            UserRole::DocumentOfficer => "DocumentOfficer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Admin" => Some(UserRole::Admin),
            "Finance" => Some(UserRole::Finance),
            "PlanningOfficer" => Some(UserRole::PlanningOfficer),
            "CustomerCare" => Some(UserRole::CustomerCare),
            "DocumentOfficer" => Some(UserRole::DocumentOfficer),
            _ => None,
        }
    }

    /// Dashboard a freshly logged-in user of this role lands on.
    pub fn home_path(&self) -> &'static str {
        match self {
            UserRole::Admin => "/admin/clients",
            UserRole::Finance => "/finance/dashboard",
            UserRole::PlanningOfficer => "/planning/dashboard",
            UserRole::CustomerCare => "/customer-care/dashboard",
            UserRole::DocumentOfficer => "/document-officer/dashboard",
        }
    }
}

/// Staff account. New and password-reset accounts require admin approval
/// before a non-admin login succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppUser {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub birth_date: Option<DateTime>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    pub roles: Vec<UserRole>,
    pub is_approved: bool,
    pub created_at: DateTime,
}

impl AppUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }
}

/// Session document linking a cookie token to a user and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub user_email: String,
    pub expires_at: DateTime,
}

/// BIR retainership detail sub-document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetainershipBir {
    #[serde(default)]
    pub type_of_registrant: Option<String>,
    #[serde(default)]
    pub ocn_notes: Option<String>,
    #[serde(default)]
    pub date_ocn_generated: Option<DateTime>,
    #[serde(default)]
    pub date_bir_registration: Option<DateTime>,
    #[serde(default)]
    pub bir_rdo_no: Option<String>,
    #[serde(default)]
    pub other_bir_rdo_no: Option<String>,
    #[serde(default)]
    pub tax_filing_status: Option<String>,
    #[serde(default)]
    pub need_catch_up_accounting: Option<String>,
    /// Comma-separated selections from the intake form.
    #[serde(default)]
    pub catch_up_reasons: Option<String>,
    #[serde(default)]
    pub other_catch_up_reason: Option<String>,
    #[serde(default)]
    pub catch_up_start_date: Option<DateTime>,
    #[serde(default)]
    pub bir_compliance_activities: Option<String>,
    #[serde(default)]
    pub other_bir_compliance: Option<String>,
    #[serde(default)]
    pub bir_retainership_start_date: Option<DateTime>,
}

/// SSS/PhilHealth/Pag-IBIG retainership detail sub-document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetainershipSpp {
    #[serde(default)]
    pub sss_company_reg_no: Option<String>,
    #[serde(default)]
    pub sss_registration_date: Option<DateTime>,
    #[serde(default)]
    pub phic_company_reg_no: Option<String>,
    #[serde(default)]
    pub phic_registration_date: Option<DateTime>,
    #[serde(default)]
    pub hdmf_company_reg_no: Option<String>,
    #[serde(default)]
    pub hdmf_registration_date: Option<DateTime>,
    #[serde(default)]
    pub spp_compliance_activities: Option<String>,
    #[serde(default)]
    pub other_spp_compliance: Option<String>,
    #[serde(default)]
    pub spp_retainership_start_date: Option<DateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneTimeTransaction {
    #[serde(default)]
    pub type_of_registrant: Option<String>,
    #[serde(default)]
    pub area_of_services: Option<String>,
    #[serde(default)]
    pub other_area_of_services: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalAudit {
    #[serde(default)]
    pub external_audit_status: Option<String>,
    #[serde(default)]
    pub external_audit_purposes: Option<String>,
    #[serde(default)]
    pub external_audit_other_purpose: Option<String>,
    #[serde(default)]
    pub external_audit_report_date: Option<DateTime>,
}

/// Project categories carried on the client record. The detail sub-documents
/// above are mutually exclusive; at most the one matching `type_of_project`
/// is populated.
pub const PROJECT_RETAINERSHIP_BIR: &str = "Retainership - BIR";
pub const PROJECT_RETAINERSHIP_SPP: &str = "Retainership - SPP";
pub const PROJECT_ONE_TIME_TRANSACTION: &str = "One Time Transaction";
pub const PROJECT_EXTERNAL_AUDIT: &str = "External Audit";

/// One intake case. `status`/`sub_status` encode the pipeline position; the
/// per-department assignee ids are nullable, meaning visible to the whole
/// role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tracking_number: String,
    pub email: String,
    #[serde(default)]
    pub requesting_party: Option<String>,
    #[serde(default)]
    pub other_requesting_party: Option<String>,
    #[serde(default)]
    pub requestor_name: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
    pub client_name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    pub contact_person_number: String,
    #[serde(default)]
    pub contact_person_email: Option<String>,
    #[serde(default)]
    pub registered_company_name: Option<String>,
    pub registered_company_address: String,
    pub type_of_project: String,
    #[serde(default)]
    pub other_type_of_project: Option<String>,
    pub urgency_level: String,
    pub status: Status,
    #[serde(default)]
    pub sub_status: Option<String>,
    #[serde(default)]
    pub planning_return_note: Option<String>,
    #[serde(default)]
    pub tracking_message: Option<String>,
    #[serde(default)]
    pub assigned_finance_id: Option<ObjectId>,
    #[serde(default)]
    pub assigned_planning_officer_id: Option<ObjectId>,
    #[serde(default)]
    pub assigned_customer_care_id: Option<ObjectId>,
    #[serde(default)]
    pub assigned_document_officer_id: Option<ObjectId>,
    pub created_date: DateTime,
    #[serde(default)]
    pub claimed_date: Option<DateTime>,
    #[serde(default)]
    pub retainership_bir: Option<RetainershipBir>,
    #[serde(default)]
    pub retainership_spp: Option<RetainershipSpp>,
    #[serde(default)]
    pub one_time_transaction: Option<OneTimeTransaction>,
    #[serde(default)]
    pub external_audit: Option<ExternalAudit>,
}

/// Checklist item attached to a client. `is_required` is Planning's flag,
/// `is_present` is Customer Care's inspection flag; the two are persisted
/// independently. `is_completed` is derived from photo presence on the
/// Customer Care upload/delete path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub client_id: ObjectId,
    pub requirement_name: String,
    pub description: String,
    pub is_required: bool,
    pub is_completed: bool,
    pub is_present: bool,
    pub created_date: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementPhoto {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub requirement_id: ObjectId,
    /// Path relative to the public uploads root, e.g.
    /// `/uploads/proof-photos/proof_..._receipt.jpg`.
    pub photo_path: String,
}

/// Projected state of a monthly obligation. Overdue is never persisted; it is
/// computed on read from the due date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Overdue,
    Paid,
    Postponed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Overdue => "Overdue",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Postponed => "Postponed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(PaymentStatus::Pending),
            "Overdue" => Some(PaymentStatus::Overdue),
            "Paid" => Some(PaymentStatus::Paid),
            "Postponed" => Some(PaymentStatus::Postponed),
            _ => None,
        }
    }
}

/// Monthly obligation definition. Concrete per-month state comes from the
/// sparse `ExpensePayment` override table via `status_for_month`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringExpense {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub amount: f64,
    pub category: String,
    pub location: String,
    pub start_date: DateTime,
    /// 1..=31, clamped to the month's length when projecting.
    pub day_of_month_due: u32,
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_date: DateTime,
    pub last_modified: DateTime,
}

impl RecurringExpense {
    pub fn due_date_for_month(&self, year: i32, month: u32) -> NaiveDate {
        let day = self.day_of_month_due.min(days_in_month(year, month));
        // day is clamped into the month, so this cannot fail
        NaiveDate::from_ymd_opt(year, month, day).expect("clamped day of month")
    }

    /// Override row is authoritative; otherwise Overdue once the due date has
    /// passed, Pending before that. Nothing is ever written by this path.
    pub fn status_for_month(
        &self,
        payments: &[ExpensePayment],
        year: i32,
        month: u32,
        today: NaiveDate,
    ) -> PaymentStatus {
        if let Some(payment) = payments.iter().find(|p| p.year == year && p.month == month) {
            return payment.status;
        }
        if self.due_date_for_month(year, month) < today {
            PaymentStatus::Overdue
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn paid_date_for_month(
        &self,
        payments: &[ExpensePayment],
        year: i32,
        month: u32,
    ) -> Option<DateTime> {
        payments
            .iter()
            .find(|p| p.year == year && p.month == month)
            .and_then(|p| p.paid_date)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid month start");
    next.signed_duration_since(first).num_days() as u32
}

/// Append-only Paid/Undone log entry embedded in a one-off expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub date: DateTime,
    pub action: String,
    #[serde(default)]
    pub note: Option<String>,
}

pub const PAYMENT_ACTION_PAID: &str = "Paid";
pub const PAYMENT_ACTION_UNDONE: &str = "Undone";

/// Per-month override for a recurring expense; at most one per
/// (expense, year, month).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpensePayment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub recurring_expense_id: ObjectId,
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub paid_date: Option<DateTime>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub amount_paid: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub created_date: DateTime,
    pub last_modified: DateTime,
}

/// One-off ledger expense. Marking it paid soft-deletes it from the main
/// ledger; undoing restores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub amount: f64,
    pub due_date: DateTime,
    pub status: PaymentStatus,
    pub category: String,
    pub location: String,
    #[serde(default)]
    pub paid_date: Option<DateTime>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_date: DateTime,
    pub recurring: bool,
    #[serde(default)]
    pub repeat_months: Option<i32>,
    #[serde(default)]
    pub payment_history: Vec<PaymentEvent>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use std::time::SystemTime;

    fn expense(day: u32) -> RecurringExpense {
        let now = DateTime::from_system_time(SystemTime::now());
        RecurringExpense {
            id: Some(ObjectId::new()),
            name: "Office rent".into(),
            amount: 1500.0,
            category: "Rent".into(),
            location: "HQ".into(),
            start_date: now,
            day_of_month_due: day,
            is_active: true,
            notes: None,
            created_date: now,
            last_modified: now,
        }
    }

    fn override_row(
        expense_id: ObjectId,
        year: i32,
        month: u32,
        status: PaymentStatus,
    ) -> ExpensePayment {
        let now = DateTime::from_system_time(SystemTime::now());
        ExpensePayment {
            id: Some(ObjectId::new()),
            recurring_expense_id: expense_id,
            year,
            month,
            paid_date: Some(now),
            status,
            amount_paid: None,
            notes: None,
            payment_method: None,
            created_date: now,
            last_modified: now,
        }
    }

    #[test]
    fn due_day_clamps_to_month_length() {
        let e = expense(31);
        assert_eq!(
            e.due_date_for_month(2025, 2),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert_eq!(
            e.due_date_for_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            e.due_date_for_month(2025, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
    }

    #[test]
    fn projection_without_override_follows_due_date() {
        let e = expense(10);
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(e.status_for_month(&[], 2025, 6, today), PaymentStatus::Overdue);
        assert_eq!(e.status_for_month(&[], 2025, 7, today), PaymentStatus::Pending);
        // due exactly today is not overdue yet
        let on_due = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert_eq!(e.status_for_month(&[], 2025, 6, on_due), PaymentStatus::Pending);
    }

    #[test]
    fn override_row_is_authoritative() {
        let e = expense(10);
        let eid = e.id.unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let paid = vec![override_row(eid, 2025, 6, PaymentStatus::Paid)];
        assert_eq!(e.status_for_month(&paid, 2025, 6, today), PaymentStatus::Paid);
        let postponed = vec![override_row(eid, 2025, 6, PaymentStatus::Postponed)];
        assert_eq!(
            e.status_for_month(&postponed, 2025, 6, today),
            PaymentStatus::Postponed
        );
        // removing the override reverts to the computed rule
        assert_eq!(e.status_for_month(&[], 2025, 6, today), PaymentStatus::Overdue);
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 4), 30);
    }
}
