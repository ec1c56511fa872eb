use anyhow::{Context, Result};
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use rand::Rng;
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::models::{
    Client, ExternalAudit, OneTimeTransaction, PROJECT_EXTERNAL_AUDIT,
    PROJECT_ONE_TIME_TRANSACTION, PROJECT_RETAINERSHIP_BIR, PROJECT_RETAINERSHIP_SPP,
    RetainershipBir, RetainershipSpp, UserRole,
};
use crate::paginate::{Paginated, find_page};
use crate::workflow::{self, Status, WorkflowAction};

use super::AppState;

/// Intake form payload. Detail sub-forms arrive as loose strings; dates that
/// fail to parse are stored as null, matching the tolerant intake form.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BirDetailsInput {
    pub type_of_registrant: Option<String>,
    pub ocn_notes: Option<String>,
    pub date_ocn_generated: Option<String>,
    pub date_bir_registration: Option<String>,
    pub bir_rdo_no: Option<String>,
    pub other_bir_rdo_no: Option<String>,
    pub tax_filing_status: Option<String>,
    pub need_catch_up_accounting: Option<String>,
    pub catch_up_reasons: Option<String>,
    pub other_catch_up_reason: Option<String>,
    pub catch_up_start_date: Option<String>,
    pub bir_compliance_activities: Option<String>,
    pub other_bir_compliance: Option<String>,
    pub bir_retainership_start_date: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SppDetailsInput {
    pub sss_company_reg_no: Option<String>,
    pub sss_registration_date: Option<String>,
    pub phic_company_reg_no: Option<String>,
    pub phic_registration_date: Option<String>,
    pub hdmf_company_reg_no: Option<String>,
    pub hdmf_registration_date: Option<String>,
    pub spp_compliance_activities: Option<String>,
    pub other_spp_compliance: Option<String>,
    pub spp_retainership_start_date: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct OneTimeTransactionInput {
    pub type_of_registrant: Option<String>,
    pub area_of_services: Option<String>,
    pub other_area_of_services: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ExternalAuditInput {
    pub external_audit_status: Option<String>,
    pub external_audit_purposes: Option<String>,
    pub external_audit_other_purpose: Option<String>,
    pub external_audit_report_date: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ClientInput {
    #[serde(default)]
    pub email: String,
    pub requesting_party: Option<String>,
    pub other_requesting_party: Option<String>,
    pub requestor_name: Option<String>,
    pub client_type: Option<String>,
    #[serde(default)]
    pub client_name: String,
    pub tax_id: Option<String>,
    #[serde(default)]
    pub contact_person_number: String,
    pub contact_person_email: Option<String>,
    pub registered_company_name: Option<String>,
    #[serde(default)]
    pub registered_company_address: String,
    #[serde(default)]
    pub type_of_project: String,
    pub other_type_of_project: Option<String>,
    pub urgency_level: Option<String>,
    pub retainership_bir: Option<BirDetailsInput>,
    pub retainership_spp: Option<SppDetailsInput>,
    pub one_time_transaction: Option<OneTimeTransactionInput>,
    pub external_audit: Option<ExternalAuditInput>,
}

fn parse_date_opt(value: &Option<String>) -> Option<DateTime> {
    let raw = value.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    // Accept RFC3339 or a plain date from the form's date picker
    if let Ok(dt) = DateTime::parse_rfc3339_str(raw) {
        return Some(dt);
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_chrono(dt.and_utc()))
}

fn clean(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Field-level validation; an empty map means the input may be persisted.
pub fn validate_client(input: &ClientInput) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if input.email.trim().is_empty() {
        errors.insert("email".to_string(), "Email is required".to_string());
    } else if !input.email.contains('@') {
        errors.insert("email".to_string(), "Email address is invalid".to_string());
    }
    if input.client_name.trim().is_empty() {
        errors.insert("client_name".to_string(), "Client Name is required".to_string());
    }
    if input.contact_person_number.trim().is_empty() {
        errors.insert(
            "contact_person_number".to_string(),
            "Contact Number is required".to_string(),
        );
    }
    if input.registered_company_address.trim().is_empty() {
        errors.insert(
            "registered_company_address".to_string(),
            "Company Address is required".to_string(),
        );
    }
    if input.type_of_project.trim().is_empty() {
        errors.insert(
            "type_of_project".to_string(),
            "Project Type is required".to_string(),
        );
    }
    if input.type_of_project == PROJECT_RETAINERSHIP_BIR {
        let rdo = input
            .retainership_bir
            .as_ref()
            .and_then(|b| clean(&b.bir_rdo_no));
        if rdo.is_none() {
            errors.insert(
                "retainership_bir.bir_rdo_no".to_string(),
                "BIR RDO No. is required.".to_string(),
            );
        }
    }
    errors
}

/// Populates exactly the detail sub-document matching the selected project
/// type; the other three stay null.
pub fn build_project_details(
    input: &ClientInput,
) -> (
    Option<RetainershipBir>,
    Option<RetainershipSpp>,
    Option<OneTimeTransaction>,
    Option<ExternalAudit>,
) {
    match input.type_of_project.as_str() {
        PROJECT_RETAINERSHIP_BIR => {
            let b = input.retainership_bir.clone().unwrap_or_default();
            let bir = RetainershipBir {
                type_of_registrant: clean(&b.type_of_registrant),
                ocn_notes: clean(&b.ocn_notes),
                date_ocn_generated: parse_date_opt(&b.date_ocn_generated),
                date_bir_registration: parse_date_opt(&b.date_bir_registration),
                bir_rdo_no: clean(&b.bir_rdo_no),
                other_bir_rdo_no: clean(&b.other_bir_rdo_no),
                tax_filing_status: clean(&b.tax_filing_status),
                need_catch_up_accounting: clean(&b.need_catch_up_accounting),
                catch_up_reasons: clean(&b.catch_up_reasons),
                other_catch_up_reason: clean(&b.other_catch_up_reason),
                catch_up_start_date: parse_date_opt(&b.catch_up_start_date),
                bir_compliance_activities: clean(&b.bir_compliance_activities),
                other_bir_compliance: clean(&b.other_bir_compliance),
                bir_retainership_start_date: parse_date_opt(&b.bir_retainership_start_date),
            };
            (Some(bir), None, None, None)
        }
        PROJECT_RETAINERSHIP_SPP => {
            let s = input.retainership_spp.clone().unwrap_or_default();
            let spp = RetainershipSpp {
                sss_company_reg_no: clean(&s.sss_company_reg_no),
                sss_registration_date: parse_date_opt(&s.sss_registration_date),
                phic_company_reg_no: clean(&s.phic_company_reg_no),
                phic_registration_date: parse_date_opt(&s.phic_registration_date),
                hdmf_company_reg_no: clean(&s.hdmf_company_reg_no),
                hdmf_registration_date: parse_date_opt(&s.hdmf_registration_date),
                spp_compliance_activities: clean(&s.spp_compliance_activities),
                other_spp_compliance: clean(&s.other_spp_compliance),
                spp_retainership_start_date: parse_date_opt(&s.spp_retainership_start_date),
            };
            (None, Some(spp), None, None)
        }
        PROJECT_ONE_TIME_TRANSACTION => {
            let o = input.one_time_transaction.clone().unwrap_or_default();
            let ott = OneTimeTransaction {
                type_of_registrant: clean(&o.type_of_registrant),
                area_of_services: clean(&o.area_of_services),
                other_area_of_services: clean(&o.other_area_of_services),
            };
            (None, None, Some(ott), None)
        }
        PROJECT_EXTERNAL_AUDIT => {
            let a = input.external_audit.clone().unwrap_or_default();
            let audit = ExternalAudit {
                external_audit_status: clean(&a.external_audit_status),
                external_audit_purposes: clean(&a.external_audit_purposes),
                external_audit_other_purpose: clean(&a.external_audit_other_purpose),
                external_audit_report_date: parse_date_opt(&a.external_audit_report_date),
            };
            (None, None, None, Some(audit))
        }
        _ => (None, None, None, None),
    }
}

pub fn is_valid_tracking_number(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_digit)
}

pub fn random_tracking_number() -> String {
    let mut rng = rand::rng();
    let letters: String = (0..4)
        .map(|_| (b'A' + rng.random_range(0..26u8)) as char)
        .collect();
    let digits: u32 = rng.random_range(0..1_000_000);
    format!("{letters}-{digits:06}")
}

/// Draws candidates until a point query confirms one unused. The unique index
/// on `tracking_number` closes the remaining insert race.
pub async fn generate_unique_tracking_number(state: &AppState) -> Result<String> {
    loop {
        let candidate = random_tracking_number();
        let taken = state
            .clients
            .find_one(doc! { "tracking_number": &candidate })
            .await?
            .is_some();
        if !taken {
            return Ok(candidate);
        }
    }
}

pub async fn create_client(state: &AppState, input: &ClientInput) -> Result<ObjectId> {
    let (bir, spp, ott, audit) = build_project_details(input);
    let tracking_number = generate_unique_tracking_number(state).await?;

    let client = Client {
        id: None,
        tracking_number,
        email: input.email.trim().to_string(),
        requesting_party: clean(&input.requesting_party),
        other_requesting_party: clean(&input.other_requesting_party),
        requestor_name: clean(&input.requestor_name),
        client_type: clean(&input.client_type),
        client_name: input.client_name.trim().to_string(),
        tax_id: clean(&input.tax_id),
        contact_person_number: input.contact_person_number.trim().to_string(),
        contact_person_email: clean(&input.contact_person_email),
        registered_company_name: clean(&input.registered_company_name),
        registered_company_address: input.registered_company_address.trim().to_string(),
        type_of_project: input.type_of_project.trim().to_string(),
        other_type_of_project: clean(&input.other_type_of_project),
        urgency_level: clean(&input.urgency_level).unwrap_or_else(|| "Normal".to_string()),
        status: Status::Pending,
        sub_status: None,
        planning_return_note: None,
        tracking_message: None,
        assigned_finance_id: None,
        assigned_planning_officer_id: None,
        assigned_customer_care_id: None,
        assigned_document_officer_id: None,
        created_date: DateTime::from_system_time(SystemTime::now()),
        claimed_date: None,
        retainership_bir: bir,
        retainership_spp: spp,
        one_time_transaction: ott,
        external_audit: audit,
    };

    let res = state.clients.insert_one(client).await?;
    res.inserted_id
        .as_object_id()
        .context("client insert missing _id")
}

pub async fn get_client_by_id(state: &AppState, id: &ObjectId) -> Result<Option<Client>> {
    state
        .clients
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Rewrites the editable intake fields and detail sub-documents. Returns
/// false when the client no longer exists (or was replaced concurrently) —
/// the route reports that as not-found-or-conflict.
pub async fn update_client(state: &AppState, id: &ObjectId, input: &ClientInput) -> Result<bool> {
    let (bir, spp, ott, audit) = build_project_details(input);
    let bir = bson::to_bson(&bir)?;
    let spp = bson::to_bson(&spp)?;
    let ott = bson::to_bson(&ott)?;
    let audit = bson::to_bson(&audit)?;

    let res = state
        .clients
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "email": input.email.trim(),
                "requesting_party": clean(&input.requesting_party),
                "other_requesting_party": clean(&input.other_requesting_party),
                "requestor_name": clean(&input.requestor_name),
                "client_type": clean(&input.client_type),
                "client_name": input.client_name.trim(),
                "tax_id": clean(&input.tax_id),
                "contact_person_number": input.contact_person_number.trim(),
                "contact_person_email": clean(&input.contact_person_email),
                "registered_company_name": clean(&input.registered_company_name),
                "registered_company_address": input.registered_company_address.trim(),
                "type_of_project": input.type_of_project.trim(),
                "other_type_of_project": clean(&input.other_type_of_project),
                "urgency_level": clean(&input.urgency_level).unwrap_or_else(|| "Normal".to_string()),
                "retainership_bir": bir,
                "retainership_spp": spp,
                "one_time_transaction": ott,
                "external_audit": audit,
            } },
        )
        .await?;
    Ok(res.matched_count > 0)
}

/// Deleting an already-missing client is a silent no-op.
pub async fn delete_client(state: &AppState, id: &ObjectId) -> Result<()> {
    if let Some(_client) = get_client_by_id(state, id).await? {
        let mut req_cursor = state.requirements.find(doc! { "client_id": id }).await?;
        while let Some(req) = req_cursor.try_next().await? {
            if let Some(req_id) = req.id {
                let _ = state
                    .requirement_photos
                    .delete_many(doc! { "requirement_id": req_id })
                    .await;
            }
        }
        let _ = state.requirements.delete_many(doc! { "client_id": id }).await;
        state.clients.delete_one(doc! { "_id": id }).await?;
    }
    Ok(())
}

/// Common dashboard query parameters.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ClientQuery {
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u64>,
}

fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn search_filter(search: &str) -> Document {
    let pattern = escape_regex(search.trim());
    doc! { "$or": [
        { "client_name": { "$regex": &pattern, "$options": "i" } },
        { "type_of_project": { "$regex": &pattern, "$options": "i" } },
        { "tracking_number": { "$regex": &pattern, "$options": "i" } },
    ] }
}

fn client_sort(sort_order: Option<&str>, default_descending: bool) -> Document {
    match sort_order {
        Some("name_desc") => doc! { "client_name": -1 },
        Some("Name") => doc! { "client_name": 1 },
        Some("Date") => doc! { "created_date": 1 },
        Some("date_desc") => doc! { "created_date": -1 },
        _ if default_descending => doc! { "created_date": -1 },
        _ => doc! { "created_date": 1 },
    }
}

/// One dashboard column: clients whose status is in the role's recognized
/// set, searched/sorted/paged. `assigned_planning_officer` additionally
/// restricts to rows assigned to that officer or unassigned.
pub async fn clients_in_statuses(
    state: &AppState,
    statuses: &[Status],
    query: &ClientQuery,
    page_size: u64,
    default_descending: bool,
    assigned_planning_officer: Option<&ObjectId>,
) -> Result<Paginated<Client>> {
    let status_strings: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    let mut conditions = vec![doc! { "status": { "$in": status_strings } }];
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push(search_filter(search));
    }
    if let Some(officer_id) = assigned_planning_officer {
        conditions.push(doc! { "$or": [
            { "assigned_planning_officer_id": officer_id },
            { "assigned_planning_officer_id": null },
        ] });
    }
    let filter = doc! { "$and": conditions };
    let sort = client_sort(query.sort_order.as_deref(), default_descending);
    find_page(
        &state.clients,
        filter,
        sort,
        query.page.unwrap_or(1),
        page_size,
    )
    .await
}

/// Archive listing filters on top of the shared query shape.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ArchiveQuery {
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u64>,
    pub type_of_project: Option<String>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
}

pub async fn archived_clients(state: &AppState, query: &ArchiveQuery) -> Result<Paginated<Client>> {
    let mut conditions = vec![doc! { "status": Status::Archived.as_str() }];
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push(doc! { "client_name": {
            "$regex": escape_regex(search.trim()), "$options": "i"
        } });
    }
    if let Some(project) = query.type_of_project.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(doc! { "type_of_project": project });
    }
    if let Some(from) = parse_date_opt(&query.created_from) {
        conditions.push(doc! { "created_date": { "$gte": from } });
    }
    if let Some(to) = parse_date_opt(&query.created_to) {
        conditions.push(doc! { "created_date": { "$lte": to } });
    }
    let sort = match query.sort_order.as_deref() {
        Some("name_desc") => doc! { "client_name": -1 },
        Some("Date") => doc! { "created_date": 1 },
        Some("date_desc") => doc! { "created_date": -1 },
        Some("Type") => doc! { "type_of_project": 1 },
        Some("type_desc") => doc! { "type_of_project": -1 },
        Some("Status") => doc! { "status": 1 },
        Some("status_desc") => doc! { "status": -1 },
        _ => doc! { "created_date": 1 },
    };
    find_page(
        &state.clients,
        doc! { "$and": conditions },
        sort,
        query.page.unwrap_or(1),
        10,
    )
    .await
}

/// Non-archived clients for the admin search page.
pub async fn active_clients(state: &AppState, search: Option<&str>) -> Result<Vec<Client>> {
    let mut conditions = vec![doc! { "status": { "$ne": Status::Archived.as_str() } }];
    if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
        conditions.push(doc! { "client_name": {
            "$regex": escape_regex(search.trim()), "$options": "i"
        } });
    }
    let mut cursor = state
        .clients
        .find(doc! { "$and": conditions })
        .sort(doc! { "created_date": -1 })
        .await?;
    let mut clients = Vec::new();
    while let Some(client) = cursor.try_next().await? {
        clients.push(client);
    }
    Ok(clients)
}

pub async fn list_all_clients(state: &AppState) -> Result<Vec<Client>> {
    let mut cursor = state.clients.find(doc! {}).await?;
    let mut clients = Vec::new();
    while let Some(client) = cursor.try_next().await? {
        clients.push(client);
    }
    Ok(clients)
}

/// Tracking-number directory, sortable like the original register page.
pub async fn list_tracking_numbers(
    state: &AppState,
    sort_order: Option<&str>,
) -> Result<Vec<Client>> {
    let sort = match sort_order {
        Some("tracking_desc") => doc! { "tracking_number": -1 },
        Some("Name") => doc! { "client_name": 1 },
        Some("name_desc") => doc! { "client_name": -1 },
        Some("Date") => doc! { "created_date": 1 },
        Some("date_desc") => doc! { "created_date": -1 },
        _ => doc! { "created_date": -1 },
    };
    let mut cursor = state.clients.find(doc! {}).sort(sort).await?;
    let mut clients = Vec::new();
    while let Some(client) = cursor.try_next().await? {
        clients.push(client);
    }
    Ok(clients)
}

pub enum TransitionOutcome {
    Applied(Client),
    NotFound,
    /// Table violation or unmet requirement guard; nothing was written.
    Rejected(String),
}

/// The single choke point every status mutation goes through: resolves the
/// action against the transition table, applies the requirement guard, then
/// rewrites status, qualifier, note and assignment in one update.
pub async fn apply_transition(
    state: &AppState,
    id: &ObjectId,
    action: WorkflowAction,
    roles: &[UserRole],
    note: Option<String>,
    assignee: Option<ObjectId>,
) -> Result<TransitionOutcome> {
    let Some(client) = get_client_by_id(state, id).await? else {
        return Ok(TransitionOutcome::NotFound);
    };

    let transition = match workflow::resolve(action, client.status, roles) {
        Ok(t) => t,
        Err(err) => return Ok(TransitionOutcome::Rejected(err.to_string())),
    };

    if action.requires_complete_requirements() {
        let missing = super::requirements::count_required_without_photos(state, id).await?;
        if missing > 0 {
            return Ok(TransitionOutcome::Rejected(
                "All required requirements must have at least one file uploaded before sending \
                 to Documentation."
                    .to_string(),
            ));
        }
    }

    let mut set = doc! { "status": transition.to.as_str() };
    if let Some(sub) = transition.sub_status {
        set.insert("sub_status", sub);
    }
    if action == WorkflowAction::BackToFinance {
        set.insert("planning_return_note", note.clone());
    }
    if action == WorkflowAction::ProceedToLiaison {
        if let Some(assignee) = &assignee {
            set.insert("assigned_customer_care_id", assignee);
        }
    }

    state
        .clients
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;

    let updated = get_client_by_id(state, id)
        .await?
        .context("client vanished during transition")?;
    Ok(TransitionOutcome::Applied(updated))
}

/// Filters shared by the analytics page, the export, and the monthly report.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AnalyticsFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub project_type: Option<String>,
    pub urgency: Option<String>,
    pub requesting_party: Option<String>,
    pub client_type: Option<String>,
}

pub async fn list_clients_filtered(
    state: &AppState,
    filter: &AnalyticsFilter,
) -> Result<Vec<Client>> {
    let mut conditions: Vec<Document> = Vec::new();
    if let Some(from) = parse_date_opt(&filter.start_date) {
        conditions.push(doc! { "created_date": { "$gte": from } });
    }
    if let Some(to) = parse_date_opt(&filter.end_date) {
        conditions.push(doc! { "created_date": { "$lte": to } });
    }
    if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(doc! { "status": status });
    }
    if let Some(project) = filter.project_type.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(doc! { "type_of_project": project });
    }
    if let Some(urgency) = filter.urgency.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(doc! { "urgency_level": urgency });
    }
    if let Some(party) = filter.requesting_party.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(doc! { "requesting_party": {
            "$regex": escape_regex(party), "$options": "i"
        } });
    }
    if let Some(client_type) = filter.client_type.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(doc! { "client_type": {
            "$regex": escape_regex(client_type), "$options": "i"
        } });
    }
    let filter_doc = if conditions.is_empty() {
        doc! {}
    } else {
        doc! { "$and": conditions }
    };
    let mut cursor = state.clients.find(filter_doc).await?;
    let mut clients = Vec::new();
    while let Some(client) = cursor.try_next().await? {
        clients.push(client);
    }
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_numbers_match_the_format() {
        for _ in 0..64 {
            let t = random_tracking_number();
            assert!(is_valid_tracking_number(&t), "bad tracking number {t}");
        }
    }

    #[test]
    fn tracking_number_validation_rejects_close_misses() {
        assert!(is_valid_tracking_number("AWYZ-078923"));
        assert!(!is_valid_tracking_number("awyz-078923"));
        assert!(!is_valid_tracking_number("AWYZ078923"));
        assert!(!is_valid_tracking_number("AWY-0789233"));
        assert!(!is_valid_tracking_number("AWYZ-07892"));
        assert!(!is_valid_tracking_number("AWYZ-0789234"));
        assert!(!is_valid_tracking_number(""));
    }

    fn bir_input(rdo: Option<&str>) -> ClientInput {
        ClientInput {
            email: "client@example.com".into(),
            client_name: "Acme Foods".into(),
            contact_person_number: "0917 000 0000".into(),
            registered_company_address: "123 Main St".into(),
            type_of_project: PROJECT_RETAINERSHIP_BIR.into(),
            retainership_bir: Some(BirDetailsInput {
                bir_rdo_no: rdo.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn bir_projects_require_an_rdo_number() {
        let errors = validate_client(&bir_input(None));
        assert!(errors.contains_key("retainership_bir.bir_rdo_no"));

        let errors = validate_client(&bir_input(Some("  ")));
        assert!(errors.contains_key("retainership_bir.bir_rdo_no"));

        let errors = validate_client(&bir_input(Some("RDO-39")));
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn missing_required_fields_surface_per_field() {
        let errors = validate_client(&ClientInput::default());
        for key in [
            "email",
            "client_name",
            "contact_person_number",
            "registered_company_address",
            "type_of_project",
        ] {
            assert!(errors.contains_key(key), "expected error for {key}");
        }
    }

    #[test]
    fn detail_sub_documents_are_mutually_exclusive() {
        let mut input = bir_input(Some("RDO-39"));
        // stale sub-forms from a previous project-type selection
        input.retainership_spp = Some(SppDetailsInput::default());
        input.external_audit = Some(ExternalAuditInput::default());

        let (bir, spp, ott, audit) = build_project_details(&input);
        assert!(bir.is_some());
        assert!(spp.is_none());
        assert!(ott.is_none());
        assert!(audit.is_none());
        assert_eq!(bir.unwrap().bir_rdo_no.as_deref(), Some("RDO-39"));
    }

    #[test]
    fn regex_escaping_neutralizes_metacharacters() {
        assert_eq!(escape_regex("a.b"), "a\\.b");
        assert_eq!(escape_regex("(x)"), "\\(x\\)");
        assert_eq!(escape_regex("plain"), "plain");
    }
}
