// export.rs
// Spreadsheet dump of a filtered client list, mirroring the analytics table.

use anyhow::Result;
use chrono::Utc;
use rust_xlsxwriter::Workbook;

use crate::models::Client;

const HEADERS: &[&str] = &[
    "Client",
    "Tracking Number",
    "Type",
    "Urgency",
    "Days Pending",
    "Status",
    "Requesting Party",
    "Client Type",
    "Created",
];

pub fn clients_workbook(clients: &[Client]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Clients")?;

    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    let now = Utc::now();
    for (i, client) in clients.iter().enumerate() {
        let row = (i + 1) as u32;
        let created = client.created_date.to_chrono();
        let days_pending = (now - created).num_days();
        sheet.write_string(row, 0, &client.client_name)?;
        sheet.write_string(row, 1, &client.tracking_number)?;
        sheet.write_string(row, 2, &client.type_of_project)?;
        sheet.write_string(row, 3, &client.urgency_level)?;
        sheet.write_number(row, 4, days_pending as f64)?;
        sheet.write_string(row, 5, client.status.as_str())?;
        sheet.write_string(row, 6, client.requesting_party.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 7, client.client_type.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 8, &created.format("%Y-%m-%d").to_string())?;
    }

    let bytes = workbook.save_to_buffer()?;
    Ok(bytes)
}

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
