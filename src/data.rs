//! Data table: refresh trigger and filters.
//!
//! Filtering re-posts the dashboard form and lifts the rows out of the
//! returned page's `#dataTableBody`, so the server keeps rendering the table.

use crate::api::{ApiClient, RefreshOutcome};
use crate::error::{ConsoleError, Result};
use crate::models::{DataRow, FilterParams};
use crate::notify::{report_failure, Notifier, Severity, Toast};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

/// Cells per data row: origin, code, name, T-1 premium, subscription status
const COLUMNS: usize = 5;

static TABLE_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#dataTableBody").expect("valid table body selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid row selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid cell selector"));

/// Extract the data rows from a rendered dashboard page.
///
/// Rows with fewer than five cells (placeholders such as "no data") are
/// skipped.
///
/// # Errors
///
/// Returns an application error if the page has no `#dataTableBody`
pub fn extract_table_rows(html: &str) -> Result<Vec<DataRow>> {
    let document = Html::parse_document(html);

    let body = document.select(&TABLE_BODY).next().ok_or_else(|| {
        ConsoleError::Application("The server page does not contain the data table".to_string())
    })?;

    let rows: Vec<DataRow> = body.select(&ROW).filter_map(parse_row).collect();
    debug!("Extracted {} rows from the data table fragment", rows.len());
    Ok(rows)
}

fn parse_row(row: ElementRef<'_>) -> Option<DataRow> {
    let cells: Vec<String> = row
        .select(&CELL)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect();

    if cells.len() < COLUMNS {
        return None;
    }

    let mut cells = cells.into_iter();
    Some(DataRow {
        origin: cells.next()?,
        code: cells.next()?,
        name: cells.next()?,
        premium_rate: cells.next()?,
        subscription_status: cells.next()?,
    })
}

/// Re-fetch the table with new filter conditions.
///
/// # Errors
///
/// Returns an error if the request fails or the page has no data table
pub async fn apply_filters(
    api: &ApiClient,
    notifier: &dyn Notifier,
    params: &FilterParams,
) -> Result<Vec<DataRow>> {
    info!(
        "Applying filters: premium_min={}, status_filter={}",
        params.premium_min, params.status_filter
    );

    let result = match api.filter_page(params).await {
        Ok(html) => extract_table_rows(&html),
        Err(e) => Err(e),
    };

    match result {
        Ok(rows) => {
            notifier.notify(Toast::new(
                "Filter applied",
                "Data is shown according to the filter conditions",
                Severity::Success,
            ));
            Ok(rows)
        }
        Err(e) => {
            report_failure(notifier, "Filter failed", &e);
            Err(e)
        }
    }
}

/// POST the refresh parameters and report the result.
///
/// # Errors
///
/// Returns an error if the refresh is cooling down, the request fails or the
/// server reports a failed scrape
pub async fn refresh(
    api: &ApiClient,
    notifier: &dyn Notifier,
    params: &FilterParams,
) -> Result<RefreshOutcome> {
    match api.refresh_data(params).await {
        Ok(outcome) => {
            notifier.notify(Toast::new(
                "Refresh succeeded",
                format!(
                    "Data updated, {} rows match the conditions",
                    outcome.rows.len()
                ),
                Severity::Success,
            ));
            Ok(outcome)
        }
        Err(e) => {
            report_failure(notifier, "Refresh failed", &e);
            Err(e)
        }
    }
}
