use crate::driver::{DocumentNode, Driver, ElementHandle, Selector};
use crate::error::AutomationError;
use crate::strategy::SelectorStrategy;
use std::fmt;

/// Which matching tier produced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// A name cell equals the report name exactly.
    ExactCell,
    /// A cell contains the report name, ignoring case.
    CellContains,
    /// Row text read client-side contains the report name, ignoring case.
    Exhaustive,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchTier::ExactCell => "exact",
            MatchTier::CellContains => "contains",
            MatchTier::Exhaustive => "exhaustive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    /// Position among all report rows, in document order.
    pub index: usize,
    pub element: ElementHandle,
    pub tier: MatchTier,
}

/// Locates the table row for a report by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRowFinder;

impl ReportRowFinder {
    pub async fn find_row<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        document: &DocumentNode,
        rows: &SelectorStrategy,
        name_cells: &SelectorStrategy,
        report_name: &str,
    ) -> Result<ReportRow, AutomationError> {
        let (row_css, all_rows) = collect_rows(driver, document, rows).await;
        let not_found = || AutomationError::ReportNotFound {
            name: report_name.to_string(),
            rows_scanned: all_rows.len(),
            frame: None,
        };
        let Some(row_css) = row_css else {
            return Err(not_found());
        };

        let tiers = [
            (MatchTier::ExactCell, true),
            (MatchTier::CellContains, false),
        ];
        for (tier, exact) in tiers {
            for cell in name_cells.iter() {
                let text_selector = if exact {
                    Selector::exact_text(cell.base_css(), report_name)
                } else {
                    Selector::text(cell.base_css(), report_name)
                };
                let selector = Selector::has(row_css.clone(), text_selector);

                let matches = match driver.query(document, None, &selector).await {
                    Ok(matches) => matches,
                    Err(e) => {
                        tracing::debug!(%selector, "Row query failed: {}", e);
                        continue;
                    }
                };
                if let Some(row) = first_known_row(&all_rows, matches, tier) {
                    return Ok(row);
                }
            }
        }

        let needle = normalize(report_name);
        for (index, element) in all_rows.iter().enumerate() {
            match driver.inner_text(element).await {
                Ok(text) if normalize(&text).contains(&needle) => {
                    return Ok(ReportRow {
                        index,
                        element: element.clone(),
                        tier: MatchTier::Exhaustive,
                    });
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(row = index, "Skipping row, text unavailable: {}", e),
            }
        }

        Err(not_found())
    }
}

/// All rows of the first row selector that matches anything.
async fn collect_rows<D: Driver + ?Sized>(
    driver: &mut D,
    document: &DocumentNode,
    rows: &SelectorStrategy,
) -> (Option<String>, Vec<ElementHandle>) {
    for selector in rows.iter() {
        match driver.query(document, None, selector).await {
            Ok(found) if !found.is_empty() => {
                return (Some(selector.base_css().to_string()), found);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(%selector, "Row query failed: {}", e),
        }
    }
    (None, Vec::new())
}

/// First match (document order) that is one of the table's rows.
fn first_known_row(
    all_rows: &[ElementHandle],
    matches: Vec<ElementHandle>,
    tier: MatchTier,
) -> Option<ReportRow> {
    matches.into_iter().find_map(|element| {
        all_rows
            .iter()
            .position(|row| row.id == element.id)
            .map(|index| ReportRow {
                index,
                element,
                tier,
            })
    })
}

/// Lowercase with whitespace runs (including non-breaking spaces) collapsed.
fn normalize(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
