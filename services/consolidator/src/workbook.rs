//! Spreadsheet view of the master table: one `Master_Table` sheet plus one
//! `Data_<REGION>` sheet per region.

use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::{Error, Result};
use crate::{MasterRow, MasterTable};

pub const MASTER_SHEET: &str = "Master_Table";

/// Worksheet row limit minus the header row.
const MAX_DATA_ROWS: usize = 1_048_575;

fn write_sheet<'a>(
    sheet: &mut Worksheet,
    header: &[&str],
    rows: impl Iterator<Item = &'a MasterRow>,
    bold: &Format,
) -> Result<()> {
    for (col, name) in header.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, bold)?;
    }
    for (i, row) in rows.enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, &row.period_label)?;
        sheet.write_string(r, 1, &row.region_code)?;
        for (j, value) in row.values.iter().enumerate() {
            if let Some(v) = value {
                sheet.write_number(r, (j + 2) as u16, *v)?;
            }
        }
    }
    Ok(())
}

pub fn write_workbook(master: &MasterTable, path: &Path) -> Result<()> {
    if master.rows.len() > MAX_DATA_ROWS {
        return Err(Error::TooManyRows(master.rows.len()));
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let header = master.header();

    let sheet = workbook.add_worksheet();
    sheet.set_name(MASTER_SHEET)?;
    write_sheet(sheet, &header, master.rows.iter(), &bold)?;

    for region in master.regions() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(format!("Data_{region}"))?;
        write_sheet(sheet, &header, master.rows_for_region(region), &bold)?;
    }

    workbook.save(path)?;
    Ok(())
}

/// Name and size (rows × columns, header included) of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

/// Re-open a workbook and describe its sheets.
pub fn inspect(path: &Path) -> Result<Vec<SheetSummary>> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names().to_vec();

    let mut summaries = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        let (rows, columns) = range.get_size();
        summaries.push(SheetSummary { name, rows, columns });
    }
    Ok(summaries)
}
