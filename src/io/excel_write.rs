use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::Result;
use crate::layout::{SheetCell, WorkbookData};

const DATE_FORMAT: &str = "yyyy-mm-dd";

/// Writes the provided workbook data to the given path.
///
/// The header row of every sheet is bold, frozen and carries an autofilter.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let formats = CellFormats {
        header: Format::new().set_bold(),
        date: Format::new().set_num_format(DATE_FORMAT),
    };

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            write_cell(worksheet, 0, col_idx as u16, header, Some(&formats.header), &formats)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell, None, &formats)?;
            }
        }

        if !table.columns.is_empty() {
            let col_end = (table.columns.len() as u16).saturating_sub(1);
            worksheet.autofilter(0, 0, table.rows.len() as u32, col_end)?;
            worksheet.set_freeze_panes(1, 0)?;
        }
    }

    workbook_writer.save(path)?;
    Ok(())
}

struct CellFormats {
    header: Format,
    date: Format,
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &SheetCell,
    format: Option<&Format>,
    formats: &CellFormats,
) -> Result<()> {
    match (cell, format) {
        (SheetCell::Empty, _) => {}
        (SheetCell::Text(value), Some(format)) => {
            worksheet.write_string_with_format(row, col, value, format)?;
        }
        (SheetCell::Text(value), None) => {
            worksheet.write_string(row, col, value)?;
        }
        (SheetCell::Number(value), Some(format)) => {
            worksheet.write_number_with_format(row, col, *value, format)?;
        }
        (SheetCell::Number(value), None) => {
            worksheet.write_number(row, col, *value)?;
        }
        (SheetCell::Date(serial), _) => {
            worksheet.write_number_with_format(row, col, *serial, &formats.date)?;
        }
    }
    Ok(())
}
