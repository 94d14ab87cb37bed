use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("workbook read error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("master table too large for a worksheet: {0} rows")]
    TooManyRows(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
