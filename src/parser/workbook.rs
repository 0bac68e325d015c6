//! Workbook Parser
//!
//! calamineを使用してアップロードされたバイト列をデコードし、
//! `Sheet`のリストへ変換します。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use log::debug;
use std::io::Cursor;
use zip::ZipArchive;

use crate::error::ReportError;
use crate::security::{looks_like_zip, SecurityConfig};
use crate::types::{CellCoord, CellValue, Sheet, Workbook};

/// セキュリティ違反のメッセージにファイル名を付加
fn with_filename(error: ReportError, filename: &str) -> ReportError {
    match error {
        ReportError::SecurityViolation(msg) => {
            ReportError::SecurityViolation(format!("'{}': {}", filename, msg))
        }
        other => other,
    }
}

/// ワークブックパーサー
///
/// calamineのラッパーとして、ワークブックレベルの操作を提供します。
/// 形式（XLSX / XLSB / XLS / ODS）はバイト列から自動判定されます。
pub(crate) struct WorkbookParser {
    workbook: Sheets<Cursor<Vec<u8>>>,
    /// エラーメッセージ用のファイル名
    filename: String,
}

impl WorkbookParser {
    /// バイト列からワークブックを開く
    ///
    /// # 引数
    ///
    /// * `bytes` - アップロードされたファイルの内容
    /// * `filename` - エラーメッセージに含めるファイル名
    /// * `security` - 入力サイズとZIP構造の制限
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - デコードに成功した場合
    /// * `Err(ReportError::SecurityViolation)` - 制限に違反した場合
    /// * `Err(ReportError::Workbook)` - 有効なワークブックではない場合
    pub fn open(
        bytes: &[u8],
        filename: &str,
        security: &SecurityConfig,
    ) -> Result<Self, ReportError> {
        security
            .check_input_size(bytes.len())
            .map_err(|e| with_filename(e, filename))?;

        // ZIPベースの形式は展開前に構造を検証する。
        // ZIPとして開けない場合の報告はcalamineに任せる
        if looks_like_zip(bytes) {
            if let Ok(mut archive) = ZipArchive::new(Cursor::new(bytes)) {
                security
                    .check_archive(&mut archive)
                    .map_err(|e| with_filename(e, filename))?;
            }
        }

        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(
            |source| ReportError::Workbook {
                filename: filename.to_string(),
                source,
            },
        )?;

        Ok(Self {
            workbook,
            filename: filename.to_string(),
        })
    }

    /// すべてのシート名をワークブック内の順序で取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// シートをパースして`Sheet`に変換
    ///
    /// calamineは使用範囲のみを返すため、範囲の開始位置をシートの原点とします。
    pub fn parse_sheet(&mut self, sheet_name: &str) -> Result<Sheet, ReportError> {
        let range = self
            .workbook
            .worksheet_range(sheet_name)
            .map_err(|source| ReportError::Workbook {
                filename: self.filename.clone(),
                source,
            })?;

        let sheet = convert_range(sheet_name, &range);
        debug!(
            "parsed sheet '{}' of '{}': {} non-empty cell(s)",
            sheet_name,
            self.filename,
            sheet.non_empty_count()
        );
        Ok(sheet)
    }

    /// すべてのシートをパース
    pub fn parse_all(&mut self) -> Result<Workbook, ReportError> {
        let names = self.sheet_names();
        let mut sheets = Vec::with_capacity(names.len());
        for name in &names {
            sheets.push(self.parse_sheet(name)?);
        }
        Ok(Workbook::new(sheets))
    }
}

fn convert_range(sheet_name: &str, range: &Range<Data>) -> Sheet {
    let origin = range
        .start()
        .map(|(row, col)| CellCoord::new(row, col))
        .unwrap_or(CellCoord::new(0, 0));

    let rows = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Sheet::with_origin(sheet_name, origin, rows)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        Data::Empty => CellValue::Empty,
    }
}
