//! Audit Builder Module
//!
//! 必須トークン（延滞関連フィールド）ごとに、解決済みの値と出所を結合した
//! 監査行を生成し、レビュー用のMarkdown表として出力するモジュール。

use serde::Serialize;
use std::io::Write;
use unicode_width::UnicodeWidthStr;

use crate::error::ReportError;
use crate::extractor::Provenance;
use crate::formatter::display_value;
use crate::schema::{Field, FieldRecord};

/// 出所がない場合のシート名表示
pub const MISSING_SHEET: &str = "—";

/// 監査行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRow {
    /// 正規トークン（例: `DELINPER30`）
    pub token: String,
    /// 表示用に整形された値
    pub value: String,
    /// 値を取得したシート名（出所がない場合は`MISSING_SHEET`）
    pub sheet: String,
    /// セル参照（重複なし、出現順）
    pub cells: Vec<String>,
}

/// 必須トークンの順序で監査行を生成
///
/// 出所の有無にかかわらず、`required`の要素ごとにちょうど1行を返します。
///
/// # 例
///
/// ```rust
/// use storagereport::{build_audit_rows, FieldRecord, Provenance, DELINQUENCY_TOKENS, MISSING_SHEET};
///
/// let rows = build_audit_rows(&FieldRecord::default(), &Provenance::new(), &DELINQUENCY_TOKENS);
/// assert_eq!(rows.len(), 9);
/// assert_eq!(rows[0].token, "DELINPER30");
/// assert_eq!(rows[0].sheet, MISSING_SHEET);
/// ```
pub fn build_audit_rows(
    record: &FieldRecord,
    provenance: &Provenance,
    required: &[Field],
) -> Vec<AuditRow> {
    required
        .iter()
        .map(|field| {
            let origin = provenance.get(*field);

            let sheet = origin
                .map(|p| p.sheet.trim())
                .filter(|sheet| !sheet.is_empty())
                .unwrap_or(MISSING_SHEET)
                .to_string();

            let mut cells: Vec<String> = Vec::new();
            for cell in origin.into_iter().flat_map(|p| p.cells.iter()) {
                if !cells.contains(cell) {
                    cells.push(cell.clone());
                }
            }

            AuditRow {
                token: field.token().to_string(),
                value: display_value(*field, record.get(*field)),
                sheet,
                cells,
            }
        })
        .collect()
}

/// 監査行をMarkdown表として出力
///
/// 列幅は表示幅（全角文字は2）で揃えます。
pub fn write_audit_table<W: Write>(rows: &[AuditRow], writer: &mut W) -> Result<(), ReportError> {
    let table: Vec<[String; 4]> = std::iter::once([
        "Token".to_string(),
        "Value".to_string(),
        "Sheet".to_string(),
        "Cells".to_string(),
    ])
    .chain(rows.iter().map(|row| {
        [
            escape_cell(&row.token),
            escape_cell(&row.value),
            escape_cell(&row.sheet),
            escape_cell(&row.cells.join(", ")),
        ]
    }))
    .collect();

    // 最小幅は3文字（区切り行の最小幅）
    let mut widths = [3usize; 4];
    for row in &table {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
    }

    for (row_idx, row) in table.iter().enumerate() {
        write!(writer, "|")?;
        for (cell, width) in row.iter().zip(widths.iter()) {
            let padding = width.saturating_sub(cell.width());
            write!(writer, " {}{} |", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;

        if row_idx == 0 {
            write!(writer, "|")?;
            for width in &widths {
                write!(writer, "{}|", "-".repeat(width + 2))?;
            }
            writeln!(writer)?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// 監査行をMarkdown表の文字列として取得
pub fn render_audit_table(rows: &[AuditRow]) -> String {
    let mut buffer = Vec::new();
    // Vec<u8>への書き込みは失敗しない
    if write_audit_table(rows, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn escape_cell(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::TokenProvenance;
    use crate::schema::{FieldValue, DELINQUENCY_TOKENS};

    fn provenance(sheet: &str, cells: &[&str]) -> TokenProvenance {
        TokenProvenance {
            sheet: sheet.to_string(),
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_one_row_per_required_token_in_order() {
        let rows = build_audit_rows(&FieldRecord::default(), &Provenance::new(), &DELINQUENCY_TOKENS);
        let tokens: Vec<&str> = rows.iter().map(|r| r.token.as_str()).collect();
        assert_eq!(
            tokens,
            vec![
                "DELINPER30",
                "DELINUNIT30",
                "DELINDOL30",
                "DELINPER60",
                "DELINUNIT60",
                "DELINDOL60",
                "DELINPER61",
                "DELINUNIT61",
                "DELINDOL61",
            ]
        );
        for row in &rows {
            assert_eq!(row.sheet, MISSING_SHEET);
            assert!(row.cells.is_empty());
        }
    }

    #[test]
    fn test_required_order_is_not_sorted() {
        let required = [Field::DelinquentDollars61, Field::DelinquentPercent30];
        let rows = build_audit_rows(&FieldRecord::default(), &Provenance::new(), &required);
        assert_eq!(rows[0].token, "DELINDOL61");
        assert_eq!(rows[1].token, "DELINPER30");
    }

    #[test]
    fn test_row_joins_value_and_provenance() {
        let record = FieldRecord::default()
            .with(Field::DelinquentDollars30, FieldValue::Number(1250.5))
            .unwrap();
        let mut prov = Provenance::new();
        prov.insert(
            Field::DelinquentDollars30,
            provenance("Aging", &["B7", "C7", "B7", "C8"]),
        );

        let rows = build_audit_rows(&record, &prov, &[Field::DelinquentDollars30]);
        assert_eq!(
            rows[0],
            AuditRow {
                token: "DELINDOL30".to_string(),
                value: "$1,250.50".to_string(),
                sheet: "Aging".to_string(),
                cells: vec!["B7".to_string(), "C7".to_string(), "C8".to_string()],
            }
        );
    }

    #[test]
    fn test_blank_sheet_name_shows_placeholder() {
        let mut prov = Provenance::new();
        prov.insert(Field::DelinquentUnits60, provenance("  ", &["A1"]));
        let rows = build_audit_rows(&FieldRecord::default(), &prov, &[Field::DelinquentUnits60]);
        assert_eq!(rows[0].sheet, MISSING_SHEET);
        assert_eq!(rows[0].cells, vec!["A1".to_string()]);
    }

    #[test]
    fn test_render_audit_table() {
        let rows = vec![
            AuditRow {
                token: "DELINPER30".to_string(),
                value: "4.2%".to_string(),
                sheet: "延滞".to_string(),
                cells: vec!["B5".to_string(), "C5".to_string()],
            },
            AuditRow {
                token: "DELINDOL61".to_string(),
                value: "$0.00".to_string(),
                sheet: MISSING_SHEET.to_string(),
                cells: Vec::new(),
            },
        ];

        let table = render_audit_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "| Token      | Value | Sheet | Cells  |");
        assert_eq!(lines[1], "|------------|-------|-------|--------|");
        assert_eq!(lines[2], "| DELINPER30 | 4.2%  | 延滞  | B5, C5 |");
        assert_eq!(lines[3], "| DELINDOL61 | $0.00 | —     |        |");
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("a|b"), "a\\|b");
        assert_eq!(escape_cell("a\nb"), "a<br>b");
    }

    #[test]
    fn test_rows_serialize() {
        let rows = build_audit_rows(&FieldRecord::default(), &Provenance::new(), &[Field::DelinquentPercent30]);
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["token"], "DELINPER30");
        assert_eq!(json[0]["value"], "0.0%");
        assert_eq!(json[0]["sheet"], "—");
    }
}
