//! Formatter Module
//!
//! セル値をフィールドの型へ変換（coercion）し、抽出済みの値を
//! テンプレートや監査表向けの表示文字列へ整形するモジュール。

use chrono::format::{Item, StrftimeItems};
use chrono::{Duration, NaiveDate};
use std::fmt::Write as _;

use crate::api::DateFormat;
use crate::error::ReportError;
use crate::schema::{Field, FieldKind, FieldValue};
use crate::types::CellValue;

/// 値フォーマッター
///
/// セル値から型付きフィールド値への変換と、表示用の整形のファサードとして機能します。
#[derive(Debug)]
pub(crate) struct ValueFormatter<'a> {
    /// 日付フォーマッター
    date_formatter: DateFormatter<'a>,
}

impl<'a> ValueFormatter<'a> {
    /// 日付形式を指定してフォーマッターを生成
    pub fn new(date_format: &'a DateFormat) -> Self {
        Self {
            date_formatter: DateFormatter { date_format },
        }
    }

    /// セル値をフィールドの型へ変換
    ///
    /// # 戻り値
    ///
    /// * `Some(FieldValue)` - 変換できた場合（値はフィールドの型に適合する）
    /// * `None` - 空セル、エラー値、数値として解釈できない文字列など
    pub fn coerce(&self, kind: FieldKind, value: &CellValue) -> Option<FieldValue> {
        match kind {
            FieldKind::Text => self.coerce_text(value),
            FieldKind::Date => match value {
                CellValue::DateTime(serial) | CellValue::Number(serial) => self
                    .date_formatter
                    .format(*serial)
                    .map(FieldValue::Text),
                CellValue::String(s) => non_blank(s).map(FieldValue::Text),
                _ => None,
            },
            FieldKind::Count | FieldKind::Currency | FieldKind::Percent => match value {
                CellValue::Number(n) if n.is_finite() => Some(FieldValue::Number(*n)),
                CellValue::String(s) => {
                    let parsed = parse_number(s)?;
                    match (kind, parsed.percent) {
                        (FieldKind::Percent, true) => Some(FieldValue::PercentPoints(parsed.value)),
                        // `%`付きの件数・金額は型が合わない
                        (_, true) => None,
                        (_, false) => Some(FieldValue::Number(parsed.value)),
                    }
                }
                _ => None,
            },
        }
    }

    fn coerce_text(&self, value: &CellValue) -> Option<FieldValue> {
        let text = match value {
            CellValue::String(s) => non_blank(s)?,
            CellValue::Number(n) => format_plain_number(*n),
            CellValue::DateTime(serial) => self.date_formatter.format(*serial)?,
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(_) | CellValue::Empty => return None,
        };
        Some(FieldValue::Text(text))
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 日付フォーマッター
///
/// Excelのシリアル日付値（1900年システム）を文字列に変換します。
#[derive(Debug)]
pub(crate) struct DateFormatter<'a> {
    date_format: &'a DateFormat,
}

/// 9999-12-31 のシリアル値
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

impl DateFormatter<'_> {
    /// シリアル値をフォーマット
    ///
    /// 範囲外（負の値、9999年より後）は`None`を返します。
    ///
    /// # エポックシステム
    ///
    /// - 1899年12月30日起算
    /// - Excelは1900年をうるう年として扱うため、シリアル値60以下は1日ずれる
    ///   （シリアル値1 = 1900-01-01、シリアル値61 = 1900-03-01）
    pub fn format(&self, serial_value: f64) -> Option<String> {
        if !(0.0..=MAX_DATE_SERIAL).contains(&serial_value) {
            return None;
        }

        let mut days = serial_value.floor() as i64;
        if days < 61 {
            days += 1;
        }

        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        let date = epoch.checked_add_signed(Duration::days(days))?;

        let mut formatted = String::new();
        write!(formatted, "{}", date.format(self.date_format.pattern())).ok()?;
        Some(formatted)
    }
}

/// カスタム日付形式を検証
///
/// chronoが解釈できない指定子を含む場合は`ReportError::Config`を返します。
pub(crate) fn validate_date_format(date_format: &DateFormat) -> Result<(), ReportError> {
    let pattern = date_format.pattern();
    if pattern.trim().is_empty() {
        return Err(ReportError::Config(
            "Custom date format cannot be empty".to_string(),
        ));
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ReportError::Config(format!(
            "Invalid date format string: '{}'",
            pattern
        )));
    }
    Ok(())
}

/// 文字列から読み取った数値
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParsedNumber {
    /// 表記どおりの値（`%`付きでも100で割らない）
    pub value: f64,
    /// 末尾に`%`が付いていたか
    pub percent: bool,
}

/// 表示用の数値文字列を数値として解釈
///
/// 以下の表記を受け付けます。
///
/// - 通貨記号と桁区切り: `$12,345.00` → `12345.0`
/// - 会計形式の負数: `(1,234.50)` → `-1234.5`
/// - パーセント: `87.3%` → `87.3`（`percent`フラグ付き）
///
/// 数字を含まない文字列や有限でない値は`None`を返します。
pub(crate) fn parse_number(text: &str) -> Option<ParsedNumber> {
    let mut s = text.trim();

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }

    let mut percent = false;
    if let Some(rest) = s.strip_suffix('%') {
        percent = true;
        s = rest.trim_end();
    }

    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '\u{00A0}'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    if negative {
        value = -value;
    }
    Some(ParsedNumber { value, percent })
}

/// フィールドの値を表示文字列に整形
///
/// | 型 | 例 |
/// |----|----|
/// | Count | `1,234` |
/// | Currency | `$12,345.00` |
/// | Percent | `87.3%`（`0.873`と`87.3`のどちらも同じ表示） |
/// | Text / Date | そのまま |
///
/// `%`付きの文字列から読み取った値（`FieldValue::PercentPoints`）は
/// 大きさに関わらず表記どおりのパーセントとして表示します。
pub fn display_value(field: Field, value: &FieldValue) -> String {
    match (field.kind(), value) {
        (_, FieldValue::Text(text)) => text.clone(),
        (_, FieldValue::PercentPoints(points)) => format_percent_points(*points),
        (FieldKind::Count, FieldValue::Number(n)) => format_count(*n),
        (FieldKind::Currency, FieldValue::Number(n)) => format_currency(*n),
        (FieldKind::Percent, FieldValue::Number(n)) => format_percent(*n),
        (FieldKind::Text | FieldKind::Date, FieldValue::Number(n)) => format_plain_number(*n),
    }
}

/// 件数を四捨五入して桁区切り付きで整形
pub(crate) fn format_count(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}{}", sign, group_thousands(rounded.abs() as u64))
}

/// 金額を `$1,234.56` 形式で整形
pub(crate) fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, group_thousands(cents / 100), cents % 100)
}

/// 割合を小数第1位までのパーセントで整形
///
/// 絶対値が1以下の値は端数（`0.873`）とみなして100倍します。
pub(crate) fn format_percent(value: f64) -> String {
    let pct = if value.abs() <= 1.0 { value * 100.0 } else { value };
    format_percent_points(pct)
}

/// パーセント値をそのまま小数第1位まで整形
fn format_percent_points(pct: f64) -> String {
    // -0.0% を出さない
    let pct = if (pct * 10.0).round() == 0.0 { 0.0 } else { pct };
    format!("{:.1}%", pct)
}

fn format_plain_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
