//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

/// ラベルセルから値セルを探す方向
///
/// 管理ソフトのエクスポートはベンダーやレポート種別によってレイアウトが異なるため、
/// 探索の優先順位は`ReportBuilder::with_adjacency`で変更できます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Adjacency {
    /// 同一セル内の `"ラベル: 値"` 形式
    ///
    /// 例: `Report Date: 10/15/2026`
    Inline,

    /// 同じ行の右隣のセル
    ///
    /// ```text
    /// | Total Units | 412 |
    /// ```
    Right,

    /// 同じ列の下のセル
    ///
    /// ```text
    /// | Total Units |
    /// | 412         |
    /// ```
    Below,
}

impl Adjacency {
    /// デフォルトの探索順（同一セル → 右 → 下）
    pub const DEFAULT_ORDER: [Adjacency; 3] = [Adjacency::Inline, Adjacency::Right, Adjacency::Below];
}

/// 日付の出力形式
///
/// 日付フィールドにExcelのシリアル日付値が入っていた場合の文字列化方法を指定します。
/// 文字列で入力された日付はそのまま保持されます。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DateFormat {
    /// 米国式（MM/DD/YYYY）
    ///
    /// 例: `10/15/2026`
    #[default]
    MonthDayYear,

    /// ISO 8601形式（YYYY-MM-DD）
    ///
    /// 例: `2026-10-15`
    Iso8601,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use storagereport::{ReportBuilder, DateFormat};
    ///
    /// # fn main() -> Result<(), storagereport::ReportError> {
    /// let engine = ReportBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%B %-d, %Y".to_string()))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    Custom(String),
}

impl DateFormat {
    /// chrono互換のフォーマット文字列
    pub(crate) fn pattern(&self) -> &str {
        match self {
            DateFormat::MonthDayYear => "%m/%d/%Y",
            DateFormat::Iso8601 => "%Y-%m-%d",
            DateFormat::Custom(pattern) => pattern,
        }
    }
}
