//! Builder Module
//!
//! Fluent Builder APIを提供し、`ReportEngine`インスタンスを段階的に構築する。

use log::info;
use std::collections::HashSet;
use std::sync::Arc;

use crate::api::{Adjacency, DateFormat};
use crate::error::ReportError;
use crate::extractor::{Extraction, FieldExtractor};
use crate::formatter::validate_date_format;
use crate::parser::WorkbookParser;
use crate::schema::{Field, FieldRecord, LabelTable};
use crate::security::SecurityConfig;
use crate::template::{render_package, scan_package, TemplatePackage, TemplateScan};
use crate::types::Workbook;

/// 値セルを探す際に読み飛ばせる空セル数の上限
const MAX_VALUE_SEARCH_SPAN: u32 = 64;

/// 抽出・描画処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    /// ラベルから値セルを探す方向の優先順
    pub adjacency: Vec<Adjacency>,

    /// 値セルを探す最大距離（空セルを読み飛ばす）
    pub value_search_span: u32,

    /// ラベル照合の類似度の下限
    pub min_similarity: f64,

    /// 日付形式
    pub date_format: DateFormat,

    /// 入力サイズ・ZIP構造の制限
    pub security: SecurityConfig,

    /// ラベルテーブル（共有・不変）
    pub label_table: Arc<LabelTable>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adjacency: Adjacency::DEFAULT_ORDER.to_vec(),
            value_search_span: 3,
            min_similarity: 0.6,
            date_format: DateFormat::default(),
            security: SecurityConfig::default(),
            label_table: LabelTable::standard(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use storagereport::{Adjacency, ReportBuilder};
///
/// # fn main() -> Result<(), storagereport::ReportError> {
/// let engine = ReportBuilder::new()
///     .with_adjacency([Adjacency::Below, Adjacency::Right])
///     .with_min_similarity(0.75)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReportBuilder {
    /// 内部設定（構築中）
    config: EngineConfig,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 探索方向: 同一セル → 右 → 下
    /// - 探索距離: 3セル
    /// - 類似度の下限: 0.6
    /// - 日付形式: MM/DD/YYYY
    /// - ラベルテーブル: 組み込みの標準テーブル
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// ラベルから値セルを探す方向の優先順を指定する
    ///
    /// 最初に値を取得できた方向が採用されます。
    pub fn with_adjacency<I>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = Adjacency>,
    {
        self.config.adjacency = order.into_iter().collect();
        self
    }

    /// 値セルを探す最大距離を指定する
    ///
    /// ラベルと値の間にある空セルをこの数まで読み飛ばします（1以上、64以下）。
    pub fn with_value_search_span(mut self, span: u32) -> Self {
        self.config.value_search_span = span;
        self
    }

    /// ラベル照合の類似度の下限を指定する
    ///
    /// 部分一致の類似度は「候補の長さ / ラベルの長さ」で計算されます（0より大きく1以下）。
    pub fn with_min_similarity(mut self, threshold: f64) -> Self {
        self.config.min_similarity = threshold;
        self
    }

    /// 日付の出力形式を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use storagereport::{ReportBuilder, DateFormat};
    ///
    /// let builder = ReportBuilder::new()
    ///     .with_date_format(DateFormat::Iso8601);
    /// ```
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// ラベルテーブルを差し替える
    ///
    /// 管理ソフト固有のラベルに対応する場合に使用します。
    pub fn with_label_table(mut self, table: Arc<LabelTable>) -> Self {
        self.config.label_table = table;
        self
    }

    /// 入力ファイル（ワークブック・テンプレート）の最大サイズを指定する
    pub fn with_max_input_size(mut self, bytes: u64) -> Self {
        self.config.security.max_input_file_size = bytes;
        self
    }

    /// 設定を検証し、`ReportEngine`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::Config(String)`: 設定の検証に失敗した場合
    ///   * 探索方向が空、または重複している
    ///   * 探索距離が範囲外
    ///   * 類似度の下限が範囲外
    ///   * カスタム日付形式が不正な書式文字列
    ///   * 最大入力サイズが0
    pub fn build(self) -> Result<ReportEngine, ReportError> {
        // 1. 探索方向の検証
        if self.config.adjacency.is_empty() {
            return Err(ReportError::Config(
                "Adjacency order must contain at least one direction".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.config.adjacency.iter().find(|a| !seen.insert(**a)) {
            return Err(ReportError::Config(format!(
                "Adjacency {:?} appears more than once",
                dup
            )));
        }

        // 2. 探索距離の検証
        if !(1..=MAX_VALUE_SEARCH_SPAN).contains(&self.config.value_search_span) {
            return Err(ReportError::Config(format!(
                "Invalid value search span: {} (expected 1..={})",
                self.config.value_search_span, MAX_VALUE_SEARCH_SPAN
            )));
        }

        // 3. 類似度の下限の検証
        let threshold = self.config.min_similarity;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ReportError::Config(format!(
                "Invalid minimum similarity: {} (expected 0 < value <= 1)",
                threshold
            )));
        }

        // 4. 日付形式の検証
        validate_date_format(&self.config.date_format)?;

        // 5. 入力サイズの検証
        if self.config.security.max_input_file_size == 0 {
            return Err(ReportError::Config(
                "Maximum input size must be greater than zero".to_string(),
            ));
        }

        Ok(ReportEngine {
            config: self.config,
        })
    }
}

/// オーナーレポート処理のファサード
///
/// ワークブックからのフィールド抽出、テンプレートの走査と描画を提供します。
/// 状態を持たないため、スレッド間で共有して並行に呼び出せます。
///
/// # 使用例
///
/// ```rust,no_run
/// use storagereport::{ReportBuilder, OWNER_REPORT_TEMPLATE};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = ReportBuilder::new().build()?;
/// let workbook = std::fs::read("management_summary.xlsx")?;
///
/// let record = engine.extract_fields(&workbook, "management_summary.xlsx")?;
/// let deck = engine.render_template(OWNER_REPORT_TEMPLATE, &record)?;
/// std::fs::write("owner_report.pptx", deck)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReportEngine {
    config: EngineConfig,
}

impl ReportEngine {
    /// ワークブックからフィールドレコードを抽出
    ///
    /// 見つからないフィールドはデフォルト値（空文字列またはゼロ）になります。
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::Workbook` - 有効なワークブックではない場合（ファイル名付き）
    /// * `ReportError::SecurityViolation` - 入力サイズやZIP構造の制限違反
    pub fn extract_fields(&self, bytes: &[u8], filename: &str) -> Result<FieldRecord, ReportError> {
        Ok(self.extract_with_provenance(bytes, filename, &[])?.record)
    }

    /// ワークブックからフィールドレコードと出所を抽出
    ///
    /// `tokens`に含まれるフィールドについて出所（シート名とセル参照）を記録します。
    /// カバレッジ不足は`Extraction::missing_fields`と`Extraction::unmatched_labels`で
    /// 返されます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use storagereport::{build_audit_rows, render_audit_table, ReportBuilder, DELINQUENCY_TOKENS};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = ReportBuilder::new().build()?;
    /// let bytes = std::fs::read("aging.xlsx")?;
    /// let extraction = engine.extract_with_provenance(&bytes, "aging.xlsx", &DELINQUENCY_TOKENS)?;
    ///
    /// let rows = build_audit_rows(&extraction.record, &extraction.provenance, &DELINQUENCY_TOKENS);
    /// println!("{}", render_audit_table(&rows));
    /// # Ok(())
    /// # }
    /// ```
    pub fn extract_with_provenance(
        &self,
        bytes: &[u8],
        filename: &str,
        tokens: &[Field],
    ) -> Result<Extraction, ReportError> {
        let mut parser = WorkbookParser::open(bytes, filename, &self.config.security)?;
        let workbook = parser.parse_all()?;

        let extraction = self.extract_from_workbook(&workbook, tokens);
        info!(
            "extracted {}/{} field(s) from '{}' ({} sheet(s), {} unmatched label(s))",
            Field::ALL.len() - extraction.missing_fields.len(),
            Field::ALL.len(),
            filename,
            workbook.sheets().len(),
            extraction.unmatched_labels.len()
        );
        Ok(extraction)
    }

    /// デコード済みのワークブックからフィールドを抽出
    pub fn extract_from_workbook(&self, workbook: &Workbook, tokens: &[Field]) -> Extraction {
        FieldExtractor::new(&self.config).extract(workbook, tokens)
    }

    /// テンプレート内のプレースホルダーを走査
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::Zip` / `ReportError::Utf8` - パッケージとして読み込めない場合
    /// * `ReportError::SecurityViolation` - 入力サイズやZIP構造の制限違反
    pub fn scan_template_tokens(&self, template: &[u8]) -> Result<TemplateScan, ReportError> {
        let package = TemplatePackage::from_bytes(template, &self.config.security)?;
        scan_package(template, &package)
    }

    /// テンプレートが必須トークンをすべて含むことを検証
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::TemplateCoverage` - 必須トークンが存在しない場合
    ///   （`missing`は`required`の順序）
    pub fn validate_template(
        &self,
        template: &[u8],
        required: &[Field],
    ) -> Result<TemplateScan, ReportError> {
        let scan = self.scan_template_tokens(template)?;
        let missing = scan.missing(required);
        if !missing.is_empty() {
            return Err(ReportError::TemplateCoverage {
                missing: missing.iter().map(|f| f.token().to_string()).collect(),
            });
        }
        Ok(scan)
    }

    /// テンプレートにフィールドの値を差し込み、パッケージのバイト列を返す
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::Render` - 解決できないプレースホルダーがある場合
    ///   （部分的に置換された出力は返されない）
    /// * `ReportError::Xml` - 置換対象のペイロードが整形式XMLではない場合
    pub fn render_template(
        &self,
        template: &[u8],
        record: &FieldRecord,
    ) -> Result<Vec<u8>, ReportError> {
        let mut package = TemplatePackage::from_bytes(template, &self.config.security)?;
        render_package(&mut package, record)?;
        package.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_builder_new() {
        let builder = ReportBuilder::new();
        assert_eq!(builder.config.adjacency, Adjacency::DEFAULT_ORDER.to_vec());
        assert_eq!(builder.config.value_search_span, 3);
        assert_eq!(builder.config.min_similarity, 0.6);
        assert_eq!(builder.config.date_format, DateFormat::MonthDayYear);
        assert!(Arc::ptr_eq(&builder.config.label_table, &LabelTable::standard()));
    }

    #[test]
    fn test_with_adjacency() {
        let builder = ReportBuilder::new().with_adjacency([Adjacency::Below]);
        assert_eq!(builder.config.adjacency, vec![Adjacency::Below]);
    }

    #[test]
    fn test_with_date_format() {
        let builder = ReportBuilder::new()
            .with_date_format(DateFormat::Custom("%Y年%m月%d日".to_string()));
        assert!(matches!(
            builder.config.date_format,
            DateFormat::Custom(ref s) if s == "%Y年%m月%d日"
        ));
    }

    #[test]
    fn test_with_max_input_size() {
        let builder = ReportBuilder::new().with_max_input_size(1024);
        assert_eq!(builder.config.security.max_input_file_size, 1024);
    }

    #[test]
    fn test_build_success() {
        assert!(ReportBuilder::new().build().is_ok());
    }

    #[test]
    fn test_build_with_empty_adjacency() {
        let result = ReportBuilder::new().with_adjacency(Vec::new()).build();
        match result {
            Err(ReportError::Config(msg)) => assert!(msg.contains("at least one")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_build_with_duplicate_adjacency() {
        let result = ReportBuilder::new()
            .with_adjacency([Adjacency::Right, Adjacency::Right])
            .build();
        match result {
            Err(ReportError::Config(msg)) => assert!(msg.contains("more than once")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_build_with_invalid_span() {
        assert!(matches!(
            ReportBuilder::new().with_value_search_span(0).build(),
            Err(ReportError::Config(_))
        ));
        assert!(matches!(
            ReportBuilder::new().with_value_search_span(65).build(),
            Err(ReportError::Config(_))
        ));
        assert!(ReportBuilder::new().with_value_search_span(64).build().is_ok());
    }

    #[test]
    fn test_build_with_invalid_similarity() {
        for threshold in [0.0, -0.5, 1.5, f64::NAN] {
            let result = ReportBuilder::new().with_min_similarity(threshold).build();
            assert!(
                matches!(result, Err(ReportError::Config(_))),
                "threshold {} should be rejected",
                threshold
            );
        }
        assert!(ReportBuilder::new().with_min_similarity(1.0).build().is_ok());
    }

    #[test]
    fn test_build_with_invalid_custom_date_format() {
        let result = ReportBuilder::new()
            .with_date_format(DateFormat::Custom("".to_string()))
            .build();
        match result {
            Err(ReportError::Config(msg)) => assert!(msg.contains("date format")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_build_with_zero_input_size() {
        assert!(matches!(
            ReportBuilder::new().with_max_input_size(0).build(),
            Err(ReportError::Config(_))
        ));
    }

    #[test]
    fn test_builder_method_chaining() {
        let table = Arc::new(
            LabelTable::from_entries(vec![(Field::TotalUnits, vec!["unit total"])]).unwrap(),
        );
        let builder = ReportBuilder::new()
            .with_adjacency([Adjacency::Below, Adjacency::Inline])
            .with_value_search_span(5)
            .with_min_similarity(0.8)
            .with_date_format(DateFormat::Iso8601)
            .with_label_table(table.clone())
            .with_max_input_size(4096);

        assert_eq!(
            builder.config.adjacency,
            vec![Adjacency::Below, Adjacency::Inline]
        );
        assert_eq!(builder.config.value_search_span, 5);
        assert_eq!(builder.config.min_similarity, 0.8);
        assert_eq!(builder.config.date_format, DateFormat::Iso8601);
        assert!(Arc::ptr_eq(&builder.config.label_table, &table));
        assert_eq!(builder.config.security.max_input_file_size, 4096);
        assert!(builder.build().is_ok());
    }
}
