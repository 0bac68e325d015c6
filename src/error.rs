//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// storagereportクレート全体で使用するエラー型
///
/// ワークブックの読み込み、テンプレートの走査・描画中に発生する
/// 致命的なエラーを統一的に扱います。ラベル未検出などのカバレッジ不足は
/// エラーではなくデータとして返されるため、この型には含まれません。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー
/// - `Workbook`: スプレッドシートのデコード失敗（ファイル名付き）
/// - `Zip` / `Xml` / `Utf8`: テンプレートパッケージの解析失敗
/// - `Config`: ビルダー設定の検証失敗
/// - `SecurityViolation`: 入力サイズやZIP構造の制限違反
/// - `TemplateCoverage`: テンプレートに必須トークンが存在しない
/// - `Render`: 置換処理を完了できないプレースホルダーが存在する
///
/// # 使用例
///
/// ```rust,no_run
/// use storagereport::{ReportBuilder, ReportError};
///
/// # fn main() -> Result<(), ReportError> {
/// let engine = ReportBuilder::new().build()?;
/// match engine.extract_fields(b"not a workbook", "export.xlsx") {
///     Err(ReportError::Workbook { filename, .. }) => {
///         println!("{} を読み込めません", filename);
///     }
///     _ => {}
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ReportError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートのデコードに失敗したエラー
    ///
    /// 入力バイト列が有効な（またはサポートされた）ワークブックではない場合に
    /// 発生します。フィールドが一つも埋められる前に返されます。
    #[error("Failed to decode workbook '{filename}': {source}")]
    Workbook {
        /// アップロードされたファイル名
        filename: String,
        /// calamine由来のエラー
        #[source]
        source: calamine::Error,
    },

    /// ZIPアーカイブの解析・書き出しエラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// テンプレート内XMLペイロードの解析エラー
    #[error("XML error in '{part}': {message}")]
    Xml {
        /// パッケージ内のパス（例: `ppt/slides/slide1.xml`）
        part: String,
        /// 詳細メッセージ
        message: String,
    },

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// 設定の検証に失敗したエラー
    ///
    /// `ReportBuilder::build()`時、またはフィールドの型と値が一致しない
    /// `FieldRecord::with()`呼び出し時に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、入力サイズ制限などの
    /// 制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// テンプレートに必須トークンが含まれていないエラー
    ///
    /// 描画エラーとは区別され、テンプレート資産を出荷する前の検証で
    /// 検出することを想定しています。
    #[error("Template is missing required tokens: {}", .missing.join(", "))]
    TemplateCoverage {
        /// 見つからなかったトークン（必須リストの宣言順）
        missing: Vec<String>,
    },

    /// テンプレートの置換処理を完了できなかったエラー
    ///
    /// 部分的に置換された出力は返されません。
    #[error("Failed to render template: {} unresolved placeholder(s)", .unresolved.len())]
    Render {
        /// 解決できなかったプレースホルダーの一覧
        unresolved: Vec<UnresolvedPlaceholder>,
    },
}

/// 解決できなかったプレースホルダーの詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedPlaceholder {
    /// プレースホルダーを含むパッケージ内のパス
    pub part: String,
    /// テンプレート上の生テキスト（区切り文字を含む）
    pub placeholder: String,
    /// 解決できなかった理由
    pub issue: PlaceholderIssue,
}

/// プレースホルダーを解決できなかった理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PlaceholderIssue {
    /// `{{`に対応する`}}`がない
    Unterminated,
    /// 正規化後に本体が空になった（例: `{{ <a:r/> }}`）
    EmptyBody,
    /// プレースホルダーの外側に`}}`がある
    StrayDelimiter,
    /// 置換後のペイロードが整形式XMLではない
    BrokenMarkup(String),
}

impl fmt::Display for PlaceholderIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderIssue::Unterminated => write!(f, "unterminated placeholder"),
            PlaceholderIssue::EmptyBody => write!(f, "placeholder body is empty after normalization"),
            PlaceholderIssue::StrayDelimiter => write!(f, "stray placeholder delimiter"),
            PlaceholderIssue::BrokenMarkup(msg) => write!(f, "markup broken by substitution: {}", msg),
        }
    }
}

impl fmt::Display for UnresolvedPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}': {}", self.placeholder, self.part, self.issue)
    }
}
