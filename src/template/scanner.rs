//! Placeholder Scanner
//!
//! XMLペイロードから`{{ ... }}`形式のプレースホルダーを検出し、
//! トークン正規化器で本体を正規トークンへ変換します。

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use super::TemplatePackage;
use crate::error::{PlaceholderIssue, ReportError, UnresolvedPlaceholder};
use crate::schema::Field;
use crate::token::normalize_token;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// 未終端プレースホルダーのエラー表示に含める最大文字数
const RAW_PREVIEW_CHARS: usize = 48;

/// ペイロード内で検出されたプレースホルダー
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder<'t> {
    /// ペイロード内のバイト範囲（区切り文字を含む）
    pub range: Range<usize>,
    /// テンプレート上の生テキスト
    pub raw: &'t str,
    pub kind: PlaceholderKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlaceholderKind {
    /// 正規化済みトークン
    Token(String),
    Malformed(PlaceholderIssue),
}

/// ペイロード内のプレースホルダーを出現順に検出
///
/// 次の`{{`またはペイロード末尾までに`}}`がない`{{`は未終端、
/// プレースホルダーの外側に現れる`}}`は余分な区切り文字として報告します。
pub(crate) fn find_placeholders(text: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(open_rel) = text[pos..].find(OPEN) {
        let open = pos + open_rel;
        push_stray_closers(text, pos..open, &mut found);

        let body_start = open + OPEN.len();
        let next_open = text[body_start..].find(OPEN).map(|i| body_start + i);
        let close = text[body_start..].find(CLOSE).map(|i| body_start + i);

        match close {
            Some(close) if next_open.map_or(true, |next| close <= next) => {
                let end = close + CLOSE.len();
                let kind = match normalize_token(&text[body_start..close]) {
                    Some(token) => PlaceholderKind::Token(token),
                    None => PlaceholderKind::Malformed(PlaceholderIssue::EmptyBody),
                };
                found.push(Placeholder {
                    range: open..end,
                    raw: &text[open..end],
                    kind,
                });
                pos = end;
            }
            _ => {
                let limit = next_open.unwrap_or(text.len());
                let preview_end = text[open..limit]
                    .char_indices()
                    .nth(RAW_PREVIEW_CHARS)
                    .map_or(limit, |(i, _)| open + i);
                found.push(Placeholder {
                    range: open..body_start,
                    raw: &text[open..preview_end],
                    kind: PlaceholderKind::Malformed(PlaceholderIssue::Unterminated),
                });
                pos = body_start;
            }
        }
    }
    push_stray_closers(text, pos..text.len(), &mut found);

    found
}

fn push_stray_closers<'t>(text: &'t str, gap: Range<usize>, found: &mut Vec<Placeholder<'t>>) {
    let mut pos = gap.start;
    while let Some(rel) = text[pos..gap.end].find(CLOSE) {
        let start = pos + rel;
        let end = start + CLOSE.len();
        found.push(Placeholder {
            range: start..end,
            raw: &text[start..end],
            kind: PlaceholderKind::Malformed(PlaceholderIssue::StrayDelimiter),
        });
        pos = end;
    }
}

/// プレースホルダー本体を正規トークンに書き換える
///
/// `{{ delin</a:t></a:r><a:r><a:t>Per30 }}` は `{{DELINPER30}}` になります。
/// 不正なプレースホルダーはそのまま残されます。
pub(crate) fn canonicalize(text: &str, placeholders: &[Placeholder<'_>]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut pos = 0;
    for placeholder in placeholders {
        output.push_str(&text[pos..placeholder.range.start]);
        match &placeholder.kind {
            PlaceholderKind::Token(token) => {
                output.push_str(OPEN);
                output.push_str(token);
                output.push_str(CLOSE);
            }
            PlaceholderKind::Malformed(_) => output.push_str(&text[placeholder.range.clone()]),
        }
        pos = placeholder.range.end;
    }
    output.push_str(&text[pos..]);
    output
}

/// テンプレートの走査結果
///
/// # 使用例
///
/// ```rust,no_run
/// use storagereport::{ReportBuilder, DELINQUENCY_TOKENS, OWNER_REPORT_TEMPLATE};
///
/// # fn main() -> Result<(), storagereport::ReportError> {
/// let engine = ReportBuilder::new().build()?;
/// let scan = engine.scan_template_tokens(OWNER_REPORT_TEMPLATE)?;
/// assert!(scan.missing(&DELINQUENCY_TOKENS).is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateScan {
    /// テンプレートバイト列のSHA-256（16進小文字）
    pub content_hash: String,
    /// ペイロードごとの正規トークン（プレースホルダーを含むペイロードのみ）
    pub per_file: BTreeMap<String, BTreeSet<String>>,
    /// テンプレート全体の正規トークン
    pub all: BTreeSet<String>,
    /// 不正なプレースホルダー（ペイロード順・出現順）
    pub malformed: Vec<UnresolvedPlaceholder>,
}

impl TemplateScan {
    /// テンプレートにトークンが含まれるか
    pub fn contains(&self, field: Field) -> bool {
        self.all.contains(field.token())
    }

    /// 必須トークンのうちテンプレートに存在しないもの（必須リストの順序）
    pub fn missing(&self, required: &[Field]) -> Vec<Field> {
        required
            .iter()
            .copied()
            .filter(|field| !self.contains(*field))
            .collect()
    }

    /// スキーマに存在しないトークン（描画時は空文字列に置換される）
    pub fn unknown_tokens(&self) -> Vec<&str> {
        self.all
            .iter()
            .map(String::as_str)
            .filter(|token| Field::from_token(token).is_none())
            .collect()
    }
}

/// パッケージ内のすべての対象ペイロードを並列に走査
pub(crate) fn scan_package(
    bytes: &[u8],
    package: &TemplatePackage,
) -> Result<TemplateScan, ReportError> {
    let parts = package.text_parts()?;

    let results: Vec<(String, BTreeSet<String>, Vec<UnresolvedPlaceholder>)> = parts
        .par_iter()
        .map(|part| {
            let mut tokens = BTreeSet::new();
            let mut malformed = Vec::new();
            for placeholder in find_placeholders(&part.text) {
                match placeholder.kind {
                    PlaceholderKind::Token(token) => {
                        tokens.insert(token);
                    }
                    PlaceholderKind::Malformed(issue) => malformed.push(UnresolvedPlaceholder {
                        part: part.name.clone(),
                        placeholder: placeholder.raw.to_string(),
                        issue,
                    }),
                }
            }
            (part.name.clone(), tokens, malformed)
        })
        .collect();

    let mut scan = TemplateScan {
        content_hash: format!("{:x}", Sha256::digest(bytes)),
        per_file: BTreeMap::new(),
        all: BTreeSet::new(),
        malformed: Vec::new(),
    };
    for (name, tokens, malformed) in results {
        scan.all.extend(tokens.iter().cloned());
        scan.malformed.extend(malformed);
        if !tokens.is_empty() {
            scan.per_file.insert(name, tokens);
        }
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DELINQUENCY_TOKENS;
    use crate::security::SecurityConfig;
    use crate::template::test_support::build_package;

    fn tokens(text: &str) -> Vec<String> {
        find_placeholders(text)
            .into_iter()
            .filter_map(|p| match p.kind {
                PlaceholderKind::Token(token) => Some(token),
                PlaceholderKind::Malformed(_) => None,
            })
            .collect()
    }

    fn issues(text: &str) -> Vec<PlaceholderIssue> {
        find_placeholders(text)
            .into_iter()
            .filter_map(|p| match p.kind {
                PlaceholderKind::Malformed(issue) => Some(issue),
                PlaceholderKind::Token(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_find_simple_placeholders() {
        assert_eq!(
            tokens("<a:t>{{TOTALUNITS}} of {{ occupiedUnits }}</a:t>"),
            vec!["TOTALUNITS", "OCCUPIEDUNITS"]
        );
        assert!(find_placeholders("<a:t>no tokens</a:t>").is_empty());
    }

    #[test]
    fn test_find_split_placeholder() {
        let text = r#"<a:r><a:t>{{DELIN</a:t></a:r><a:r><a:rPr lang="en-US"/><a:t>PER30}}</a:t></a:r>"#;
        let found = find_placeholders(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, PlaceholderKind::Token("DELINPER30".to_string()));
        assert!(found[0].raw.starts_with("{{DELIN</a:t>"));
    }

    #[test]
    fn test_find_hidden_characters() {
        assert_eq!(tokens("{{DELIN\u{200B}UNIT60}}"), vec!["DELINUNIT60"]);
        assert_eq!(tokens("{{&#8203;delindol61}}"), vec!["DELINDOL61"]);
    }

    #[test]
    fn test_unterminated_before_next_open() {
        let text = "{{TOTALUNITS and {{VACANTUNITS}}";
        assert_eq!(issues(text), vec![PlaceholderIssue::Unterminated]);
        assert_eq!(tokens(text), vec!["VACANTUNITS"]);
    }

    #[test]
    fn test_unterminated_at_end() {
        let found = find_placeholders("<a:t>{{TOTALUNITS</a:t>");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].raw, "{{TOTALUNITS</a:t>");
        assert_eq!(
            found[0].kind,
            PlaceholderKind::Malformed(PlaceholderIssue::Unterminated)
        );
    }

    #[test]
    fn test_unterminated_preview_is_truncated() {
        let text = format!("{{{{{}", "x".repeat(200));
        let found = find_placeholders(&text);
        assert_eq!(found[0].raw.chars().count(), RAW_PREVIEW_CHARS);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(issues("{{ <a:br/> }}"), vec![PlaceholderIssue::EmptyBody]);
        assert_eq!(issues("{{}}"), vec![PlaceholderIssue::EmptyBody]);
    }

    #[test]
    fn test_stray_closer() {
        assert_eq!(
            issues("TOTALUNITS}} and {{VACANTUNITS}} }}"),
            vec![PlaceholderIssue::StrayDelimiter, PlaceholderIssue::StrayDelimiter]
        );
    }

    #[test]
    fn test_canonicalize() {
        let text = r#"<a:t>{{ delin</a:t></a:r><a:r><a:t>Per30 }}</a:t> {{totalUnits}}"#;
        let found = find_placeholders(text);
        assert_eq!(
            canonicalize(text, &found),
            "<a:t>{{DELINPER30}}</a:t> {{TOTALUNITS}}"
        );
    }

    #[test]
    fn test_canonicalize_is_stable() {
        let text = "<a:t>{{TOTALUNITS}}</a:t>";
        let found = find_placeholders(text);
        assert_eq!(canonicalize(text, &found), text);
    }

    #[test]
    fn test_scan_package() {
        let bytes = build_package(&[
            (
                "ppt/slides/slide1.xml",
                "<p:sld><a:t>{{DELINPER30}} {{delinunit30}}</a:t></p:sld>",
            ),
            ("ppt/slides/slide2.xml", "<p:sld><a:t>{{ BOGUS }}</a:t></p:sld>"),
            ("ppt/slideLayouts/slideLayout1.xml", "<p:sldLayout/>"),
            ("ppt/presentation.xml", "<p:presentation>{{TOTALUNITS}}</p:presentation>"),
        ]);
        let package = TemplatePackage::from_bytes(&bytes, &SecurityConfig::default()).unwrap();
        let scan = scan_package(&bytes, &package).unwrap();

        assert_eq!(scan.content_hash.len(), 64);
        assert_eq!(scan.per_file.len(), 2);
        assert!(scan.per_file["ppt/slides/slide1.xml"].contains("DELINUNIT30"));
        // 対象外のペイロードは走査しない
        assert!(!scan.all.contains("TOTALUNITS"));
        assert_eq!(scan.unknown_tokens(), vec!["BOGUS"]);
        assert!(scan.malformed.is_empty());

        let missing = scan.missing(&DELINQUENCY_TOKENS);
        assert_eq!(missing.len(), 7);
        assert_eq!(missing[0], Field::DelinquentDollars30);
    }

    #[test]
    fn test_scan_reports_malformed() {
        let bytes = build_package(&[("ppt/slides/slide1.xml", "<a:t>{{TOTALUNITS</a:t>")]);
        let package = TemplatePackage::from_bytes(&bytes, &SecurityConfig::default()).unwrap();
        let scan = scan_package(&bytes, &package).unwrap();

        assert!(scan.all.is_empty());
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(scan.malformed[0].part, "ppt/slides/slide1.xml");
        assert_eq!(scan.malformed[0].issue, PlaceholderIssue::Unterminated);
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        let bytes = build_package(&[("ppt/slides/slide1.xml", "<a:t>{{TOTALUNITS}}</a:t>")]);
        let package = TemplatePackage::from_bytes(&bytes, &SecurityConfig::default()).unwrap();
        let first = scan_package(&bytes, &package).unwrap();
        let second = scan_package(&bytes, &package).unwrap();
        assert_eq!(first.content_hash, second.content_hash);
        assert!(first
            .content_hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
