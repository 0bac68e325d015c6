//! Template Renderer
//!
//! 正規化済みプレースホルダーをフィールドの表示値に置換し、
//! 置換後のペイロードが整形式XMLであることを検証します。

use log::{info, warn};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use rayon::prelude::*;
use std::collections::HashMap;

use super::scanner::{canonicalize, find_placeholders, Placeholder, PlaceholderKind};
use super::{TemplatePackage, TextPart};
use crate::error::{PlaceholderIssue, ReportError, UnresolvedPlaceholder};
use crate::formatter::display_value;
use crate::schema::FieldRecord;

/// トークンから表示値への置換表
#[derive(Debug, Clone)]
pub(crate) struct SubstitutionMap {
    values: HashMap<&'static str, String>,
}

impl SubstitutionMap {
    /// レコードのすべてのフィールドを表示値に整形
    pub fn from_record(record: &FieldRecord) -> Self {
        let values = record
            .iter()
            .map(|(field, value)| (field.token(), display_value(field, value)))
            .collect();
        Self { values }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }
}

/// 1ペイロード分の描画結果
struct RenderedPart {
    name: String,
    /// 置換後の内容（プレースホルダーがない場合は`None`）
    output: Option<String>,
    substituted: usize,
    unresolved: Vec<UnresolvedPlaceholder>,
}

/// パッケージ内のすべての対象ペイロードを描画
///
/// いずれかのペイロードで解決できないプレースホルダーがあれば、パッケージを
/// 変更せずに`ReportError::Render`を返します。
pub(crate) fn render_package(
    package: &mut TemplatePackage,
    record: &FieldRecord,
) -> Result<(), ReportError> {
    let values = SubstitutionMap::from_record(record);
    let parts = package.text_parts()?;

    let rendered: Vec<RenderedPart> = parts
        .par_iter()
        .map(|part| render_part(part, &values))
        .collect::<Result<_, _>>()?;

    let unresolved: Vec<UnresolvedPlaceholder> = rendered
        .iter()
        .flat_map(|part| part.unresolved.iter().cloned())
        .collect();
    if !unresolved.is_empty() {
        return Err(ReportError::Render { unresolved });
    }

    let mut substituted = 0;
    let mut touched = 0;
    for part in rendered {
        if let Some(output) = part.output {
            substituted += part.substituted;
            touched += 1;
            package.replace(&part.name, output.into_bytes());
        }
    }
    info!(
        "rendered {} placeholder(s) across {} part(s)",
        substituted, touched
    );

    Ok(())
}

fn render_part(part: &TextPart, values: &SubstitutionMap) -> Result<RenderedPart, ReportError> {
    let placeholders = find_placeholders(&part.text);
    let mut rendered = RenderedPart {
        name: part.name.clone(),
        output: None,
        substituted: 0,
        unresolved: Vec::new(),
    };
    if placeholders.is_empty() {
        return Ok(rendered);
    }

    verify_xml(&part.text).map_err(|message| ReportError::Xml {
        part: part.name.clone(),
        message,
    })?;

    rendered.unresolved = placeholders
        .iter()
        .filter_map(|placeholder| match &placeholder.kind {
            PlaceholderKind::Malformed(issue) => {
                Some(unresolved(&part.name, placeholder, issue.clone()))
            }
            PlaceholderKind::Token(_) => None,
        })
        .collect();
    if !rendered.unresolved.is_empty() {
        return Ok(rendered);
    }

    let canonical = canonicalize(&part.text, &placeholders);
    if let Err(message) = verify_xml(&canonical) {
        // 本体内のタグが対応していない分割プレースホルダーが原因
        let mut culprits: Vec<&Placeholder<'_>> =
            placeholders.iter().filter(|p| p.raw.contains('<')).collect();
        if culprits.is_empty() {
            culprits = placeholders.iter().collect();
        }
        rendered.unresolved = culprits
            .into_iter()
            .map(|p| unresolved(&part.name, p, PlaceholderIssue::BrokenMarkup(message.clone())))
            .collect();
        return Ok(rendered);
    }

    let (output, substituted) = substitute(&part.name, &canonical, values);
    if let Err(message) = verify_xml(&output) {
        rendered.unresolved = placeholders
            .iter()
            .map(|p| unresolved(&part.name, p, PlaceholderIssue::BrokenMarkup(message.clone())))
            .collect();
        return Ok(rendered);
    }

    rendered.output = Some(output);
    rendered.substituted = substituted;
    Ok(rendered)
}

fn unresolved(part: &str, placeholder: &Placeholder<'_>, issue: PlaceholderIssue) -> UnresolvedPlaceholder {
    UnresolvedPlaceholder {
        part: part.to_string(),
        placeholder: placeholder.raw.to_string(),
        issue,
    }
}

/// 正規化済みペイロードのプレースホルダーをXMLエスケープした表示値で置換
///
/// スキーマにないトークンは空文字列になります。
fn substitute(part: &str, canonical: &str, values: &SubstitutionMap) -> (String, usize) {
    let placeholders = find_placeholders(canonical);
    let mut output = String::with_capacity(canonical.len());
    let mut pos = 0;

    for placeholder in &placeholders {
        output.push_str(&canonical[pos..placeholder.range.start]);
        if let PlaceholderKind::Token(token) = &placeholder.kind {
            match values.get(token) {
                Some(value) => output.push_str(&escape(value)),
                None => warn!("unknown template token {} in '{}', rendering empty", token, part),
            }
        }
        pos = placeholder.range.end;
    }
    output.push_str(&canonical[pos..]);

    (output, placeholders.len())
}

/// 整形式XMLかどうかを検証
///
/// 開始タグと終了タグの対応、およびペイロード末尾で閉じていない要素がないことを確認します。
fn verify_xml(text: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(text);
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(e)) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    )
                })?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                ))
            }
        }
    }

    if depth != 0 {
        return Err(format!("{} element(s) left unclosed", depth));
    }
    Ok(())
}
