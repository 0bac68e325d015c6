//! Token Normalizer Module
//!
//! テンプレート内のプレースホルダー本体を正規トークンへ変換するモジュール。
//! 文章生成ツールがプレースホルダー内部に挿入したマークアップ・文字参照・
//! 不可視文字を取り除き、スキーマのキーと同じ名前空間で比較できるようにします。
//!
//! 正規化は独立したパスの順序付きパイプラインとして実装されています。
//!
//! 1. 不可視文字の除去（`strip_invisible`）
//! 2. マークアップタグの除去（`strip_markup`）
//! 3. 文字参照の除去（`strip_entities`）
//! 4. 空白の圧縮（`collapse_whitespace`）
//! 5. 英数字とアンダースコア以外の除去（`retain_token_chars`）
//! 6. 大文字化

use regex::Regex;
use std::sync::OnceLock;

/// プレースホルダー本体を正規トークンへ変換
///
/// 冪等であり、正規化済みのトークンを再度正規化しても変化しません。
///
/// # 戻り値
///
/// * `Some(String)` - 正規化されたトークン（`[A-Z0-9_]+`）
/// * `None` - 正規化の結果が空文字列になった場合
///
/// # 例
///
/// ```rust
/// use storagereport::normalize_token;
///
/// assert_eq!(normalize_token(" delin\u{200B}Per30 ").as_deref(), Some("DELINPER30"));
/// assert_eq!(
///     normalize_token("DELIN</a:t></a:r><a:r><a:t>PER30").as_deref(),
///     Some("DELINPER30")
/// );
/// assert_eq!(normalize_token("&nbsp;<a:br/>"), None);
/// ```
pub fn normalize_token(raw: &str) -> Option<String> {
    let text = strip_invisible(raw);
    let text = strip_markup(&text);
    let text = strip_entities(&text);
    let text = collapse_whitespace(&text);
    let text = retain_token_chars(&text);

    if text.is_empty() {
        None
    } else {
        Some(text.to_ascii_uppercase())
    }
}

/// ゼロ幅文字・方向制御文字・ソフトハイフンなど、表示されない文字を除去
pub fn strip_invisible(text: &str) -> String {
    text.chars().filter(|c| !is_invisible(*c)).collect()
}

/// `<...>`形式のタグを除去
///
/// プレースホルダーがテキストランの境界で分割された場合に挿入される
/// 閉じタグ・開きタグ・空要素タグを取り除きます。
pub fn strip_markup(text: &str) -> String {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let re = TAG_RE.get_or_init(|| Regex::new(r"<[^<>]*>").expect("valid tag regex"));
    re.replace_all(text, "").into_owned()
}

/// 名前付き・数値文字参照（`&amp;`、`&#8203;`、`&#x200B;`）を除去
pub fn strip_entities(text: &str) -> String {
    static ENTITY_RE: OnceLock<Regex> = OnceLock::new();
    let re = ENTITY_RE.get_or_init(|| {
        Regex::new(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);")
            .expect("valid entity regex")
    });
    re.replace_all(text, "").into_owned()
}

/// 連続する空白を1つの空白に圧縮し、前後の空白を除去
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    let re = WS_RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"));
    re.replace_all(text.trim(), " ").into_owned()
}

/// ASCII英数字とアンダースコア以外の文字を除去
pub fn retain_token_chars(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{061C}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
    )
}
