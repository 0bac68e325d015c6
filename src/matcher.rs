//! Label Matcher Module
//!
//! スプレッドシートのラベル文字列を正規フィールドへ対応付けるモジュール。
//! 大文字小文字・空白・句読点の揺れを吸収し、ハイフンと空白は同一視します。

use log::debug;

use crate::schema::{Field, LabelTable};

/// ラベルのコンパクトキーを生成
///
/// 英数字は小文字化して残し、意味を持つ記号は単語に置き換え、
/// それ以外の文字（空白・ハイフン・句読点・不可視文字）はすべて取り除きます。
/// そのため `"Move-Ins MTD"`、`"moveins mtd"`、`"move ins mtd"` は同じキーになります。
///
/// # 例
///
/// ```rust
/// use storagereport::label_key;
///
/// assert_eq!(label_key("Move-Ins MTD:"), "moveinsmtd");
/// assert_eq!(label_key("Delinquent $ 61+"), "delinquentdollars61plus");
/// assert_eq!(label_key("Unit Occupancy %"), "unitoccupancypct");
/// ```
pub fn label_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => key.push_str("pct"),
            '$' => key.push_str("dollars"),
            '#' => key.push_str("num"),
            '+' => key.push_str("plus"),
            '&' => key.push_str("and"),
            c if c.is_alphanumeric() => key.extend(c.to_lowercase()),
            _ => {}
        }
    }
    key
}

/// 照合結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelMatch<'a> {
    /// 対応付けられたフィールド
    pub field: Field,
    /// 一致したラベル候補
    pub variant: &'a str,
    /// 類似度（完全一致は1.0、部分一致は候補キー長 / ラベルキー長）
    pub score: f64,
    /// 完全一致かどうか
    pub exact: bool,
    variant_len: usize,
}

impl LabelMatch<'_> {
    /// 完全一致が部分一致に優先し、次に長い候補が優先する。
    /// 同点の場合は先に見つかった方（スキーマ宣言順）を残す。
    fn beats(&self, other: &LabelMatch<'_>) -> bool {
        (self.exact, self.variant_len) > (other.exact, other.variant_len)
    }
}

/// ラベル照合器
///
/// 状態を持たず、同じ入力に対して常に同じ結果を返します。
#[derive(Debug, Clone)]
pub struct LabelMatcher<'a> {
    table: &'a LabelTable,
    min_similarity: f64,
}

impl<'a> LabelMatcher<'a> {
    /// 類似度の下限を指定して照合器を生成
    pub fn new(table: &'a LabelTable, min_similarity: f64) -> Self {
        Self {
            table,
            min_similarity,
        }
    }

    /// 最も適合するフィールドを返す
    ///
    /// # 戻り値
    ///
    /// * `Some(LabelMatch)` - 類似度の下限以上で一致した場合
    /// * `None` - 一致なし（推測による一致は行わない）
    pub fn match_label(&self, raw: &str) -> Option<LabelMatch<'a>> {
        let key = label_key(raw);
        if key.is_empty() {
            return None;
        }
        let key_len = key.chars().count();

        let mut best: Option<LabelMatch<'a>> = None;
        for entry in self.table.entries() {
            for (variant, variant_key) in entry.keyed_variants() {
                let exact = variant_key == key;
                if !exact && !key.contains(variant_key) {
                    continue;
                }

                let variant_len = variant_key.chars().count();
                let candidate = LabelMatch {
                    field: entry.field(),
                    variant,
                    score: if exact {
                        1.0
                    } else {
                        variant_len as f64 / key_len as f64
                    },
                    exact,
                    variant_len,
                };

                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(m) if m.score >= self.min_similarity => Some(m),
            Some(m) => {
                debug!(
                    "label '{}' best candidate {} ('{}') below threshold: {:.2} < {:.2}",
                    raw, m.field, m.variant, m.score, self.min_similarity
                );
                None
            }
            None => None,
        }
    }
}
