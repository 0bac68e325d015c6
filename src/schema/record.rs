//! Field Record
//!
//! 正規フィールドから型付き値への不変マッピング。

use serde::Serialize;
use std::collections::BTreeMap;

use super::{Field, FieldKind};
use crate::error::ReportError;

/// フィールドの値
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 文字列値（Text / Date）
    Text(String),
    /// 数値（Count / Currency / Percent）
    Number(f64),
    /// `%`付きの文字列から読み取ったパーセント値（Percent専用）
    ///
    /// `"102.5%"`は`102.5`として保持し、表示時に端数とみなして100倍しません。
    PercentPoints(f64),
}

impl FieldValue {
    /// 型に応じたデフォルト値（空文字列またはゼロ）
    pub fn default_for(kind: FieldKind) -> Self {
        if kind.is_numeric() {
            FieldValue::Number(0.0)
        } else {
            FieldValue::Text(String::new())
        }
    }

    /// 指定された型と互換性があるか
    pub fn fits(&self, kind: FieldKind) -> bool {
        match self {
            FieldValue::Text(_) => !kind.is_numeric(),
            FieldValue::Number(_) => kind.is_numeric(),
            FieldValue::PercentPoints(_) => kind == FieldKind::Percent,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) | FieldValue::PercentPoints(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) | FieldValue::PercentPoints(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

/// 抽出済みフィールドレコード
///
/// すべての正規フィールドが常にちょうど1つの値（またはデフォルト値）を持ちます。
/// 値の変更は`with()`で新しいレコードを生成して行います。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldRecord {
    values: BTreeMap<Field, FieldValue>,
}

impl Default for FieldRecord {
    fn default() -> Self {
        let values = Field::ALL
            .iter()
            .map(|field| (*field, FieldValue::default_for(field.kind())))
            .collect();
        Self { values }
    }
}

impl FieldRecord {
    /// フィールドの値を差し替えた新しいレコードを返す
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::Config` - 値の型がフィールドの型と一致しない場合
    pub fn with(mut self, field: Field, value: FieldValue) -> Result<Self, ReportError> {
        if !value.fits(field.kind()) {
            return Err(ReportError::Config(format!(
                "Value {:?} does not fit field {} ({:?})",
                value,
                field,
                field.kind()
            )));
        }
        self.values.insert(field, value);
        Ok(self)
    }

    /// 抽出済みの値からレコードを構築（型は抽出時に保証済み）
    pub(crate) fn from_extracted(found: impl IntoIterator<Item = (Field, FieldValue)>) -> Self {
        let mut record = Self::default();
        for (field, value) in found {
            debug_assert!(value.fits(field.kind()));
            record.values.insert(field, value);
        }
        record
    }

    /// フィールドの値を取得
    pub fn get(&self, field: Field) -> &FieldValue {
        // Default/with/from_extracted always populate every field
        &self.values[&field]
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn number(&self, field: Field) -> Option<f64> {
        self.get(field).as_number()
    }

    /// 宣言順に全フィールドを走査
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    /// 値がデフォルト値のままかどうか
    pub fn is_default(&self, field: Field) -> bool {
        *self.get(field) == FieldValue::default_for(field.kind())
    }
}
