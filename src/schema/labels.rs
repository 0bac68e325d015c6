//! Field Label Table
//!
//! 正規フィールドごとに、管理ソフトのエクスポートで使われるラベルの揺れを
//! 列挙した静的テーブル。入力セルをフィールドへ対応付ける用途にのみ使用します。

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use super::Field;
use crate::error::ReportError;
use crate::matcher::label_key;

/// 1フィールド分のラベル候補
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    field: Field,
    /// 人間が読めるラベル（優先順）
    variants: Vec<String>,
    /// `variants`と同順のコンパクトキー
    keys: Vec<String>,
}

impl LabelEntry {
    pub fn field(&self) -> Field {
        self.field
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// (ラベル, コンパクトキー) を優先順に返す
    pub(crate) fn keyed_variants(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variants
            .iter()
            .zip(self.keys.iter())
            .map(|(v, k)| (v.as_str(), k.as_str()))
    }
}

/// ラベルテーブル
///
/// エントリの順序がスキーマ宣言順のタイブレークになります。
/// 各フィールドの候補には正規トークン自身が必ず含まれます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

static STANDARD_TABLE: OnceLock<Arc<LabelTable>> = OnceLock::new();

impl LabelTable {
    /// 組み込みの標準テーブル（プロセス内で一度だけ構築）
    pub fn standard() -> Arc<LabelTable> {
        STANDARD_TABLE
            .get_or_init(|| {
                let entries = Field::ALL
                    .iter()
                    .map(|field| LabelEntry::build(*field, standard_variants(*field)))
                    .collect();
                Arc::new(LabelTable { entries })
            })
            .clone()
    }

    /// 任意のラベル候補からテーブルを構築
    ///
    /// エントリはスキーマ宣言順に並べ替えられます。テーブルにないフィールドは
    /// 照合されず、抽出時はデフォルト値のままになります。
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::Config` - 同じフィールドが複数回指定された場合、
    ///   またはラベルが区切り文字だけで構成されている場合
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ReportError>
    where
        I: IntoIterator<Item = (Field, Vec<S>)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut built = Vec::new();

        for (field, variants) in entries {
            if !seen.insert(field) {
                return Err(ReportError::Config(format!(
                    "Field {} appears more than once in the label table",
                    field
                )));
            }

            let variants: Vec<String> = variants.into_iter().map(Into::into).collect();
            if let Some(bad) = variants.iter().find(|v| label_key(v).is_empty()) {
                return Err(ReportError::Config(format!(
                    "Label '{}' for field {} has no matchable characters",
                    bad, field
                )));
            }

            built.push(LabelEntry::build(field, variants));
        }

        built.sort_by_key(|entry| entry.field.ordinal());
        Ok(Self { entries: built })
    }

    /// エントリをスキーマ宣言順に取得
    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    /// フィールドのラベル候補
    pub fn variants(&self, field: Field) -> &[String] {
        self.entries
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.variants.as_slice())
            .unwrap_or(&[])
    }
}

impl LabelEntry {
    fn build<S: Into<String>>(field: Field, variants: Vec<S>) -> Self {
        let mut entry = LabelEntry {
            field,
            variants: Vec::new(),
            keys: Vec::new(),
        };

        let canonical = field.token().to_ascii_lowercase();
        for variant in variants
            .into_iter()
            .map(Into::into)
            .chain(std::iter::once(canonical))
        {
            let key = label_key(&variant);
            if key.is_empty() || entry.keys.contains(&key) {
                continue;
            }
            entry.variants.push(variant);
            entry.keys.push(key);
        }

        entry
    }
}

fn standard_variants(field: Field) -> Vec<&'static str> {
    match field {
        Field::FacilityName => vec![
            "facility name",
            "site name",
            "location name",
            "store name",
            "property name",
        ],
        Field::FacilityAddress => vec![
            "facility address",
            "site address",
            "property address",
            "street address",
            "address",
        ],
        Field::ReportDate => vec![
            "report date",
            "as of date",
            "run date",
            "period ending",
            "as of",
            "date",
        ],
        Field::TotalUnits => vec![
            "total units",
            "total # of units",
            "total rentable units",
            "unit count",
            "units total",
        ],
        Field::OccupiedUnits => vec![
            "occupied units",
            "total occupied units",
            "units occupied",
            "rented units",
        ],
        Field::VacantUnits => vec![
            "vacant units",
            "units vacant",
            "available units",
            "unrented units",
        ],
        Field::UnitOccupancy => vec![
            "unit occupancy %",
            "unit occupancy",
            "physical occupancy %",
            "physical occupancy",
            "occupancy %",
            "occupancy",
        ],
        Field::AreaOccupancy => vec![
            "area occupancy %",
            "area occupancy",
            "sq ft occupancy %",
            "sq ft occupancy",
            "square foot occupancy",
            "rentable area occupancy",
        ],
        Field::EconomicOccupancy => vec![
            "economic occupancy %",
            "economic occupancy",
            "econ occupancy",
            "financial occupancy",
        ],
        Field::MoveInsMtd => vec![
            "move-ins mtd",
            "move ins month to date",
            "rentals mtd",
            "move-ins",
        ],
        Field::MoveOutsMtd => vec![
            "move-outs mtd",
            "move outs month to date",
            "vacates mtd",
            "move-outs",
        ],
        Field::NetMoveIns => vec![
            "net move-ins",
            "net move-ins mtd",
            "net rentals",
            "net activity",
        ],
        Field::GrossPotential => vec![
            "gross potential rent",
            "gross potential income",
            "gross potential",
            "potential rent",
        ],
        Field::ActualOccupiedRent => vec![
            "actual occupied rent",
            "occupied rent",
            "actual rent",
            "rent roll",
        ],
        Field::TotalReceipts => vec![
            "total receipts",
            "total collections",
            "total deposits",
            "receipts mtd",
        ],
        Field::InsurancePenetration => vec![
            "insurance penetration %",
            "insurance penetration",
            "tenant protection %",
            "protection plan %",
            "insurance %",
        ],
        Field::DelinquentPercent30 => vec![
            "delinquent % 0-30",
            "delinquent percent 0-30",
            "delinquency % 0-30",
            "0-30 days delinquent %",
            "0-30 days %",
        ],
        Field::DelinquentUnits30 => vec![
            "delinquent units 0-30",
            "units delinquent 0-30",
            "0-30 days delinquent units",
            "0-30 days units",
        ],
        Field::DelinquentDollars30 => vec![
            "delinquent $ 0-30",
            "delinquent dollars 0-30",
            "delinquent amount 0-30",
            "0-30 days delinquent $",
            "0-30 days amount",
            "0-30 days $",
        ],
        Field::DelinquentPercent60 => vec![
            "delinquent % 31-60",
            "delinquent percent 31-60",
            "delinquency % 31-60",
            "31-60 days delinquent %",
            "31-60 days %",
        ],
        Field::DelinquentUnits60 => vec![
            "delinquent units 31-60",
            "units delinquent 31-60",
            "31-60 days delinquent units",
            "31-60 days units",
        ],
        Field::DelinquentDollars60 => vec![
            "delinquent $ 31-60",
            "delinquent dollars 31-60",
            "delinquent amount 31-60",
            "31-60 days delinquent $",
            "31-60 days amount",
            "31-60 days $",
        ],
        Field::DelinquentPercent61 => vec![
            "delinquent % 61+",
            "delinquent percent 61+",
            "delinquency % 61+",
            "61+ days delinquent %",
            "61+ days %",
            "over 60 days %",
        ],
        Field::DelinquentUnits61 => vec![
            "delinquent units 61+",
            "units delinquent 61+",
            "61+ days delinquent units",
            "61+ days units",
            "over 60 days units",
        ],
        Field::DelinquentDollars61 => vec![
            "delinquent $ 61+",
            "delinquent dollars 61+",
            "delinquent amount 61+",
            "61+ days delinquent $",
            "61+ days amount",
            "61+ days $",
            "over 60 days $",
        ],
    }
}
