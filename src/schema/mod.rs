//! Schema Module
//!
//! オーナーレポートの正規フィールド（固定スキーマ）を定義するモジュール。
//! フィールドは閉じた列挙型として表現され、テンプレート上のトークン文字列との
//! 相互変換を明示的に提供します。

mod labels;
mod record;

pub use labels::{LabelEntry, LabelTable};
pub use record::{FieldRecord, FieldValue};

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;

/// フィールドの値の型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// 文字列（施設名、住所など）
    Text,
    /// 日付（文字列として保持）
    Date,
    /// 件数（ユニット数、入退去数）
    Count,
    /// 金額
    Currency,
    /// 割合（端数 `0.873` とパーセント `87.3` の両方を受け付ける）
    Percent,
}

impl FieldKind {
    /// 数値型かどうか
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Count | FieldKind::Currency | FieldKind::Percent)
    }
}

/// オーナーレポートの正規フィールド
///
/// 宣言順はスキーマの順序であり、ラベル照合のタイブレークに使用されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FacilityName,
    FacilityAddress,
    ReportDate,
    TotalUnits,
    OccupiedUnits,
    VacantUnits,
    UnitOccupancy,
    AreaOccupancy,
    EconomicOccupancy,
    MoveInsMtd,
    MoveOutsMtd,
    NetMoveIns,
    GrossPotential,
    ActualOccupiedRent,
    TotalReceipts,
    InsurancePenetration,
    DelinquentPercent30,
    DelinquentUnits30,
    DelinquentDollars30,
    DelinquentPercent60,
    DelinquentUnits60,
    DelinquentDollars60,
    DelinquentPercent61,
    DelinquentUnits61,
    DelinquentDollars61,
}

/// 延滞関連の必須トークン（監査・テンプレート検証で使用する順序）
pub const DELINQUENCY_TOKENS: [Field; 9] = [
    Field::DelinquentPercent30,
    Field::DelinquentUnits30,
    Field::DelinquentDollars30,
    Field::DelinquentPercent60,
    Field::DelinquentUnits60,
    Field::DelinquentDollars60,
    Field::DelinquentPercent61,
    Field::DelinquentUnits61,
    Field::DelinquentDollars61,
];

impl Field {
    /// すべてのフィールド（宣言順）
    pub const ALL: [Field; 25] = [
        Field::FacilityName,
        Field::FacilityAddress,
        Field::ReportDate,
        Field::TotalUnits,
        Field::OccupiedUnits,
        Field::VacantUnits,
        Field::UnitOccupancy,
        Field::AreaOccupancy,
        Field::EconomicOccupancy,
        Field::MoveInsMtd,
        Field::MoveOutsMtd,
        Field::NetMoveIns,
        Field::GrossPotential,
        Field::ActualOccupiedRent,
        Field::TotalReceipts,
        Field::InsurancePenetration,
        Field::DelinquentPercent30,
        Field::DelinquentUnits30,
        Field::DelinquentDollars30,
        Field::DelinquentPercent60,
        Field::DelinquentUnits60,
        Field::DelinquentDollars60,
        Field::DelinquentPercent61,
        Field::DelinquentUnits61,
        Field::DelinquentDollars61,
    ];

    /// テンプレート上のトークン表記（正規化済み）
    pub fn token(&self) -> &'static str {
        match self {
            Field::FacilityName => "FACILITYNAME",
            Field::FacilityAddress => "FACILITYADDRESS",
            Field::ReportDate => "REPORTDATE",
            Field::TotalUnits => "TOTALUNITS",
            Field::OccupiedUnits => "OCCUPIEDUNITS",
            Field::VacantUnits => "VACANTUNITS",
            Field::UnitOccupancy => "UNITOCCPER",
            Field::AreaOccupancy => "AREAOCCPER",
            Field::EconomicOccupancy => "ECONOCCPER",
            Field::MoveInsMtd => "MOVEINSMTD",
            Field::MoveOutsMtd => "MOVEOUTSMTD",
            Field::NetMoveIns => "NETMOVEINS",
            Field::GrossPotential => "GROSSPOTENTIAL",
            Field::ActualOccupiedRent => "ACTUALOCCRENT",
            Field::TotalReceipts => "TOTALRECEIPTS",
            Field::InsurancePenetration => "INSURANCEPER",
            Field::DelinquentPercent30 => "DELINPER30",
            Field::DelinquentUnits30 => "DELINUNIT30",
            Field::DelinquentDollars30 => "DELINDOL30",
            Field::DelinquentPercent60 => "DELINPER60",
            Field::DelinquentUnits60 => "DELINUNIT60",
            Field::DelinquentDollars60 => "DELINDOL60",
            Field::DelinquentPercent61 => "DELINPER61",
            Field::DelinquentUnits61 => "DELINUNIT61",
            Field::DelinquentDollars61 => "DELINDOL61",
        }
    }

    /// フィールドの値の型
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::FacilityName | Field::FacilityAddress => FieldKind::Text,
            Field::ReportDate => FieldKind::Date,
            Field::TotalUnits
            | Field::OccupiedUnits
            | Field::VacantUnits
            | Field::MoveInsMtd
            | Field::MoveOutsMtd
            | Field::NetMoveIns
            | Field::DelinquentUnits30
            | Field::DelinquentUnits60
            | Field::DelinquentUnits61 => FieldKind::Count,
            Field::GrossPotential
            | Field::ActualOccupiedRent
            | Field::TotalReceipts
            | Field::DelinquentDollars30
            | Field::DelinquentDollars60
            | Field::DelinquentDollars61 => FieldKind::Currency,
            Field::UnitOccupancy
            | Field::AreaOccupancy
            | Field::EconomicOccupancy
            | Field::InsurancePenetration
            | Field::DelinquentPercent30
            | Field::DelinquentPercent60
            | Field::DelinquentPercent61 => FieldKind::Percent,
        }
    }

    /// 正規化済みトークンからフィールドを取得
    pub fn from_token(token: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.token() == token)
    }

    /// 宣言順のインデックス
    pub(crate) fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Field {
    type Err = ReportError;

    /// 大文字小文字・区切り文字の揺れを吸収してトークンを解釈する
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::token::normalize_token(s)
            .and_then(|token| Field::from_token(&token))
            .ok_or_else(|| ReportError::Config(format!("Unknown field token: '{}'", s)))
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}
