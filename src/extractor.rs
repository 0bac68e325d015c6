//! Field Extractor Module
//!
//! パース済みワークブックを走査し、ラベルセルと値セルの組から
//! 型付きの`FieldRecord`を構築するモジュール。

use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::api::Adjacency;
use crate::builder::EngineConfig;
use crate::formatter::{parse_number, ValueFormatter};
use crate::matcher::LabelMatcher;
use crate::schema::{Field, FieldRecord, FieldValue};
use crate::types::{CellCoord, CellValue, Sheet, Workbook};

/// 1トークン分の出所
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenProvenance {
    /// 値を取得したシート名
    pub sheet: String,
    /// ラベルセルと値セルの参照（A1形式、重複なし）
    pub cells: Vec<String>,
}

/// トークンごとの出所の記録
///
/// 監査表示専用であり、描画には使用されません。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Provenance {
    entries: BTreeMap<Field, TokenProvenance>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// 出所を記録（同じフィールドの既存の記録は置き換えられる）
    pub fn insert(&mut self, field: Field, provenance: TokenProvenance) {
        self.entries.insert(field, provenance);
    }

    pub fn get(&self, field: Field) -> Option<&TokenProvenance> {
        self.entries.get(&field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 宣言順に走査
    pub fn iter(&self) -> impl Iterator<Item = (Field, &TokenProvenance)> {
        self.entries.iter().map(|(field, p)| (*field, p))
    }
}

/// どのフィールドにも一致しなかったラベル候補
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedLabel {
    pub sheet: String,
    /// A1形式のセル参照
    pub cell: String,
    pub text: String,
}

/// 抽出結果
///
/// カバレッジ不足（`missing_fields`、`unmatched_labels`）はエラーではなく
/// データとして返されます。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    /// すべてのフィールドが値（またはデフォルト値）を持つレコード
    pub record: FieldRecord,
    /// 要求されたトークンのうち、見つかったものの出所
    pub provenance: Provenance,
    /// ラベルが見つからずデフォルト値のままのフィールド（宣言順）
    pub missing_fields: Vec<Field>,
    /// ラベルらしいがどのフィールドにも一致しなかったセル
    pub unmatched_labels: Vec<UnmatchedLabel>,
}

/// フィールド抽出器
pub(crate) struct FieldExtractor<'a> {
    config: &'a EngineConfig,
    matcher: LabelMatcher<'a>,
    formatter: ValueFormatter<'a>,
}

/// ラベルに対応する値の候補
struct ValueCandidate {
    value: CellValue,
    coord: CellCoord,
    adjacency: Adjacency,
}

/// 走査中の状態
#[derive(Default)]
struct ScanState {
    found: BTreeMap<Field, FieldValue>,
    provenance: Provenance,
    /// 値として消費済みのセル（シート番号, 座標）
    consumed: HashSet<(usize, CellCoord)>,
    unmatched: Vec<UnmatchedLabel>,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            matcher: LabelMatcher::new(&config.label_table, config.min_similarity),
            formatter: ValueFormatter::new(&config.date_format),
        }
    }

    /// ワークブック全体からフィールドを抽出
    ///
    /// シート順・行優先順に走査し、フィールドごとに最初の一致を採用します。
    /// `tokens`に含まれるフィールドについてのみ出所を記録します。
    pub fn extract(&self, workbook: &Workbook, tokens: &[Field]) -> Extraction {
        let mut state = ScanState::default();

        for (sheet_index, sheet) in workbook.sheets().iter().enumerate() {
            for (coord, cell) in sheet.cells() {
                if state.consumed.contains(&(sheet_index, coord)) {
                    continue;
                }
                let CellValue::String(text) = cell else {
                    continue;
                };
                if !looks_like_label(text) {
                    continue;
                }
                self.visit_label(sheet_index, sheet, coord, text, tokens, &mut state);
            }
        }

        let missing_fields: Vec<Field> = Field::ALL
            .iter()
            .copied()
            .filter(|field| !state.found.contains_key(field))
            .collect();
        if !missing_fields.is_empty() {
            let names: Vec<&str> = missing_fields.iter().map(|f| f.token()).collect();
            warn!(
                "{} field(s) not found, using defaults: {}",
                missing_fields.len(),
                names.join(", ")
            );
        }

        Extraction {
            record: FieldRecord::from_extracted(state.found),
            provenance: state.provenance,
            missing_fields,
            unmatched_labels: state.unmatched,
        }
    }

    fn visit_label(
        &self,
        sheet_index: usize,
        sheet: &Sheet,
        coord: CellCoord,
        text: &str,
        tokens: &[Field],
        state: &mut ScanState,
    ) {
        let (label, inline_value) = split_inline(text);

        let Some(matched) = self.matcher.match_label(label) else {
            // 隣に値がないセルは見出しや注記として扱う
            if self.has_value_neighbour(sheet, coord) {
                warn!(
                    "unmatched label '{}' at {}!{}",
                    label.trim(),
                    sheet.name(),
                    coord.to_a1_notation()
                );
                state.unmatched.push(UnmatchedLabel {
                    sheet: sheet.name().to_string(),
                    cell: coord.to_a1_notation(),
                    text: text.trim().to_string(),
                });
            }
            return;
        };

        let field = matched.field;
        if state.found.contains_key(&field) {
            debug!(
                "ignoring later label '{}' at {}!{} for {}",
                label.trim(),
                sheet.name(),
                coord.to_a1_notation(),
                field
            );
            return;
        }

        for adjacency in &self.config.adjacency {
            let Some(candidate) = self.find_value(sheet, coord, *adjacency, inline_value) else {
                continue;
            };

            let Some(value) = self.formatter.coerce(field.kind(), &candidate.value) else {
                debug!(
                    "{} at {}!{}: {:?} value at {} is not a {:?}",
                    field,
                    sheet.name(),
                    coord.to_a1_notation(),
                    candidate.adjacency,
                    candidate.coord.to_a1_notation(),
                    field.kind()
                );
                continue;
            };

            debug!(
                "{} <- '{}' ({}!{}, {:?}, score {:.2})",
                field,
                label.trim(),
                sheet.name(),
                candidate.coord.to_a1_notation(),
                candidate.adjacency,
                matched.score
            );

            if tokens.contains(&field) {
                let mut cells = vec![coord.to_a1_notation()];
                if candidate.coord != coord {
                    cells.push(candidate.coord.to_a1_notation());
                }
                state.provenance.insert(
                    field,
                    TokenProvenance {
                        sheet: sheet.name().to_string(),
                        cells,
                    },
                );
            }
            state.consumed.insert((sheet_index, candidate.coord));
            state.found.insert(field, value);
            return;
        }

        debug!(
            "{} matched at {}!{} but no usable value was found",
            field,
            sheet.name(),
            coord.to_a1_notation()
        );
    }

    /// 指定方向の値候補を探す
    ///
    /// `Right`/`Below`は空セルを`value_search_span`個まで読み飛ばし、
    /// 最初の空でないセルで判定します。そのセル自体がラベルなら候補なしとします。
    fn find_value(
        &self,
        sheet: &Sheet,
        coord: CellCoord,
        adjacency: Adjacency,
        inline_value: Option<&str>,
    ) -> Option<ValueCandidate> {
        let step: fn(&CellCoord, u32) -> Option<CellCoord> = match adjacency {
            Adjacency::Inline => {
                return inline_value.map(|value| ValueCandidate {
                    value: CellValue::String(value.to_string()),
                    coord,
                    adjacency,
                });
            }
            Adjacency::Right => CellCoord::right,
            Adjacency::Below => CellCoord::below,
        };

        for distance in 1..=self.config.value_search_span {
            let next = step(&coord, distance)?;
            let value = sheet.get(next)?;
            if value.is_empty() {
                continue;
            }
            if let CellValue::String(text) = value {
                if looks_like_label(text) && self.matcher.match_label(text).is_some() {
                    return None;
                }
            }
            return Some(ValueCandidate {
                value: value.clone(),
                coord: next,
                adjacency,
            });
        }
        None
    }

    fn has_value_neighbour(&self, sheet: &Sheet, coord: CellCoord) -> bool {
        [coord.right(1), coord.below(1)]
            .into_iter()
            .flatten()
            .filter_map(|next| sheet.get(next))
            .any(|value| !value.is_empty())
    }
}

/// ラベルらしいセルかどうか
///
/// 空でなく、数値として解釈できず、英字を含むテキストをラベル候補とします。
pub(crate) fn looks_like_label(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && parse_number(trimmed).is_none()
        && trimmed.chars().any(char::is_alphabetic)
}

/// `"ラベル: 値"`形式のセルを分割
///
/// コロンの後ろが空の場合（`"Total Units:"`）は値なしとして扱います。
fn split_inline(text: &str) -> (&str, Option<&str>) {
    match text.split_once(':') {
        Some((label, value)) if !value.trim().is_empty() => (label, Some(value.trim())),
        Some((label, _)) => (label, None),
        None => (text, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::display_value;
    use crate::schema::DELINQUENCY_TOKENS;

    fn s(text: &str) -> CellValue {
        CellValue::from(text)
    }

    fn n(value: f64) -> CellValue {
        CellValue::Number(value)
    }

    fn extract(sheets: Vec<Sheet>) -> Extraction {
        let config = EngineConfig::default();
        FieldExtractor::new(&config).extract(&Workbook::new(sheets), &DELINQUENCY_TOKENS)
    }

    #[test]
    fn test_looks_like_label() {
        assert!(looks_like_label("Total Units"));
        assert!(looks_like_label("61+ Days $"));
        assert!(!looks_like_label("412"));
        assert!(!looks_like_label("$12,345.00"));
        assert!(!looks_like_label("87.3%"));
        assert!(!looks_like_label("   "));
        assert!(!looks_like_label("---"));
    }

    #[test]
    fn test_split_inline() {
        assert_eq!(
            split_inline("Report Date: 10/15/2026"),
            ("Report Date", Some("10/15/2026"))
        );
        assert_eq!(split_inline("Total Units:"), ("Total Units", None));
        assert_eq!(split_inline("Total Units"), ("Total Units", None));
    }

    #[test]
    fn test_no_labels_yields_default_record() {
        let extraction = extract(vec![Sheet::new(
            "Sheet1",
            vec![vec![n(1.0), n(2.0)], vec![s("lorem"), CellValue::Empty]],
        )]);

        assert_eq!(extraction.record, FieldRecord::default());
        assert_eq!(extraction.missing_fields, Field::ALL.to_vec());
        assert!(extraction.provenance.is_empty());
    }

    #[test]
    fn test_empty_workbook_yields_default_record() {
        let extraction = extract(Vec::new());
        assert_eq!(extraction.record, FieldRecord::default());
        assert!(extraction.unmatched_labels.is_empty());
    }

    #[test]
    fn test_right_adjacency() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![
                vec![s("Facility Name"), s("Eastside Storage")],
                vec![s("Total Units"), n(412.0)],
                vec![s("Gross Potential Rent"), s("$12,345.00")],
            ],
        )]);

        let record = &extraction.record;
        assert_eq!(record.text(Field::FacilityName), Some("Eastside Storage"));
        assert_eq!(record.number(Field::TotalUnits), Some(412.0));
        assert_eq!(record.number(Field::GrossPotential), Some(12345.0));
        assert!(!extraction.missing_fields.contains(&Field::TotalUnits));
    }

    #[test]
    fn test_below_adjacency_for_header_rows() {
        let extraction = extract(vec![Sheet::new(
            "Occupancy",
            vec![
                vec![s("Total Units"), s("Occupied Units"), s("Vacant Units")],
                vec![n(412.0), n(360.0), n(52.0)],
            ],
        )]);

        let record = &extraction.record;
        assert_eq!(record.number(Field::TotalUnits), Some(412.0));
        assert_eq!(record.number(Field::OccupiedUnits), Some(360.0));
        assert_eq!(record.number(Field::VacantUnits), Some(52.0));
    }

    #[test]
    fn test_text_header_row_does_not_read_neighbour_label() {
        let extraction = extract(vec![Sheet::new(
            "Site",
            vec![
                vec![s("Facility Name"), s("Facility Address")],
                vec![s("Eastside Storage"), s("12 Main St")],
            ],
        )]);

        let record = &extraction.record;
        assert_eq!(record.text(Field::FacilityName), Some("Eastside Storage"));
        assert_eq!(record.text(Field::FacilityAddress), Some("12 Main St"));
    }

    #[test]
    fn test_inline_value() {
        let extraction = extract(vec![Sheet::new(
            "Header",
            vec![vec![s("Report Date: 10/15/2026")], vec![s("Total Units: 1,204")]],
        )]);

        let record = &extraction.record;
        assert_eq!(record.text(Field::ReportDate), Some("10/15/2026"));
        assert_eq!(record.number(Field::TotalUnits), Some(1204.0));
    }

    #[test]
    fn test_skips_empty_cells_within_span() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![vec![s("Total Units"), CellValue::Empty, s("  "), n(412.0)]],
        )]);
        assert_eq!(extraction.record.number(Field::TotalUnits), Some(412.0));
    }

    #[test]
    fn test_value_beyond_span_is_not_used() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![vec![
                s("Total Units"),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                n(412.0),
            ]],
        )]);
        assert_eq!(extraction.record.number(Field::TotalUnits), Some(0.0));
        assert!(extraction.missing_fields.contains(&Field::TotalUnits));
    }

    #[test]
    fn test_adjacency_order_is_configurable() {
        let sheet = Sheet::new(
            "Summary",
            vec![vec![s("Total Units"), n(1.0)], vec![n(2.0), CellValue::Empty]],
        );
        let workbook = Workbook::new(vec![sheet]);

        let config = EngineConfig {
            adjacency: vec![Adjacency::Below, Adjacency::Right],
            ..Default::default()
        };
        let extraction = FieldExtractor::new(&config).extract(&workbook, &[]);
        assert_eq!(extraction.record.number(Field::TotalUnits), Some(2.0));
    }

    #[test]
    fn test_first_match_wins_across_sheets() {
        let extraction = extract(vec![
            Sheet::new("First", vec![vec![s("Total Units"), n(100.0)]]),
            Sheet::new("Second", vec![vec![s("Total Units"), n(200.0)]]),
        ]);
        assert_eq!(extraction.record.number(Field::TotalUnits), Some(100.0));
    }

    #[test]
    fn test_percent_stored_raw() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![
                vec![s("Unit Occupancy %"), n(0.873)],
                vec![s("Economic Occupancy"), n(91.2)],
            ],
        )]);
        assert_eq!(extraction.record.number(Field::UnitOccupancy), Some(0.873));
        assert_eq!(extraction.record.number(Field::EconomicOccupancy), Some(91.2));
    }

    #[test]
    fn test_percent_text_above_hundred_keeps_scale() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![
                vec![s("Economic Occupancy"), s("102.5%")],
                vec![s("Unit Occupancy %"), s("0.5%")],
            ],
        )]);
        let record = &extraction.record;
        assert_eq!(
            display_value(Field::EconomicOccupancy, record.get(Field::EconomicOccupancy)),
            "102.5%"
        );
        assert_eq!(
            display_value(Field::UnitOccupancy, record.get(Field::UnitOccupancy)),
            "0.5%"
        );
    }

    #[test]
    fn test_uncoercible_value_keeps_default() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![vec![s("Total Receipts"), CellValue::Error("#REF!".to_string())]],
        )]);
        assert_eq!(extraction.record.number(Field::TotalReceipts), Some(0.0));
        assert!(extraction.missing_fields.contains(&Field::TotalReceipts));
    }

    #[test]
    fn test_provenance_for_requested_tokens() {
        let sheet = Sheet::with_origin(
            "Aging",
            CellCoord::new(4, 1),
            vec![
                vec![s("Delinquent % 0-30"), n(0.042)],
                vec![s("Delinquent Units 0-30"), n(17.0)],
                vec![s("Total Units"), n(412.0)],
            ],
        );
        let extraction = extract(vec![sheet]);

        let per30 = extraction.provenance.get(Field::DelinquentPercent30).unwrap();
        assert_eq!(per30.sheet, "Aging");
        assert_eq!(per30.cells, vec!["B5".to_string(), "C5".to_string()]);

        let unit30 = extraction.provenance.get(Field::DelinquentUnits30).unwrap();
        assert_eq!(unit30.cells, vec!["B6".to_string(), "C6".to_string()]);

        // TOTALUNITSは要求されていない
        assert!(extraction.provenance.get(Field::TotalUnits).is_none());
        assert_eq!(extraction.provenance.len(), 2);
    }

    #[test]
    fn test_inline_provenance_has_single_cell() {
        let extraction = extract(vec![Sheet::new(
            "Aging",
            vec![vec![s("61+ Days $: $1,250.50")]],
        )]);
        let dol61 = extraction.provenance.get(Field::DelinquentDollars61).unwrap();
        assert_eq!(dol61.cells, vec!["A1".to_string()]);
        assert_eq!(extraction.record.number(Field::DelinquentDollars61), Some(1250.5));
    }

    #[test]
    fn test_unmatched_labels_reported() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![
                vec![s("Parking Spaces"), n(12.0)],
                vec![s("Notes"), CellValue::Empty],
            ],
        )]);

        assert_eq!(
            extraction.unmatched_labels,
            vec![UnmatchedLabel {
                sheet: "Summary".to_string(),
                cell: "A1".to_string(),
                text: "Parking Spaces".to_string(),
            }]
        );
    }

    #[test]
    fn test_consumed_value_is_not_a_label() {
        let extraction = extract(vec![Sheet::new(
            "Summary",
            vec![
                vec![s("Facility Name"), s("Occupancy Partners LLC")],
                vec![s("Unit Occupancy %"), n(0.9)],
            ],
        )]);
        assert_eq!(
            extraction.record.text(Field::FacilityName),
            Some("Occupancy Partners LLC")
        );
        assert_eq!(extraction.record.number(Field::UnitOccupancy), Some(0.9));
        assert!(extraction.unmatched_labels.is_empty());
    }
}
