//! Types Module
//!
//! パース済みワークブックを表す共通データ型を定義するモジュール。
//! 外部のスプレッドシートデコーダーが生成し、フィールド抽出が消費します。

use serde::Serialize;

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// 日付・時刻（Excelシリアル値）
    DateTime(f64),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    ///
    /// 空白のみの文字列も空として扱います。
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// 同じ行の`n`列右の座標
    pub fn right(&self, n: u32) -> Option<Self> {
        self.col.checked_add(n).map(|col| Self::new(self.row, col))
    }

    /// 同じ列の`n`行下の座標
    pub fn below(&self, n: u32) -> Option<Self> {
        self.row.checked_add(n).map(|row| Self::new(row, self.col))
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// 名前付きの稠密なセルグリッド
///
/// `origin`はグリッド左上セルのシート上の絶対座標です。calamineは使用範囲
/// のみを返すため、A1から始まらないシートでも正しいセル参照を復元できます。
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    origin: CellCoord,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// A1を左上とするシートを生成
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self::with_origin(name, CellCoord::new(0, 0), rows)
    }

    /// 左上の絶対座標を指定してシートを生成
    pub fn with_origin(
        name: impl Into<String>,
        origin: CellCoord,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            rows,
        }
    }

    /// シート名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 左上セルの絶対座標
    pub fn origin(&self) -> CellCoord {
        self.origin
    }

    /// 絶対座標でセルを取得
    ///
    /// グリッド外の座標は`None`を返します。
    pub fn get(&self, coord: CellCoord) -> Option<&CellValue> {
        let row = coord.row.checked_sub(self.origin.row)? as usize;
        let col = coord.col.checked_sub(self.origin.col)? as usize;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// 行優先順にすべてのセルを走査
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, &CellValue)> + '_ {
        let origin = self.origin;
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.iter().enumerate().map(move |(c, value)| {
                (
                    CellCoord::new(origin.row + r as u32, origin.col + c as u32),
                    value,
                )
            })
        })
    }

    /// 空でないセルの数
    pub fn non_empty_count(&self) -> usize {
        self.cells().filter(|(_, v)| !v.is_empty()).count()
    }
}

/// パース済みワークブック（シートの順序付きリスト）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// シートのリストからワークブックを生成
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// シートを宣言順に取得
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}
