//! Parser Module
//!
//! calamineを使用したスプレッドシートのデコード処理。

mod workbook;

pub(crate) use workbook::WorkbookParser;
