//! Template Module
//!
//! テンプレートパッケージ（PPTX / DOCX）の読み込み、プレースホルダーの走査、
//! 値の差し込みと再パッケージングを提供するモジュール。

mod renderer;
mod scanner;

pub(crate) use renderer::render_package;
pub(crate) use scanner::scan_package;
pub use scanner::TemplateScan;

use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ReportError;
use crate::security::SecurityConfig;

/// パッケージ内の1エントリ
#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// テキストペイロード（UTF-8デコード済み）
#[derive(Debug, Clone)]
pub(crate) struct TextPart {
    pub name: String,
    pub text: String,
}

/// テンプレートパッケージ
///
/// エントリの順序と圧縮方式を保持したままメモリ上に展開します。
/// 置換対象外のエントリはバイト列のまま書き出されます。
#[derive(Debug, Clone)]
pub(crate) struct TemplatePackage {
    entries: Vec<PackageEntry>,
}

impl TemplatePackage {
    /// バイト列からパッケージを読み込む
    ///
    /// # 発生し得るエラー
    ///
    /// * `ReportError::SecurityViolation` - サイズ・エントリ数・パスの制限違反
    /// * `ReportError::Zip` - ZIPとして読み込めない場合
    pub fn from_bytes(bytes: &[u8], security: &SecurityConfig) -> Result<Self, ReportError> {
        security.check_input_size(bytes.len())?;

        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ReportError::Zip(format!("Failed to open template package: {}", e)))?;
        security.check_archive(&mut archive)?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| ReportError::Zip(format!("{}", e)))?;
            let name = file.name().to_string();
            let compression = file.compression();
            let is_dir = file.is_dir();

            // セントラルディレクトリの申告サイズを超えて展開しない
            let mut data = Vec::new();
            file.take(security.max_file_size + 1).read_to_end(&mut data)?;
            if data.len() as u64 > security.max_file_size {
                return Err(ReportError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size when decompressed (max: {} bytes)",
                    name, security.max_file_size
                )));
            }

            entries.push(PackageEntry {
                name,
                data,
                compression,
                is_dir,
            });
        }

        Ok(Self { entries })
    }

    /// プレースホルダーを含み得るテキストペイロードを取得
    pub fn text_parts(&self) -> Result<Vec<TextPart>, ReportError> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir && is_text_part(&entry.name))
            .map(|entry| {
                Ok(TextPart {
                    name: entry.name.clone(),
                    text: String::from_utf8(entry.data.clone())?,
                })
            })
            .collect()
    }

    /// エントリの内容を置き換える
    ///
    /// 該当するエントリがない場合は`false`を返します。
    pub fn replace(&mut self, name: &str, data: Vec<u8>) -> bool {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => {
                entry.data = data;
                true
            }
            None => false,
        }
    }

    /// パッケージをZIPバイト列として書き出す
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default().compression_method(method);

            if entry.is_dir {
                writer
                    .add_directory(entry.name.as_str(), options)
                    .map_err(|e| ReportError::Zip(format!("{}", e)))?;
                continue;
            }

            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| ReportError::Zip(format!("{}", e)))?;
            writer.write_all(&entry.data)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| ReportError::Zip(format!("{}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// 置換対象のXMLペイロードかどうか
///
/// スライド・レイアウト・マスター・ノート（PowerPoint）と、
/// 本文・ヘッダー・フッター（Word）が対象です。
pub(crate) fn is_text_part(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".xml") else {
        return false;
    };

    const SLIDE_DIRS: [&str; 4] = [
        "ppt/slides/",
        "ppt/slideLayouts/",
        "ppt/slideMasters/",
        "ppt/notesSlides/",
    ];
    if let Some(file) = SLIDE_DIRS.iter().find_map(|dir| stem.strip_prefix(dir)) {
        return !file.is_empty() && !file.contains('/');
    }

    match stem.strip_prefix("word/") {
        Some("document") => true,
        Some(file) => {
            !file.contains('/') && (file.starts_with("header") || file.starts_with("footer"))
        }
        None => false,
    }
}
