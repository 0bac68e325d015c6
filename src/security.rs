//! Security Module
//!
//! アップロードされたワークブックとテンプレートパッケージに対する
//! セキュリティ対策を実装するモジュール。
//! ZIP bomb攻撃、パストラバーサル攻撃、巨大入力への対策を提供します。

use std::io::{Read, Seek};
use zip::ZipArchive;

use crate::error::ReportError;

/// 入力サイズとZIP構造の制限
///
/// ワークブックの読み込みとテンプレートパッケージの読み込みで共有されます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SecurityConfig {
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 512MB
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一エントリの展開後の最大サイズ（バイト）
    /// デフォルト: 100MB
    pub max_file_size: u64,
    /// アップロードされたバイト列の最大サイズ
    /// デフォルト: 256MB
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 536_870_912, // 512MB
            max_file_count: 10_000,
            max_file_size: 104_857_600,       // 100MB
            max_input_file_size: 268_435_456, // 256MB
        }
    }
}

impl SecurityConfig {
    /// 入力バイト列のサイズ上限をチェック
    pub fn check_input_size(&self, len: usize) -> Result<(), ReportError> {
        if len as u64 > self.max_input_file_size {
            return Err(ReportError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                len, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// ZIPアーカイブのエントリ数・サイズ・パスを検証
    ///
    /// エントリを展開する前に、セントラルディレクトリの情報だけで判定します。
    pub fn check_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), ReportError> {
        // ファイル数の上限
        if archive.len() > self.max_file_count {
            return Err(ReportError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                self.max_file_count
            )));
        }

        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| ReportError::Zip(format!("{}", e)))?;

            // パストラバーサル対策
            let file_name = file.name();
            validate_zip_path(file_name)
                .map_err(|e| ReportError::SecurityViolation(format!("Invalid ZIP path: {}", e)))?;

            let file_size = file.size();
            if file_size > self.max_file_size {
                return Err(ReportError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, self.max_file_size
                )));
            }

            total_decompressed_size =
                total_decompressed_size
                    .checked_add(file_size)
                    .ok_or_else(|| {
                        ReportError::SecurityViolation(
                            "Total decompressed size calculation overflow".to_string(),
                        )
                    })?;

            if total_decompressed_size > self.max_decompressed_size {
                return Err(ReportError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, self.max_decompressed_size
                )));
            }
        }

        Ok(())
    }
}

/// ZIPローカルファイルヘッダーで始まるかどうか
pub(crate) fn looks_like_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04")
}

/// ZIPエントリ名の検証
///
/// 展開先の外側を指し得るエントリ名を拒否します。
///
/// # 戻り値
///
/// * `Ok(())` - パッケージ内の相対パスの場合
/// * `Err(String)` - 空、絶対パス、ドライブ指定、`..`、バックスラッシュ、NULを含む場合
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty entry name is not allowed".to_string());
    }
    if path.contains('\0') {
        return Err(format!("NUL byte in entry name: {:?}", path));
    }

    // `/etc/passwd`、`C:\...`、`d:/...`
    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.starts_with('/') || has_drive {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in entry name is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    Ok(())
}
