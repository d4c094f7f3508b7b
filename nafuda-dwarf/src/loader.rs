//! ELFとDWARFの読み込み機能

use crate::Result;
use object::{Object, ObjectSection};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// DWARFセクションを読むリーダー
pub type DwarfReader = gimli::EndianSlice<'static, gimli::RunTimeEndian>;

/// DWARFローダー
pub struct DwarfLoader {
    /// 読み込んだファイルのパス
    path: PathBuf,
    /// オブジェクトファイル
    object_file: Rc<object::File<'static>>,
    /// エンディアン
    endian: gimli::RunTimeEndian,
    /// DWARFコンテキスト
    dwarf: gimli::Dwarf<DwarfReader>,
}

impl DwarfLoader {
    /// ELFファイルからDWARF情報を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // ファイルを読み込む
        let file_data = fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read file {:?}: {}", path, e))?;

        // モジュールはプロセス終了まで参照されるため、Box::leakで'staticライフタイムを得る
        let file_data: &'static [u8] = Box::leak(file_data.into_boxed_slice());

        // objectクレートでELFファイルをパース
        let object_file = object::File::parse(file_data)
            .map_err(|e| anyhow::anyhow!("Failed to parse ELF file {:?}: {}", path, e))?;

        // エンディアンを取得
        let endian = if object_file.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        let dwarf = Self::load_sections(&object_file, endian)?;

        tracing::debug!("loaded {:?} ({} bytes)", path, file_data.len());

        Ok(Self {
            path: path.to_path_buf(),
            object_file: Rc::new(object_file),
            endian,
            dwarf,
        })
    }

    /// DWARFセクションを読み込んでコンテキストを構築する
    fn load_sections(
        object_file: &object::File<'static>,
        endian: gimli::RunTimeEndian,
    ) -> Result<gimli::Dwarf<DwarfReader>> {
        let load_section = |id: gimli::SectionId| -> Result<DwarfReader> {
            let data = object_file
                .section_by_name(id.name())
                .and_then(|section| section.data().ok())
                .unwrap_or(&[]);
            Ok(gimli::EndianSlice::new(data, endian))
        };

        gimli::Dwarf::load(load_section)
            .map_err(|e| anyhow::anyhow!("Failed to load DWARF sections: {}", e))
    }

    /// 新しいDWARFコンテキストを作る（addr2line など所有権を要求する利用者向け）
    pub fn load_dwarf(&self) -> Result<gimli::Dwarf<DwarfReader>> {
        Self::load_sections(&self.object_file, self.endian)
    }

    /// DWARFコンテキストへの参照を取得
    pub fn dwarf(&self) -> &gimli::Dwarf<DwarfReader> {
        &self.dwarf
    }

    /// オブジェクトファイルへの参照を取得
    pub fn object_file(&self) -> &object::File<'static> {
        &self.object_file
    }

    /// 読み込んだファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PIE（Position Independent Executable）かどうかを判定する
    ///
    /// PIE実行ファイルの場合、シンボルアドレスはオフセットであり、
    /// 実行時ベースアドレスを加算する必要があります。
    /// 非PIE実行ファイルの場合、シンボルアドレスは絶対アドレスです。
    pub fn is_pie(&self) -> bool {
        use object::ObjectKind;

        // ET_DYN (Dynamic/Shared Object) = PIE実行ファイルまたは共有ライブラリ
        // ET_EXEC (Executable) = 非PIE実行ファイル
        matches!(self.object_file.kind(), ObjectKind::Dynamic)
    }
}
