//! ソース行情報

use crate::{DwarfLoader, Result};
use gimli::Reader;
use tracing::warn;

/// ソース行情報
#[derive(Debug, Clone)]
pub struct LineInfo {
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
}

/// 行テーブルの1行
#[derive(Debug, Clone, Copy)]
struct LineRow {
    address: u64,
    line: u64,
    is_stmt: bool,
    prologue_end: bool,
}

/// プロローグ判定用の行テーブル（全コンパイルユニット分をアドレス順に保持）
#[derive(Debug, Default)]
pub struct LineTable {
    rows: Vec<LineRow>,
}

impl LineTable {
    /// DWARFの行番号プログラムをすべて読み込む
    pub fn from_dwarf<R: Reader>(dwarf: &gimli::Dwarf<R>) -> Result<Self> {
        let mut rows = Vec::new();
        let mut headers = dwarf.units();

        while let Some(header) = headers.next()? {
            if let Err(e) = Self::read_unit_rows(dwarf, header, &mut rows) {
                warn!("skipping line program: {}", e);
            }
        }

        rows.sort_by_key(|r| r.address);
        Ok(Self { rows })
    }

    fn read_unit_rows<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        header: gimli::UnitHeader<R>,
        rows: &mut Vec<LineRow>,
    ) -> Result<()> {
        let unit = dwarf.unit(header)?;
        let program = match unit.line_program.clone() {
            Some(p) => p,
            None => return Ok(()),
        };

        let mut program_rows = program.rows();
        while let Some((_, row)) = program_rows.next_row()? {
            if row.end_sequence() {
                continue;
            }
            rows.push(LineRow {
                address: row.address(),
                line: row.line().map(|l| l.get()).unwrap_or(0),
                is_stmt: row.is_stmt(),
                prologue_end: row.prologue_end(),
            });
        }
        Ok(())
    }

    /// 関数のプロローグ終了アドレスを求める
    ///
    /// `prologue_end` フラグを持つ行があればそのアドレス、なければ
    /// 関数先頭と異なる行番号を持つ最初の文のアドレスを返す。
    pub fn prologue_end(&self, start: u64, end: u64) -> Option<u64> {
        let first = self.rows.partition_point(|r| r.address < start);
        let rows: Vec<&LineRow> = self.rows[first..]
            .iter()
            .take_while(|r| r.address < end)
            .collect();

        if let Some(row) = rows.iter().find(|r| r.prologue_end && r.address > start) {
            return Some(row.address);
        }

        let entry_line = rows.first()?.line;
        rows.iter()
            .find(|r| r.is_stmt && r.address > start && r.line != entry_line && r.line != 0)
            .map(|r| r.address)
    }
}

/// ソース行情報の取得
pub struct LineInfoProvider {
    context: addr2line::Context<gimli::EndianSlice<'static, gimli::RunTimeEndian>>,
}

impl LineInfoProvider {
    /// ソース行情報プロバイダを作成する
    pub fn new(loader: &DwarfLoader) -> Result<Self> {
        let dwarf = loader.load_dwarf()?;
        let context = addr2line::Context::from_dwarf(dwarf)
            .map_err(|e| anyhow::anyhow!("Failed to build line context: {}", e))?;
        Ok(Self { context })
    }

    /// アドレスからソース行情報を取得する
    pub fn lookup(&self, addr: u64) -> Result<Option<LineInfo>> {
        let location = self
            .context
            .find_location(addr)
            .map_err(|e| anyhow::anyhow!("Failed to look up line for 0x{:x}: {}", addr, e))?;

        Ok(location.and_then(|loc| {
            Some(LineInfo {
                file: loc.file?.to_string(),
                line: loc.line?,
                column: loc.column,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(u64, u64, bool, bool)]) -> LineTable {
        LineTable {
            rows: rows
                .iter()
                .map(|&(address, line, is_stmt, prologue_end)| LineRow {
                    address,
                    line,
                    is_stmt,
                    prologue_end,
                })
                .collect(),
        }
    }

    #[test]
    fn test_prologue_end_flag() {
        let t = table(&[(0x100, 10, true, false), (0x104, 10, true, true), (0x108, 11, true, false)]);
        assert_eq!(t.prologue_end(0x100, 0x120), Some(0x104));
    }

    #[test]
    fn test_prologue_second_line() {
        let t = table(&[(0x100, 10, true, false), (0x106, 10, false, false), (0x10a, 12, true, false)]);
        assert_eq!(t.prologue_end(0x100, 0x120), Some(0x10a));
    }

    #[test]
    fn test_prologue_outside_function() {
        let t = table(&[(0x100, 10, true, false), (0x120, 20, true, false)]);
        assert_eq!(t.prologue_end(0x100, 0x110), None);
        assert_eq!(t.prologue_end(0x200, 0x210), None);
    }
}
