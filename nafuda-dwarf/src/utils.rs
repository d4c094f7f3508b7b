//! DWARF解析のユーティリティ関数

use crate::{LanguageType, Result};
use gimli::Reader;
use tracing::warn;

/// DWARFから読み取った関数
#[derive(Debug, Clone)]
pub struct DebugFunction {
    /// DW_AT_name
    pub name: Option<String>,
    /// 名前空間・型のスコープを付けた修飾名（`ns::Class::method`）
    pub qualified_name: Option<String>,
    /// DW_AT_linkage_name（マングル名）
    pub linkage_name: Option<String>,
    /// 関数のアドレス範囲。宣言のみならNone
    pub range: Option<(u64, u64)>,
}

/// DWARFのコンパイルユニット
#[derive(Debug, Clone)]
pub struct DebugUnit {
    pub name: String,
    pub language: LanguageType,
    pub functions: Vec<DebugFunction>,
}

/// 関数DIE検索ユーティリティ
pub struct FunctionFinder;

impl FunctionFinder {
    /// すべてのコンパイルユニットの関数DIEを集める
    ///
    /// # Arguments
    /// * `dwarf` - DWARFコンテキスト
    ///
    /// # Returns
    /// コンパイルユニットごとの関数一覧（DWARF上の順序）
    pub fn collect<R: Reader>(dwarf: &gimli::Dwarf<R>) -> Result<Vec<DebugUnit>> {
        let mut result = Vec::new();
        let mut headers = dwarf.units();

        while let Some(header) = headers.next()? {
            // 壊れたユニットがあっても他のユニットは読む
            match Self::collect_unit(dwarf, header) {
                Ok(unit) => result.push(unit),
                Err(e) => warn!("skipping compile unit: {}", e),
            }
        }

        Ok(result)
    }

    /// 1つのコンパイルユニットの関数DIEを集める
    fn collect_unit<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        header: gimli::UnitHeader<R>,
    ) -> Result<DebugUnit> {
        let unit = dwarf.unit(header)?;
        let name = match &unit.name {
            Some(n) => n.to_string_lossy()?.into_owned(),
            None => String::new(),
        };

        let mut language = LanguageType::Unknown;
        let mut functions = Vec::new();
        let mut entries = unit.entries();
        // (深さ, スコープ名) のスタック
        let mut scopes: Vec<(isize, String)> = Vec::new();
        let mut depth: isize = 0;

        while let Some((delta, entry)) = entries.next_dfs()? {
            depth += delta;
            while scopes.last().is_some_and(|(d, _)| *d >= depth) {
                scopes.pop();
            }

            if Self::is_scope_tag(entry.tag()) {
                if let Some(scope) = Self::attr_string(dwarf, &unit, entry, gimli::DW_AT_name)? {
                    scopes.push((depth, scope));
                }
                continue;
            }

            if entry.tag() == gimli::DW_TAG_compile_unit {
                if let Some(gimli::AttributeValue::Language(lang)) =
                    entry.attr_value(gimli::DW_AT_language)?
                {
                    language = LanguageType::from_dw_lang(lang);
                }
                continue;
            }

            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }

            let name = Self::attr_string(dwarf, &unit, entry, gimli::DW_AT_name)?;
            let linkage_name = match Self::attr_string(dwarf, &unit, entry, gimli::DW_AT_linkage_name)? {
                Some(n) => Some(n),
                None => Self::attr_string(dwarf, &unit, entry, gimli::DW_AT_MIPS_linkage_name)?,
            };

            // 名前のない関数（抽象インスタンスの具象化など）は検索できない
            if name.is_none() && linkage_name.is_none() {
                continue;
            }

            let range = Self::get_function_range(dwarf, &unit, entry).ok();
            let qualified_name = name.as_ref().map(|n| {
                let mut parts: Vec<&str> = scopes.iter().map(|(_, s)| s.as_str()).collect();
                parts.push(n);
                parts.join("::")
            });

            functions.push(DebugFunction {
                name,
                qualified_name,
                linkage_name,
                range,
            });
        }

        Ok(DebugUnit {
            name,
            language,
            functions,
        })
    }

    /// 修飾名の一部になるDIEか
    fn is_scope_tag(tag: gimli::DwTag) -> bool {
        tag == gimli::DW_TAG_namespace
            || tag == gimli::DW_TAG_class_type
            || tag == gimli::DW_TAG_structure_type
            || tag == gimli::DW_TAG_union_type
            || tag == gimli::DW_TAG_enumeration_type
    }

    /// 文字列属性を読み取る
    fn attr_string<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        unit: &gimli::Unit<R>,
        entry: &gimli::DebuggingInformationEntry<R>,
        attr: gimli::DwAt,
    ) -> Result<Option<String>> {
        let value = match entry.attr_value(attr)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let s = dwarf.attr_string(unit, value)?;
        Ok(Some(s.to_string_lossy()?.into_owned()))
    }

    /// 関数のアドレス範囲を取得
    fn get_function_range<R: Reader>(
        dwarf: &gimli::Dwarf<R>,
        unit: &gimli::Unit<R>,
        entry: &gimli::DebuggingInformationEntry<R>,
    ) -> Result<(u64, u64)> {
        let low_pc = entry.attr_value(gimli::DW_AT_low_pc)?;
        let high_pc = entry.attr_value(gimli::DW_AT_high_pc)?;

        let (low_pc_val, high_pc_val) = match (low_pc, high_pc) {
            (Some(l), Some(h)) => (l, h),
            _ => return Err(anyhow::anyhow!("Missing address attributes")),
        };

        let start_addr = dwarf
            .attr_address(unit, low_pc_val)?
            .ok_or_else(|| anyhow::anyhow!("Invalid low_pc"))?;

        let end_addr = match high_pc_val {
            gimli::AttributeValue::Udata(offset) => start_addr + offset,
            other => dwarf
                .attr_address(unit, other)?
                .ok_or_else(|| anyhow::anyhow!("Invalid high_pc"))?,
        };

        Ok((start_addr, end_addr))
    }
}
