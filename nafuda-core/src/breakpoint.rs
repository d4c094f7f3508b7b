//! ブレークポイント管理

use crate::resolver::{location_address, BreakpointResolver, LocationEmitter, LocationId};
use crate::search::{SearchFilter, SymbolContext};
use nafuda_dwarf::{ConstString, Module, ModuleId, SymbolId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// ブレークポイントID
pub type BreakpointId = usize;

/// ブレークポイントロケーション（実際にトラップを置くアドレス）
#[derive(Debug, Clone)]
pub struct BreakpointLocation {
    pub id: LocationId,
    pub address: u64,
    pub module: ModuleId,
    pub module_name: ConstString,
    pub symbol: Option<SymbolId>,
    /// 関数の表示名
    pub function: ConstString,
    /// 関数先頭からのバイト数
    pub function_offset: u64,
}

/// ブレークポイントのロケーション一覧
///
/// 同じモジュールの同じアドレスには1つしか作らないため、再検索しても増えない。
#[derive(Debug, Default)]
pub struct LocationList {
    locations: Vec<BreakpointLocation>,
}

impl LocationList {
    pub fn iter(&self) -> impl Iterator<Item = &BreakpointLocation> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn find(&self, module: ModuleId, address: u64) -> Option<&BreakpointLocation> {
        self.locations
            .iter()
            .find(|l| l.module == module && l.address == address)
    }
}

impl LocationEmitter for LocationList {
    fn create_location(
        &mut self,
        context: &SymbolContext,
        offset: u64,
        skip_prologue: bool,
    ) -> Option<LocationId> {
        let address = location_address(context, offset, skip_prologue)?;
        if let Some(existing) = self.find(context.module_id(), address) {
            return Some(existing.id);
        }

        let function = context
            .symbol()
            .map(|s| ConstString::new(s.display_name()))
            .unwrap_or_default();
        let function_offset = context
            .load_address()
            .map(|start| address.wrapping_sub(start))
            .unwrap_or(0);

        let id = self.locations.len() + 1;
        self.locations.push(BreakpointLocation {
            id,
            address,
            module: context.module_id(),
            module_name: context.module.name(),
            symbol: context.symbol,
            function,
            function_offset,
        });
        debug!("location {} at 0x{:x} ({} + {})", id, address, function, function_offset);
        Some(id)
    }
}

/// ブレークポイント
#[derive(Debug)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub enabled: bool,
    resolver: BreakpointResolver,
    locations: LocationList,
}

impl Breakpoint {
    /// リゾルバを所有するブレークポイントを作る
    pub fn new(id: BreakpointId, mut resolver: BreakpointResolver) -> Self {
        resolver.set_owner(id);
        Self {
            id,
            enabled: true,
            resolver,
            locations: LocationList::default(),
        }
    }

    pub fn resolver(&self) -> &BreakpointResolver {
        &self.resolver
    }

    pub fn locations(&self) -> &LocationList {
        &self.locations
    }

    /// モジュールを検索してロケーションを追加する
    ///
    /// 戻り値は新しく増えたロケーションの数。
    pub fn resolve(&mut self, filter: &SearchFilter, modules: &[Arc<Module>]) -> usize {
        let before = self.locations.len();
        filter.search(&self.resolver, modules, &mut self.locations);
        self.locations.len() - before
    }

    /// 表示用の説明
    pub fn description(&self) -> String {
        let state = if self.enabled { "" } else { " (disabled)" };
        if self.locations.is_empty() {
            format!("{}: {}, locations = 0 (pending){}", self.id, self.resolver.description(), state)
        } else {
            format!(
                "{}: {}, locations = {}{}",
                self.id,
                self.resolver.description(),
                self.locations.len(),
                state
            )
        }
    }
}

/// ブレークポイントマネージャ
///
/// 論理的なブレークポイントとそのロケーションをID順に管理します。
pub struct BreakpointManager {
    breakpoints: BTreeMap<BreakpointId, Breakpoint>,
    next_id: BreakpointId,
}

impl BreakpointManager {
    /// 新しいブレークポイントマネージャを作成する
    pub fn new() -> Self {
        Self {
            breakpoints: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// ブレークポイントを追加する
    pub fn add(&mut self, resolver: BreakpointResolver) -> BreakpointId {
        let id = self.next_id;
        self.next_id += 1;
        self.breakpoints.insert(id, Breakpoint::new(id, resolver));
        id
    }

    /// 既存のブレークポイントの独立したコピーを追加する
    pub fn copy(&mut self, id: BreakpointId) -> Option<BreakpointId> {
        let new_id = self.next_id;
        let resolver = self.breakpoints.get(&id)?.resolver.copy_for_breakpoint(new_id);
        self.next_id += 1;
        self.breakpoints.insert(new_id, Breakpoint::new(new_id, resolver));
        Some(new_id)
    }

    /// ブレークポイントを削除する
    pub fn remove(&mut self, id: BreakpointId) -> Option<Breakpoint> {
        self.breakpoints.remove(&id)
    }

    /// ブレークポイントを取得する
    pub fn get(&self, id: BreakpointId) -> Option<&Breakpoint> {
        self.breakpoints.get(&id)
    }

    pub fn get_mut(&mut self, id: BreakpointId) -> Option<&mut Breakpoint> {
        self.breakpoints.get_mut(&id)
    }

    /// 全てのブレークポイントを取得する
    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Breakpoint> {
        self.breakpoints.values_mut()
    }

    /// ブレークポイントの数を取得する
    pub fn count(&self) -> usize {
        self.breakpoints.len()
    }
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}
