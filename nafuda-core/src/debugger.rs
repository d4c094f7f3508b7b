//! デバッガのメインロジック

use crate::breakpoint::{Breakpoint, BreakpointLocation, BreakpointManager};
use crate::errors::{ERR_BREAKPOINT_NOT_FOUND, ERR_NO_MODULES};
use crate::resolver::{
    AddressResolver, BreakpointOptions, BreakpointResolver, MatchType, NameResolver,
};
use crate::search::SearchFilter;
use crate::{BreakpointId, Result};
use nafuda_dwarf::{
    DwarfLoader, FunctionNameType, LineInfo, LineInfoProvider, Module, ModuleId, Symbol,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// デバッガ
///
/// 読み込まれたモジュールとブレークポイントを保持する。モジュールが増えるたびに
/// 全ブレークポイントをそのモジュールだけで再解決する。
pub struct Debugger {
    /// 読み込まれたモジュール
    modules: Vec<Arc<Module>>,
    /// モジュールごとのソース行情報
    line_providers: HashMap<ModuleId, LineInfoProvider>,
    /// ブレークポイント管理
    breakpoint_manager: BreakpointManager,
}

impl Debugger {
    /// 新しいデバッガを作成する
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            line_providers: HashMap::new(),
            breakpoint_manager: BreakpointManager::new(),
        }
    }

    /// ELFバイナリを読み込んでモジュールとして追加する
    ///
    /// 戻り値は既存のブレークポイントに新しく増えたロケーションの数。
    pub fn load_module<P: AsRef<Path>>(&mut self, path: P, slide: u64) -> Result<(ModuleId, usize)> {
        let loader = DwarfLoader::load(path)?;
        // 非PIEの実行ファイルは固定アドレスに置かれる
        let slide = if loader.is_pie() {
            slide
        } else {
            if slide != 0 {
                warn!(
                    "{} is not position independent; ignoring slide 0x{:x}",
                    loader.path().display(),
                    slide
                );
            }
            0
        };
        let module = Module::from_loader(&loader, slide)?;
        let id = module.id();

        match LineInfoProvider::new(&loader) {
            Ok(provider) => {
                self.line_providers.insert(id, provider);
            }
            Err(e) => warn!("no line information for {}: {}", module.name(), e),
        }

        let added = self.add_module(module);
        Ok((id, added))
    }

    /// 構築済みのモジュールを追加し、既存のブレークポイントを再解決する
    pub fn add_module(&mut self, module: Module) -> usize {
        let module = Arc::new(module);
        info!(
            "loaded module {} ({} symbols)",
            module.name(),
            module.symbols().count()
        );
        let filter = SearchFilter::by_modules(vec![module.id()]);
        self.modules.push(module);

        let mut added = 0;
        for bp in self.breakpoint_manager.all_mut() {
            let n = bp.resolve(&filter, &self.modules);
            if n > 0 {
                debug!("breakpoint {} gained {} location(s)", bp.id, n);
            }
            added += n;
        }
        added
    }

    /// 読み込まれたモジュール
    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    /// リゾルバからブレークポイントを作り、全モジュールで解決する
    pub fn set_breakpoint(&mut self, resolver: BreakpointResolver) -> BreakpointId {
        let id = self.breakpoint_manager.add(resolver);
        self.resolve_everywhere(id);
        id
    }

    /// 関数名でブレークポイントを設定する
    pub fn break_by_name<S: AsRef<str>>(
        &mut self,
        names: &[S],
        mask: FunctionNameType,
        options: &BreakpointOptions,
    ) -> Result<BreakpointId> {
        let resolver = NameResolver::from_names(names, mask, options)?;
        Ok(self.set_breakpoint(resolver.into()))
    }

    /// 正規表現でブレークポイントを設定する
    pub fn break_by_regex(&mut self, pattern: &str, options: &BreakpointOptions) -> Result<BreakpointId> {
        let resolver = NameResolver::new(pattern, FunctionNameType::FULL, MatchType::Regex, options)?;
        Ok(self.set_breakpoint(resolver.into()))
    }

    /// クラス名とセレクタでブレークポイントを設定する
    pub fn break_by_class_selector(
        &mut self,
        class_name: &str,
        selector: &str,
        options: &BreakpointOptions,
    ) -> Result<BreakpointId> {
        let resolver = NameResolver::from_class_selector(class_name, selector, options)?;
        Ok(self.set_breakpoint(resolver.into()))
    }

    /// ロードアドレスにブレークポイントを設定する
    pub fn break_at_address(&mut self, address: u64) -> BreakpointId {
        self.set_breakpoint(AddressResolver::new(address).into())
    }

    /// ブレークポイントを複製する
    pub fn copy_breakpoint(&mut self, id: BreakpointId) -> Result<BreakpointId> {
        let new_id = self
            .breakpoint_manager
            .copy(id)
            .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_BREAKPOINT_NOT_FOUND, id))?;
        self.resolve_everywhere(new_id);
        Ok(new_id)
    }

    /// ブレークポイントを削除する
    pub fn remove_breakpoint(&mut self, id: BreakpointId) -> Result<Breakpoint> {
        self.breakpoint_manager
            .remove(id)
            .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_BREAKPOINT_NOT_FOUND, id))
    }

    /// ブレークポイントの有効・無効を切り替える
    pub fn set_enabled(&mut self, id: BreakpointId, enabled: bool) -> Result<()> {
        let bp = self
            .breakpoint_manager
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("{}: {}", ERR_BREAKPOINT_NOT_FOUND, id))?;
        bp.enabled = enabled;
        Ok(())
    }

    /// ブレークポイントを取得する
    pub fn breakpoint(&self, id: BreakpointId) -> Option<&Breakpoint> {
        self.breakpoint_manager.get(id)
    }

    /// すべてのブレークポイントを取得する
    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoint_manager.all()
    }

    /// パターンを含む関数シンボルを全モジュールから検索する
    pub fn find_symbols(&self, pattern: &str) -> Result<Vec<(Arc<Module>, &Symbol)>> {
        if self.modules.is_empty() {
            anyhow::bail!(ERR_NO_MODULES);
        }
        Ok(self
            .modules
            .iter()
            .flat_map(|m| m.find_symbols(pattern).into_iter().map(move |s| (Arc::clone(m), s)))
            .collect())
    }

    /// ロードアドレスから関数シンボルを解決する
    pub fn reverse_resolve(&self, addr: u64) -> Option<(&Arc<Module>, &Symbol)> {
        self.modules
            .iter()
            .find_map(|m| m.symbol_at(addr).map(|(_, s)| (m, s)))
    }

    /// ロケーションのソース行情報を取得する
    pub fn line_info(&self, location: &BreakpointLocation) -> Option<LineInfo> {
        let provider = self.line_providers.get(&location.module)?;
        let module = self.modules.iter().find(|m| m.id() == location.module)?;
        let file_addr = location.address.checked_sub(module.slide())?;
        match provider.lookup(file_addr) {
            Ok(info) => info,
            Err(e) => {
                debug!("line lookup failed at 0x{:x}: {}", location.address, e);
                None
            }
        }
    }

    /// ロケーションを `関数 + オフセット at ファイル:行` の形で表示する
    pub fn describe_location(&self, location: &BreakpointLocation) -> String {
        let mut out = format!("0x{:016x}", location.address);
        if !location.function.is_empty() {
            out.push_str(&format!(" in {}", location.function));
            if location.function_offset > 0 {
                out.push_str(&format!(" + {}", location.function_offset));
            }
        }
        if let Some(line) = self.line_info(location) {
            out.push_str(&format!(" at {}:{}", line.file, line.line));
        }
        out
    }

    fn resolve_everywhere(&mut self, id: BreakpointId) {
        let Some(bp) = self.breakpoint_manager.get_mut(id) else {
            return;
        };
        let n = bp.resolve(&SearchFilter::everything(), &self.modules);
        debug!("breakpoint {} resolved to {} location(s)", id, n);
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}
