//! アドレスによるブレークポイントリゾルバ

use super::LocationEmitter;
use crate::search::{CallbackReturn, SearchDepth, SearchFilter, Searcher, SymbolContext};
use crate::BreakpointId;

/// ロードアドレスを直接指定するリゾルバ
///
/// そのアドレスを含む関数を持つモジュールが読み込まれたときにロケーションを作る。
#[derive(Debug, Clone)]
pub struct AddressResolver {
    owner: Option<BreakpointId>,
    address: u64,
}

impl AddressResolver {
    pub fn new(address: u64) -> Self {
        Self {
            owner: None,
            address,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn copy_for_breakpoint(&self, owner: BreakpointId) -> Self {
        Self {
            owner: Some(owner),
            address: self.address,
        }
    }

    pub(crate) fn set_owner(&mut self, owner: BreakpointId) {
        self.owner = Some(owner);
    }

    pub fn owner(&self) -> Option<BreakpointId> {
        self.owner
    }

    pub fn description(&self) -> String {
        format!("address = 0x{:x}", self.address)
    }

    pub fn dump(&self) -> String {
        format!("AddressResolver: address = 0x{:x}", self.address)
    }
}

impl Searcher for AddressResolver {
    fn depth(&self) -> SearchDepth {
        SearchDepth::Module
    }

    fn search_callback(
        &self,
        filter: &SearchFilter,
        context: &SymbolContext,
        _addr: Option<u64>,
        _containing: bool,
        emitter: &mut dyn LocationEmitter,
    ) -> CallbackReturn {
        let Some((id, _)) = context.module.symbol_at(self.address) else {
            return CallbackReturn::Continue;
        };
        let sc = context.with_symbol(id);
        if !filter.symbol_context_passes(&sc) {
            return CallbackReturn::Continue;
        }
        let created = sc
            .load_address()
            .and_then(|start| emitter.create_location(&sc, self.address - start, false));
        if created.is_none() {
            return CallbackReturn::Continue;
        }
        // 1つのアドレスを含むモジュールは1つだけ
        CallbackReturn::Stop
    }
}
